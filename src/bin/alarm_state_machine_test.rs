//! Alarm state machine self-test
//!
//! Runs the alarm state machine through its transitions on the target and
//! prints the result of every step on the serial console.

#![no_std]
#![no_main]

use alert_board::level::AlertLevel;
use alert_board::state_machine::{
    Action, AlarmConfig, AlarmMode, AlarmStateMachine, DeviceState,
};
use alert_board::{config, led_control};
use esp_hal::clock::CpuClock;
use esp_println::println;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("❌ {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let _peripherals = esp_hal::init(hal_config);

    println!("=== Alarm state machine self-test ===");

    let mut state_machine = AlarmStateMachine::default();

    println!("\n1. Initial state");
    assert_eq!(state_machine.get_current_state(), DeviceState::Ready);
    println!("✅ Initial state: {:?}", state_machine.get_current_state());

    println!("\n2. Remote level 0 keeps READY");
    let actions = state_machine.step(Some(AlertLevel::NoAlert), false);
    assert!(actions.is_empty());
    println!("✅ No actions in {:?}", state_machine.get_current_state());

    println!("\n3. Mild alarm");
    let actions = state_machine.step(Some(AlertLevel::Mild), false);
    assert_eq!(state_machine.get_current_state(), DeviceState::AlarmMild);
    assert!(actions.contains(&Action::SetHaptic(AlertLevel::Mild)));
    println!("✅ {:?}, actions {:?}", state_machine.get_current_state(), actions);

    println!("\n4. Escalation to high");
    state_machine.step(Some(AlertLevel::High), false);
    assert_eq!(state_machine.get_current_state(), DeviceState::AlarmHigh);
    assert_eq!(
        state_machine.get_color(),
        led_control::COLOR_ALARM_HIGH[0]
    );
    println!("✅ {:?}", state_machine.get_current_state());

    println!("\n5. Invalid reads skip the cycle");
    let cycles = state_machine.get_on_cycles();
    assert!(state_machine.step(None, true).is_empty());
    assert_eq!(state_machine.get_on_cycles(), cycles);
    println!("✅ On-cycles unchanged: {}", cycles);

    println!("\n6. Button ignored for the first {} cycles", config::ALARM_MIN_NUM_CYCLES);
    let mut toggles = 0;
    while state_machine.get_on_cycles() < config::ALARM_MIN_NUM_CYCLES {
        for action in state_machine.step(Some(AlertLevel::High), true) {
            if let Action::ShowColor(_) = action {
                toggles += 1;
            }
        }
        assert_eq!(state_machine.get_current_state(), DeviceState::AlarmHigh);
    }
    println!("✅ Still {:?} after {} colour toggles", state_machine.get_current_state(), toggles);

    println!("\n7. Button dismisses the alarm");
    let actions = state_machine.step(Some(AlertLevel::High), true);
    assert_eq!(actions[0], Action::ClearRemoteLevel);
    assert_eq!(state_machine.get_current_state(), DeviceState::Ready);
    println!("✅ Dismissed, actions {:?}", actions);

    println!("\n8. Remote clear");
    state_machine.step(Some(AlertLevel::Mild), false);
    let actions = state_machine.step(Some(AlertLevel::NoAlert), false);
    assert!(!actions.contains(&Action::ClearRemoteLevel));
    assert_eq!(state_machine.get_current_state(), DeviceState::Ready);
    println!("✅ Cleared remotely: {:?}", state_machine.get_current_state());

    println!("\n9. Binary mode");
    let mut binary = AlarmStateMachine::new(AlarmConfig {
        mode: AlarmMode::Binary,
        ..AlarmConfig::default()
    });
    for level in [AlertLevel::Mild, AlertLevel::High] {
        binary.step(Some(level), false);
        println!("Level {} -> {:?}", level.as_u8(), binary.get_current_state());
        assert_eq!(binary.get_current_state(), DeviceState::Alarm);
    }

    println!("\n=== All tests passed! ===");

    loop {
        core::hint::spin_loop();
    }
}
