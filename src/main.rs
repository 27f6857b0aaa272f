#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::efuse::Efuse;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rmt::Rmt;
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_smartled::{SmartLedsAdapter, smart_led_buffer};
use log::{error, info, warn};

// WiFi / BLE imports
use bt_hci::controller::ExternalController;
use esp_wifi::ble::controller::BleConnector;
use esp_wifi::wifi;

// Embassy imports
use embassy_net::{Config, Stack, StackResources};
use embassy_time::Ticker;
use esp_hal_embassy::Executor;
use static_cell::StaticCell;

// Import our library modules
use alert_board::ble_channel::{AlertLevelCharacteristic, BleAlertChannel};
use alert_board::button::DebouncedButton;
use alert_board::channel::{AlertChannel, AlertService, StartOutcome, Transport};
use alert_board::control::ControlLoop;
use alert_board::haptic::VibrationMotor;
use alert_board::led_control::StatusLed;
use alert_board::level::DeviceId;
use alert_board::protocol::ProtocolHandler;
use alert_board::state_machine::AlarmConfig;
use alert_board::tcp_server::TcpServer;
use alert_board::wifi::WiFiManager;
use alert_board::wifi_channel::{SharedAlertState, WifiAlertChannel};
use alert_board::{VERSION, config};

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

type LedWriter = SmartLedsAdapter<esp_hal::rmt::Channel<esp_hal::Blocking, 0>, 25>;
type Control = ControlLoop<
    &'static AlertService<'static>,
    DebouncedButton<Input<'static>>,
    StatusLed<LedWriter>,
    VibrationMotor<Output<'static>>,
>;

// Static cells for embassy components
static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static WIFI_MANAGER_CELL: StaticCell<WiFiManager<'static>> = StaticCell::new();
static PROTOCOL_HANDLER_CELL: StaticCell<ProtocolHandler<'static>> = StaticCell::new();
static ALERT_SERVICE_CELL: StaticCell<AlertService<'static>> = StaticCell::new();

// Channel state shared between the transport task and the control loop
static SHARED_ALERT_STATE: SharedAlertState = SharedAlertState::new();
static ALERT_LEVEL_CHARACTERISTIC: AlertLevelCharacteristic = AlertLevelCharacteristic::new();

// Static executor for embassy tasks
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("[MAIN] Panic: {}", info);
    loop {}
}

/// Transport-specific pieces created before the executor starts
enum TransportTasks {
    Wifi {
        runner: embassy_net::Runner<'static, wifi::WifiDevice<'static>>,
        manager: &'static mut WiFiManager<'static>,
        stack: Stack<'static>,
        handler: &'static ProtocolHandler<'static>,
    },
    Ble {
        connector: BleConnector<'static>,
        mac: [u8; 6],
    },
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, wifi::WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Keeps the station associated
#[embassy_executor::task]
async fn wifi_task(manager: &'static mut WiFiManager<'static>) -> ! {
    manager.run().await
}

/// TCP alert socket background task
#[embassy_executor::task]
async fn alert_server_task(stack: Stack<'static>, handler: &'static ProtocolHandler<'static>) -> ! {
    let server = TcpServer::new(stack, config::ALERT_PORT);
    info!("[TCP] Starting alert server on port {}", server.get_port());
    server.run(handler).await
}

/// BLE host and GATT server background task
#[embassy_executor::task]
async fn ble_task(connector: BleConnector<'static>, mac: [u8; 6]) {
    let controller: ExternalController<_, 20> = ExternalController::new(connector);
    if let Err(e) =
        alert_board::ble_gatt::run(controller, mac, &ALERT_LEVEL_CHARACTERISTIC).await
    {
        error!("[BLE] GATT server stopped: {}", e);
    }
}

/// Fixed-cadence control loop
#[embassy_executor::task]
async fn control_task(mut control: Control) -> ! {
    control.init();
    let mut ticker = Ticker::every(config::CYCLE_TIME);
    loop {
        control.cycle();
        ticker.next().await;
    }
}

#[esp_hal::main]
fn main() -> ! {
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // Heap for the radio driver
    esp_alloc::heap_allocator!(size: 72 * 1024);

    esp_println::logger::init_logger_from_env();
    info!("[MAIN] Alert board v{} starting", VERSION);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Initialize radio driver, shared by WiFi and BLE
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let wifi_init = match esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK) {
        Ok(init) => init,
        Err(e) => {
            error!("[MAIN] Radio driver init failed: {:?}", e);
            panic!("radio init failed");
        }
    };
    let wifi_init = WIFI_INIT_CELL.init(wifi_init);
    let mac = Efuse::read_base_mac_address();

    let transport = config::ALERT_TRANSPORT
        .parse::<Transport>()
        .unwrap_or_else(|_| {
            warn!(
                "[MAIN] Unknown transport {:?}, falling back to WiFi",
                config::ALERT_TRANSPORT
            );
            Transport::default()
        });
    info!("[MAIN] Alert transport: {:?}", transport);

    let (service, tasks) = match transport {
        Transport::Wifi => {
            let (wifi_controller, interfaces) = match wifi::new(wifi_init, peripherals.WIFI) {
                Ok(parts) => parts,
                Err(e) => {
                    error!("[WIFI] Failed to create WiFi controller: {:?}", e);
                    panic!("wifi init failed");
                }
            };

            let net_config = Config::dhcpv4(Default::default());
            let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
            let (stack, runner) = embassy_net::new(
                interfaces.sta,
                net_config,
                STACK_RESOURCES.init(StackResources::new()),
                seed,
            );
            info!("[WIFI] Embassy-net stack created with DHCP configuration");

            let manager = WIFI_MANAGER_CELL.init(WiFiManager::new(wifi_controller, stack));
            let handler = PROTOCOL_HANDLER_CELL.init(ProtocolHandler::new(
                &SHARED_ALERT_STATE,
                DeviceId::from_mac(mac),
            ));

            (
                AlertService::Wifi(WifiAlertChannel::new(&SHARED_ALERT_STATE)),
                TransportTasks::Wifi {
                    runner,
                    manager,
                    stack,
                    handler,
                },
            )
        }
        Transport::Ble => (
            AlertService::Ble(BleAlertChannel::new(&ALERT_LEVEL_CHARACTERISTIC)),
            TransportTasks::Ble {
                connector: BleConnector::new(wifi_init, peripherals.BT),
                mac,
            },
        ),
    };
    let service: &'static AlertService<'static> = ALERT_SERVICE_CELL.init(service);

    // Button on GPIO9, active low
    let button = DebouncedButton::new(Input::new(
        peripherals.GPIO9,
        InputConfig::default().with_pull(Pull::Up),
    ));

    // Vibration motor on GPIO10
    let motor = VibrationMotor::new(Output::new(
        peripherals.GPIO10,
        Level::Low,
        OutputConfig::default(),
    ));

    // WS2812 status LED on GPIO8 via RMT
    let rmt = match Rmt::new(peripherals.RMT, Rate::from_mhz(80)) {
        Ok(rmt) => rmt,
        Err(e) => {
            error!("[LED] Failed to initialize RMT: {:?}", e);
            panic!("RMT initialization failed");
        }
    };
    let led = StatusLed::new(SmartLedsAdapter::new(
        rmt.channel0,
        peripherals.GPIO8,
        smart_led_buffer!(1),
    ));
    info!(
        "[MAIN] LED on GPIO{}, button on GPIO{}, motor on GPIO{}",
        config::LED_DATA_PIN,
        config::BUTTON_PIN,
        config::MOTOR_PIN
    );

    let control = ControlLoop::new(service, button, led, motor, AlarmConfig::default());

    let executor = EXECUTOR.init(Executor::new());
    executor.run(move |spawner| {
        info!("[MAIN] Spawning control task...");
        if let Err(e) = spawner.spawn(control_task(control)) {
            error!("[MAIN] Failed to spawn control task: {:?}", e);
        }

        if service.start() == StartOutcome::AlreadyStarted {
            return;
        }

        match tasks {
            TransportTasks::Wifi {
                runner,
                manager,
                stack,
                handler,
            } => {
                info!("[MAIN] Spawning network tasks...");
                if let Err(e) = spawner.spawn(net_task(runner)) {
                    error!("[MAIN] Failed to spawn network task: {:?}", e);
                }
                if let Err(e) = spawner.spawn(wifi_task(manager)) {
                    error!("[MAIN] Failed to spawn WiFi task: {:?}", e);
                }
                if let Err(e) = spawner.spawn(alert_server_task(stack, handler)) {
                    error!("[MAIN] Failed to spawn alert server task: {:?}", e);
                }
            }
            TransportTasks::Ble { connector, mac } => {
                info!("[MAIN] Spawning BLE task...");
                if let Err(e) = spawner.spawn(ble_task(connector, mac)) {
                    error!("[MAIN] Failed to spawn BLE task: {:?}", e);
                }
            }
        }
    })
}
