fn main() {
    // Load .env file for WiFi and transport configuration
    load_env_config();

    // Host builds (unit tests) link normally, only the firmware needs the esp linker scripts
    if std::env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("riscv32") {
        linker_be_nice();
        // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
        println!("cargo:rustc-link-arg=-Tlinkall.x");
    }
}

/// Load environment configuration from .env file
/// Environment variables take priority over .env file values
fn load_env_config() {
    use std::env;
    use std::path::Path;

    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=ALERT_TRANSPORT");

    if Path::new(".env").exists() {
        match dotenvy::dotenv() {
            Ok(_) => println!("cargo:warning=Loaded .env file"),
            Err(e) => println!("cargo:warning=Failed to load .env file: {}", e),
        }
    }

    let read = |key: &str| {
        env::var(key)
            .unwrap_or_else(|_| String::new())
            .trim()
            .to_string()
    };

    let wifi_ssid = read("WIFI_SSID");
    let wifi_password = read("WIFI_PASSWORD");
    let mut transport = read("ALERT_TRANSPORT");
    if transport.is_empty() {
        transport = "wifi".to_string();
    }

    println!("cargo:rustc-env=WIFI_SSID={}", wifi_ssid);
    println!("cargo:rustc-env=WIFI_PASSWORD={}", wifi_password);
    println!("cargo:rustc-env=ALERT_TRANSPORT={}", transport);

    println!("cargo:warning=ALERT_TRANSPORT: {}", transport);
    if transport.eq_ignore_ascii_case("wifi") || transport.eq_ignore_ascii_case("tcp") {
        if wifi_ssid.is_empty() {
            println!("cargo:warning=WIFI_SSID is empty - WiFi will not be configured");
        } else {
            println!("cargo:warning=WIFI_SSID configured: {}", wifi_ssid);
        }

        if wifi_password.is_empty() {
            println!("cargo:warning=WIFI_PASSWORD is empty - WiFi will not be configured");
        } else {
            println!(
                "cargo:warning=WIFI_PASSWORD configured (length: {})",
                wifi_password.len()
            );
        }
    }
}

fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                "esp_wifi_preempt_enable"
                | "esp_wifi_preempt_yield_task"
                | "esp_wifi_preempt_task_create" => {
                    eprintln!();
                    eprintln!("💡 `esp-wifi` has no scheduler enabled. Make sure you have the `builtin-scheduler` feature enabled, or that you provide an external scheduler.");
                    eprintln!();
                }
                _ => (),
            },
            // we don't have anything helpful for "missing-lib" yet
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
