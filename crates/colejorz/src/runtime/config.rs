use super::logging::LogFormat;
use colejorz_core::EngineConfig;
use colejorz_io::{ApiConfig, GpioConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub metrics_addr: Option<String>,
    pub simulate: bool,
    pub gpio: GpioConfig,
    pub step: u8,
    pub step_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            show_help: false,
            run_seconds: None,
            bind_addr: ApiConfig::default().bind_addr,
            log_format: LogFormat::default(),
            metrics_addr: None,
            simulate: false,
            gpio: GpioConfig::default(),
            step: engine.step,
            step_delay_ms: engine.step_delay.as_millis() as u64,
            settle_delay_ms: engine.settle_delay.as_millis() as u64,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            let mut consumed = true;
            match (args[i].as_str(), value) {
                ("--run-seconds", Some(v)) => cfg.run_seconds = v.parse().ok(),
                ("--bind", Some(v)) => cfg.bind_addr = v.clone(),
                ("--metrics-addr", Some(v)) => cfg.metrics_addr = Some(v.clone()),
                ("--log-format", Some(v)) => {
                    cfg.log_format = LogFormat::parse(v).unwrap_or(cfg.log_format)
                }
                ("--forward-pin", Some(v)) => set(&mut cfg.gpio.forward_pin, v),
                ("--backward-pin", Some(v)) => set(&mut cfg.gpio.backward_pin, v),
                ("--standby-pin", Some(v)) => set(&mut cfg.gpio.standby_pin, v),
                ("--pwm-chip", Some(v)) => set(&mut cfg.gpio.pwm_chip, v),
                ("--pwm-channel", Some(v)) => set(&mut cfg.gpio.pwm_channel, v),
                ("--pwm-frequency", Some(v)) => set(&mut cfg.gpio.pwm_frequency_hz, v),
                ("--sysfs-root", Some(v)) => cfg.gpio.sysfs_root = PathBuf::from(v),
                ("--step", Some(v)) => set(&mut cfg.step, v),
                ("--step-delay-ms", Some(v)) => set(&mut cfg.step_delay_ms, v),
                ("--settle-delay-ms", Some(v)) => set(&mut cfg.settle_delay_ms, v),
                (flag, _) => {
                    consumed = false;
                    match flag {
                        "--json-logs" => cfg.log_format = LogFormat::Json,
                        "--simulate" => cfg.simulate = true,
                        "--help" | "-h" => {
                            cfg.show_help = true;
                            break;
                        }
                        _ => {}
                    }
                }
            }
            i += if consumed { 2 } else { 1 };
        }
        cfg
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            step: self.step.clamp(1, 100),
            step_delay: Duration::from_millis(self.step_delay_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            bind_addr: self.bind_addr.clone(),
            ..ApiConfig::default()
        }
    }

    pub fn print_help() {
        println!(
            r#"colejorz - toy train controller

USAGE:
    colejorz [OPTIONS]

OPTIONS:
    --bind <ADDR>             State API bind address [default: 0.0.0.0:6543]
    --simulate                Drive an in-memory actuator instead of GPIO
    --run-seconds <SECS>      Run for a fixed duration then shut down
    --json-logs               Same as --log-format json
    --log-format <FMT>        pretty|compact|json [default: pretty]
    --metrics-addr <ADDR>     Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --forward-pin <N>         GPIO for the forward line [default: 17]
    --backward-pin <N>        GPIO for the backward line [default: 18]
    --standby-pin <N>         GPIO for driver standby [default: 23]
    --pwm-chip <N>            sysfs PWM chip [default: 0]
    --pwm-channel <N>         sysfs PWM channel [default: 0]
    --pwm-frequency <HZ>      PWM frequency [default: 100]
    --sysfs-root <PATH>       sysfs class directory [default: /sys/class]
    --step <N>                Duty units per ramp tick [default: 1]
    --step-delay-ms <MS>      Delay between ramp ticks [default: 200]
    --settle-delay-ms <MS>    Pause before reversing direction [default: 1000]
    -h, --help                Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                  Set log filter (e.g., RUST_LOG=debug,colejorz_core=trace)

EXAMPLES:
    # On the Pi, with metrics
    colejorz --metrics-addr 0.0.0.0:9090

    # Desktop run without hardware
    colejorz --simulate --bind 127.0.0.1:6543

    curl -X POST -d '{{"speed": 60, "timed": 10}}' http://127.0.0.1:6543/state
"#
        );
    }
}

/// Keeps the default when the value does not parse.
fn set<T: std::str::FromStr>(slot: &mut T, raw: &str) {
    if let Ok(parsed) = raw.parse() {
        *slot = parsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("colejorz")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_match_the_hardware_wiring() {
        let cfg = RuntimeConfig::from_args(&args(&[]));
        assert_eq!(cfg.bind_addr, "0.0.0.0:6543");
        assert_eq!(cfg.gpio.forward_pin, 17);
        assert_eq!(cfg.gpio.backward_pin, 18);
        assert_eq!(cfg.gpio.standby_pin, 23);
        assert_eq!(cfg.engine_config().step_delay, Duration::from_millis(200));
        assert!(!cfg.simulate);
    }

    #[test]
    fn parses_flags_and_values() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--simulate",
            "--bind",
            "127.0.0.1:9000",
            "--json-logs",
            "--step-delay-ms",
            "5",
            "--settle-delay-ms",
            "50",
            "--forward-pin",
            "5",
            "--run-seconds",
            "3",
        ]));
        assert!(cfg.simulate);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.gpio.forward_pin, 5);
        assert_eq!(cfg.run_seconds, Some(3));
        let engine = cfg.engine_config();
        assert_eq!(engine.step_delay, Duration::from_millis(5));
        assert_eq!(engine.settle_delay, Duration::from_millis(50));
    }

    #[test]
    fn bad_numbers_keep_defaults() {
        let cfg = RuntimeConfig::from_args(&args(&["--forward-pin", "seventeen", "--step", "0"]));
        assert_eq!(cfg.gpio.forward_pin, 17);
        assert_eq!(cfg.engine_config().step, 1);
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--simulate"]));
        assert!(cfg.show_help);
        assert!(!cfg.simulate);
    }
}
