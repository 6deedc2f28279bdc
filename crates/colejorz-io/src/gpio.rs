//! Motor driver wired to Linux sysfs GPIO and PWM.
//!
//! Forward and backward select the H-bridge direction, standby enables the
//! driver, and a hardware PWM channel carries the duty cycle.

use colejorz_core::{Actuator, ActuatorError, Direction};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub forward_pin: u32,
    pub backward_pin: u32,
    pub standby_pin: u32,
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    pub pwm_frequency_hz: u32,
    /// Normally `/sys/class`; tests point this at a scratch directory.
    pub sysfs_root: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            forward_pin: 17,
            backward_pin: 18,
            standby_pin: 23,
            pwm_chip: 0,
            pwm_channel: 0,
            pwm_frequency_hz: 100,
            sysfs_root: PathBuf::from("/sys/class"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid PWM frequency {0} Hz")]
    InvalidFrequency(u32),
}

fn write_attr(path: &Path, value: &str) -> Result<(), GpioError> {
    fs::write(path, value).map_err(|source| GpioError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug)]
struct OutputPin {
    number: u32,
    dir: PathBuf,
}

impl OutputPin {
    fn export(gpio_root: &Path, number: u32) -> Result<Self, GpioError> {
        let dir = gpio_root.join(format!("gpio{number}"));
        if !dir.exists() {
            write_attr(&gpio_root.join("export"), &number.to_string())?;
        }
        write_attr(&dir.join("direction"), "out")?;
        let pin = Self { number, dir };
        pin.set(false)?;
        Ok(pin)
    }

    fn set(&self, high: bool) -> Result<(), GpioError> {
        write_attr(&self.dir.join("value"), if high { "1" } else { "0" })
    }

    fn unexport(&self, gpio_root: &Path) -> Result<(), GpioError> {
        write_attr(&gpio_root.join("unexport"), &self.number.to_string())
    }
}

#[derive(Debug)]
struct PwmChannel {
    chip_dir: PathBuf,
    channel: u32,
    dir: PathBuf,
    period_ns: u64,
}

impl PwmChannel {
    fn export(
        pwm_root: &Path,
        chip: u32,
        channel: u32,
        frequency_hz: u32,
    ) -> Result<Self, GpioError> {
        if frequency_hz == 0 {
            return Err(GpioError::InvalidFrequency(frequency_hz));
        }
        let chip_dir = pwm_root.join(format!("pwmchip{chip}"));
        let dir = chip_dir.join(format!("pwm{channel}"));
        if !dir.exists() {
            write_attr(&chip_dir.join("export"), &channel.to_string())?;
        }
        let period_ns = 1_000_000_000 / u64::from(frequency_hz);
        let pwm = Self {
            chip_dir,
            channel,
            dir,
            period_ns,
        };
        // duty_cycle must never exceed period, so zero it first.
        write_attr(&pwm.dir.join("duty_cycle"), "0")?;
        write_attr(&pwm.dir.join("period"), &period_ns.to_string())?;
        write_attr(&pwm.dir.join("enable"), "1")?;
        Ok(pwm)
    }

    fn set_percent(&self, percent: u8) -> Result<(), GpioError> {
        let duty_ns = self.period_ns * u64::from(percent.min(100)) / 100;
        write_attr(&self.dir.join("duty_cycle"), &duty_ns.to_string())
    }

    fn disable(&self) -> Result<(), GpioError> {
        write_attr(&self.dir.join("enable"), "0")?;
        write_attr(&self.chip_dir.join("unexport"), &self.channel.to_string())
    }
}

pub struct GpioActuator {
    gpio_root: PathBuf,
    forward: OutputPin,
    backward: OutputPin,
    standby: OutputPin,
    pwm: PwmChannel,
    released: bool,
}

impl GpioActuator {
    /// Exports the pins, raises standby and starts PWM at 0 %.
    pub fn new(config: &GpioConfig) -> Result<Self, GpioError> {
        let gpio_root = config.sysfs_root.join("gpio");
        let forward = OutputPin::export(&gpio_root, config.forward_pin)?;
        let backward = OutputPin::export(&gpio_root, config.backward_pin)?;
        let standby = OutputPin::export(&gpio_root, config.standby_pin)?;
        let pwm = PwmChannel::export(
            &config.sysfs_root.join("pwm"),
            config.pwm_chip,
            config.pwm_channel,
            config.pwm_frequency_hz,
        )?;
        standby.set(true)?;

        info!(
            forward_pin = config.forward_pin,
            backward_pin = config.backward_pin,
            standby_pin = config.standby_pin,
            pwm_chip = config.pwm_chip,
            pwm_channel = config.pwm_channel,
            pwm_frequency_hz = config.pwm_frequency_hz,
            "GPIO motor driver ready"
        );

        Ok(Self {
            gpio_root,
            forward,
            backward,
            standby,
            pwm,
            released: false,
        })
    }

    fn ensure_live(&self) -> Result<(), ActuatorError> {
        if self.released {
            Err(ActuatorError::Released)
        } else {
            Ok(())
        }
    }
}

impl Actuator for GpioActuator {
    fn set_direction(&mut self, direction: Direction) -> Result<(), ActuatorError> {
        self.ensure_live()?;
        let io = |e: GpioError| ActuatorError::io("set_direction", e);
        // Lower the opposite line before raising the requested one.
        match direction {
            Direction::Stopped => {
                self.forward.set(false).map_err(io)?;
                self.backward.set(false).map_err(io)?;
            }
            Direction::Forward => {
                self.backward.set(false).map_err(io)?;
                self.forward.set(true).map_err(io)?;
            }
            Direction::Backward => {
                self.forward.set(false).map_err(io)?;
                self.backward.set(true).map_err(io)?;
            }
        }
        debug!(direction = direction.label(), "Direction pins set");
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: u8) -> Result<(), ActuatorError> {
        self.ensure_live()?;
        self.pwm
            .set_percent(percent)
            .map_err(|e| ActuatorError::io("set_duty_cycle", e))
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.ensure_live()?;
        self.released = true;
        let steps = [
            ("duty_cycle", self.pwm.set_percent(0)),
            ("forward", self.forward.set(false)),
            ("backward", self.backward.set(false)),
            ("standby", self.standby.set(false)),
            ("pwm", self.pwm.disable()),
            ("unexport forward", self.forward.unexport(&self.gpio_root)),
            ("unexport backward", self.backward.unexport(&self.gpio_root)),
            ("unexport standby", self.standby.unexport(&self.gpio_root)),
        ];

        let mut first = None;
        for (step, result) in steps {
            if let Err(e) = result {
                warn!(step, error = %e, "GPIO release step failed");
                first.get_or_insert(e);
            }
        }
        match first {
            None => {
                info!("GPIO motor driver released");
                Ok(())
            }
            Some(e) => Err(ActuatorError::io("release", e)),
        }
    }
}
