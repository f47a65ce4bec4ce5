//! Module Exports
//!
//! Motor and sensor control for the printer.
//!
//! - `driver`: the `TachoDriver` hardware seam and device errors
//! - `axis`: linear axis motor with touch sensor homing
//! - `zmotor`: Z axis height control
//! - `extruder`: filament feed motor
//! - `printhead`: coordinated X/Y/Z/E motion
//! - `sim`: simulated hardware for dry runs
//! - `ev3`: ev3dev hardware bindings (feature `ev3`)

pub mod axis;
pub mod driver;
pub mod extruder;
pub mod printhead;
pub mod sim;
pub mod zmotor;

#[cfg(feature = "ev3")]
pub mod ev3;

pub use axis::{AxisMotor, HomingTiming};
pub use driver::{DeviceError, Polarity, StopAction, TachoDriver};
pub use extruder::Extruder;
pub use printhead::{AxisSelection, MotionSettings, PrintHead};
pub use zmotor::ZMotor;

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;

use crate::utils::config::PrinterConfig;
use sim::{SimEndstop, SimMotor};

/// Print head built entirely from simulated hardware.
pub type SimPrintHead<D> = PrintHead<SimMotor, SimEndstop, D>;

/// Build a simulated print head for `config`.
///
/// Every axis flagged with a touch sensor gets a [`SimEndstop`].
pub fn sim_printhead<D: DelayNs>(
    config: &PrinterConfig,
    delay: D,
) -> Result<SimPrintHead<D>, DeviceError<Infallible>> {
    let endstop = |touch: bool| touch.then(SimEndstop::new);
    let x = AxisMotor::new(
        config.x,
        SimMotor::labeled("x", SIM_COUNT_PER_ROT),
        endstop(config.x.ev3_touch_sensor),
    )?;
    let y = AxisMotor::new(
        config.y,
        SimMotor::labeled("y", SIM_COUNT_PER_ROT),
        endstop(config.y.ev3_touch_sensor),
    )?;
    let z = ZMotor::new(
        config.z,
        SimMotor::labeled("z", SIM_COUNT_PER_ROT),
        endstop(config.z.ev3_touch_sensor),
    )?;
    let e = config
        .extruder
        .map(|e| Extruder::new(e, SimMotor::labeled("e", SIM_COUNT_PER_ROT)))
        .transpose()?;
    Ok(PrintHead::new(x, y, z, e, delay, MotionSettings::from(config)))
}

/// Encoder resolution of the EV3 large motor.
pub const SIM_COUNT_PER_ROT: i32 = 360;
