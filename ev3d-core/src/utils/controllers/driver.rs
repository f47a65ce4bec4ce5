use core::fmt::Debug;

use embedded_hal::digital::ErrorKind;

use crate::utils::math::motion::MotionError;

/// What a tacho motor does once told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    /// Remove power and let the motor spin down.
    Coast,
    /// Short the windings for a passive brake.
    Brake,
    /// Actively hold the current position.
    Hold,
}

/// Direction a positive speed turns the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inversed,
}

/// Abstract interface to an EV3 style tacho motor.
///
/// Speeds are in tacho counts per second, positions in tacho counts.
pub trait TachoDriver {
    type Error: Debug;

    /// Encoder counts per full motor rotation.
    fn count_per_rot(&self) -> Result<i32, Self::Error>;

    fn set_speed_sp(
        &mut self,
        speed: i32,
    ) -> Result<(), Self::Error>;

    /// Run at the current speed setpoint until stopped.
    fn run_forever(&mut self) -> Result<(), Self::Error>;

    /// Run to a position relative to the current one at the speed setpoint.
    fn run_to_rel_pos(
        &mut self,
        counts: i32,
    ) -> Result<(), Self::Error>;

    fn stop(&mut self) -> Result<(), Self::Error>;

    fn set_stop_action(
        &mut self,
        action: StopAction,
    ) -> Result<(), Self::Error>;

    fn set_polarity(
        &mut self,
        polarity: Polarity,
    ) -> Result<(), Self::Error>;

    /// Current encoder position.
    fn position(&self) -> Result<i32, Self::Error>;

    /// Reset all motor parameters and zero the encoder.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Block until the motor stops moving.
    fn wait_until_not_moving(&mut self) -> Result<(), Self::Error>;
}

/// Errors that can occur when driving the printer hardware.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError<E: Debug> {
    #[error("motor driver error: {0:?}")]
    Motor(E),
    #[error("endstop read failed: {0:?}")]
    Endstop(ErrorKind),
    #[error("endstop did not change state within {0} ms")]
    EndstopTimeout(u64),
    #[error("axis has no endstop")]
    NoEndstop,
    #[error("target {target} mm outside [{min}, {max}]")]
    OutOfRange { target: f64, min: f64, max: f64 },
    #[error(transparent)]
    Motion(#[from] MotionError),
}
