//! Linear axis motor with an optional touch sensor endstop.
//!
//! An axis is a tacho motor whose rotation moves the print head along one
//! direction, at `deg_mm_ratio` motor degrees per millimeter. Homing drives the
//! axis into its endstop, backs off until the switch releases, then moves by
//! the configured offset and calls that point zero.

use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, InputPin},
};

use super::driver::{DeviceError, Polarity, StopAction, TachoDriver};
use crate::utils::{
    config::{AxisConfig, PrinterConfig},
    math::{conversion, motion::check_velocity},
};

/// Endstop polling parameters used while homing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingTiming {
    pub poll_interval_ms: u32,
    pub timeout_ms: u64,
}

impl Default for HomingTiming {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            timeout_ms: 30_000,
        }
    }
}

impl From<&PrinterConfig> for HomingTiming {
    fn from(config: &PrinterConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval_ms,
            timeout_ms: config.endstop_timeout_ms,
        }
    }
}

/// A single printer axis: motor, optional endstop and logical position.
pub struct AxisMotor<M, S> {
    config: AxisConfig,
    driver: M,
    endstop: Option<S>,
    count_per_rot: i32,
    /// Logical position in mm.
    position: f64,
}

impl<M, S> AxisMotor<M, S>
where
    M: TachoDriver,
    S: InputPin,
{
    /// Wrap a motor driver and endstop with the given axis parameters.
    ///
    /// The configuration is stored as supplied. The endstop is only used when
    /// `config.ev3_touch_sensor` is set.
    pub fn new(
        config: AxisConfig,
        mut driver: M,
        endstop: Option<S>,
    ) -> Result<Self, DeviceError<M::Error>> {
        let count_per_rot = driver.count_per_rot().map_err(DeviceError::Motor)?;
        let polarity = if config.inverted {
            Polarity::Inversed
        } else {
            Polarity::Normal
        };
        driver.set_polarity(polarity).map_err(DeviceError::Motor)?;
        driver
            .set_stop_action(StopAction::Hold)
            .map_err(DeviceError::Motor)?;

        let endstop = match (config.ev3_touch_sensor, endstop) {
            (true, None) => {
                tracing::warn!(port = ?config.sensor_port, "Touch sensor flagged but not attached");
                None
            }
            (false, Some(_)) => {
                tracing::debug!(port = ?config.sensor_port, "Ignoring endstop on axis without touch sensor");
                None
            }
            (_, endstop) => endstop,
        };

        Ok(Self {
            config,
            driver,
            endstop,
            count_per_rot,
            position: 0.0,
        })
    }

    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    pub fn driver(&self) -> &M {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut M {
        &mut self.driver
    }

    pub fn count_per_rot(&self) -> i32 {
        self.count_per_rot
    }

    pub fn has_endstop(&self) -> bool {
        self.endstop.is_some()
    }

    pub fn endstop_mut(&mut self) -> Option<&mut S> {
        self.endstop.as_mut()
    }

    /// Logical position in mm.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Redefine the current logical position without moving.
    pub fn set_position(
        &mut self,
        position: f64,
    ) {
        self.position = position;
    }

    /// Millimeters (or mm/s) to tacho counts (or counts/s) for this axis.
    pub fn mm_to_tacho(
        &self,
        mm: f64,
    ) -> i32 {
        conversion::mm_to_tacho(mm, self.config.deg_mm_ratio, self.count_per_rot)
    }

    /// Move to an absolute logical position and wait for the motor to stop.
    pub fn move_to(
        &mut self,
        target: f64,
        speed: f64,
    ) -> Result<(), DeviceError<M::Error>> {
        let speed = check_velocity(speed)?;
        let counts = self.mm_to_tacho(target - self.position);
        if counts != 0 {
            tracing::debug!(
                port = ?self.config.motor_port,
                from = self.position,
                to = target,
                counts,
                "Axis move"
            );
            self.driver
                .set_speed_sp(self.mm_to_tacho(speed))
                .map_err(DeviceError::Motor)?;
            self.driver
                .run_to_rel_pos(counts)
                .map_err(DeviceError::Motor)?;
            self.driver
                .wait_until_not_moving()
                .map_err(DeviceError::Motor)?;
        }
        self.position = target;
        Ok(())
    }

    /// Start running at `velocity` mm/s until stopped. A zero speed stops.
    pub fn run_at(
        &mut self,
        velocity: f64,
    ) -> Result<(), DeviceError<M::Error>> {
        let speed = self.mm_to_tacho(velocity);
        if speed == 0 {
            return self.stop();
        }
        self.driver.set_speed_sp(speed).map_err(DeviceError::Motor)?;
        self.driver.run_forever().map_err(DeviceError::Motor)
    }

    pub fn stop(&mut self) -> Result<(), DeviceError<M::Error>> {
        self.driver.stop().map_err(DeviceError::Motor)
    }

    pub fn set_stop_action(
        &mut self,
        action: StopAction,
    ) -> Result<(), DeviceError<M::Error>> {
        self.driver
            .set_stop_action(action)
            .map_err(DeviceError::Motor)
    }

    /// Let the axis turn freely.
    pub fn release(&mut self) -> Result<(), DeviceError<M::Error>> {
        self.set_stop_action(StopAction::Coast)?;
        self.stop()
    }

    /// Poll the endstop until `pressed ^ inverted` holds.
    pub fn wait_for_press<D: DelayNs>(
        &mut self,
        inverted: bool,
        delay: &mut D,
        timing: HomingTiming,
    ) -> Result<(), DeviceError<M::Error>> {
        let endstop = self.endstop.as_mut().ok_or(DeviceError::NoEndstop)?;
        // waited time only advances by what was actually slept
        let step = timing.poll_interval_ms.max(1);
        let mut waited = 0u64;
        loop {
            let pressed = endstop
                .is_high()
                .map_err(|e| DeviceError::Endstop(e.kind()))?;
            if pressed ^ inverted {
                return Ok(());
            }
            if waited >= timing.timeout_ms {
                return Err(DeviceError::EndstopTimeout(timing.timeout_ms));
            }
            delay.delay_ms(step);
            waited += u64::from(step);
        }
    }

    /// Home the axis against its endstop and zero the logical position.
    ///
    /// Without an endstop the current position simply becomes zero.
    pub fn calibrate<D: DelayNs>(
        &mut self,
        delay: &mut D,
        timing: HomingTiming,
    ) -> Result<(), DeviceError<M::Error>> {
        if !self.has_endstop() {
            tracing::info!(port = ?self.config.motor_port, "No endstop, zeroing at current position");
            self.position = 0.0;
            return Ok(());
        }

        tracing::info!(port = ?self.config.motor_port, "Homing axis");
        if let Err(e) = self.seek_endstop(delay, timing) {
            // leave the motor stopped whatever failed
            let _ = self.driver.stop();
            return Err(e);
        }

        let calibration = self.config.calibration;
        let offset = self.mm_to_tacho(calibration.offset);
        if offset != 0 {
            self.driver
                .set_speed_sp(self.mm_to_tacho(calibration.speed.abs()))
                .map_err(DeviceError::Motor)?;
            self.driver
                .run_to_rel_pos(offset)
                .map_err(DeviceError::Motor)?;
            self.driver
                .wait_until_not_moving()
                .map_err(DeviceError::Motor)?;
        }

        self.position = 0.0;
        tracing::info!(port = ?self.config.motor_port, "Axis homed");
        Ok(())
    }

    fn seek_endstop<D: DelayNs>(
        &mut self,
        delay: &mut D,
        timing: HomingTiming,
    ) -> Result<(), DeviceError<M::Error>> {
        let calibration = self.config.calibration;
        let mut speed = self.mm_to_tacho(calibration.speed);
        if calibration.invert_motor {
            speed = -speed;
        }

        self.driver.set_speed_sp(speed).map_err(DeviceError::Motor)?;
        self.driver.run_forever().map_err(DeviceError::Motor)?;
        self.wait_for_press(calibration.invert_sensor, delay, timing)?;

        self.driver.set_speed_sp(-speed).map_err(DeviceError::Motor)?;
        self.driver.run_forever().map_err(DeviceError::Motor)?;
        self.wait_for_press(!calibration.invert_sensor, delay, timing)?;

        self.driver.stop().map_err(DeviceError::Motor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::{CalibrationConfig, MotorPort, SensorPort};
    use crate::utils::controllers::sim::{MotorCall, SimEndstop, SimMotor};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    fn axis(
        touch: bool,
        calibration: CalibrationConfig,
    ) -> AxisMotor<SimMotor, SimEndstop> {
        let config = AxisConfig::new(MotorPort::OutA, SensorPort::In1, 20.0, 5.0, touch)
            .with_calibration(calibration);
        AxisMotor::new(config, SimMotor::new(360), Some(SimEndstop::new())).unwrap()
    }

    #[test]
    fn test_new_sets_polarity_and_hold() {
        let mut config = AxisConfig::new(MotorPort::OutB, SensorPort::In2, 20.0, 14.0625, true);
        config.inverted = true;
        let axis = AxisMotor::new(config, SimMotor::new(360), None::<SimEndstop>).unwrap();
        assert_eq!(
            axis.driver().calls(),
            &[
                MotorCall::Polarity(Polarity::Inversed),
                MotorCall::StopAction(StopAction::Hold)
            ]
        );
        assert!(!axis.has_endstop());
    }

    #[test]
    fn test_endstop_ignored_without_touch_flag() {
        let axis = axis(false, CalibrationConfig::default());
        assert!(!axis.has_endstop());
    }

    #[test]
    fn test_move_to_runs_delta_only() {
        let mut axis = axis(true, CalibrationConfig::default());
        axis.set_position(10.0);
        axis.driver_mut().clear_calls();
        axis.move_to(12.0, 20.0).unwrap();
        assert_eq!(
            axis.driver().calls(),
            &[
                MotorCall::SetSpeed(100),
                MotorCall::RunToRelPos(10),
                MotorCall::WaitUntilNotMoving
            ]
        );
        assert_eq!(axis.position(), 12.0);
    }

    #[test]
    fn test_move_to_same_position_is_silent() {
        let mut axis = axis(true, CalibrationConfig::default());
        axis.driver_mut().clear_calls();
        axis.move_to(0.0, 20.0).unwrap();
        assert!(axis.driver().calls().is_empty());
    }

    #[test]
    fn test_calibrate_without_endstop_zeroes() {
        let mut axis = axis(false, CalibrationConfig::default());
        axis.set_position(33.0);
        axis.driver_mut().clear_calls();
        axis.calibrate(&mut NoopDelay::new(), HomingTiming::default())
            .unwrap();
        assert_eq!(axis.position(), 0.0);
        assert!(axis.driver().calls().is_empty());
    }

    #[test]
    fn test_calibrate_sequence_with_offset() {
        let mut axis = axis(
            true,
            CalibrationConfig {
                offset: -2.0,
                invert_motor: true,
                invert_sensor: false,
                speed: 10.0,
            },
        );
        axis.set_position(5.0);
        axis.driver_mut().clear_calls();
        axis.calibrate(&mut NoopDelay::new(), HomingTiming::default())
            .unwrap();
        assert_eq!(
            axis.driver().calls(),
            &[
                MotorCall::SetSpeed(-50),
                MotorCall::RunForever,
                MotorCall::SetSpeed(50),
                MotorCall::RunForever,
                MotorCall::Stop,
                MotorCall::SetSpeed(50),
                MotorCall::RunToRelPos(-10),
                MotorCall::WaitUntilNotMoving,
            ]
        );
        assert_eq!(axis.position(), 0.0);
    }
}
