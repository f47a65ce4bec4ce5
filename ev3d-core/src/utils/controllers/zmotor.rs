//! Z axis motor.
//!
//! The Z motor turns a spool/lead mechanism that raises and lowers the print
//! head. It is an ordinary [`AxisMotor`] plus conversion from travel along the
//! spool to motor angle and absolute height positioning.

use embedded_hal::{delay::DelayNs, digital::InputPin};

use super::{
    axis::{AxisMotor, HomingTiming},
    driver::{DeviceError, TachoDriver},
};
use crate::utils::{config::AxisConfig, math::conversion};

pub struct ZMotor<M, S> {
    axis: AxisMotor<M, S>,
}

impl<M, S> ZMotor<M, S>
where
    M: TachoDriver,
    S: InputPin,
{
    /// Build the Z motor. All arguments are handed to [`AxisMotor::new`]
    /// unchanged.
    pub fn new(
        config: AxisConfig,
        driver: M,
        endstop: Option<S>,
    ) -> Result<Self, DeviceError<M::Error>> {
        Ok(Self {
            axis: AxisMotor::new(config, driver, endstop)?,
        })
    }

    pub fn config(&self) -> &AxisConfig {
        self.axis.config()
    }

    pub fn axis(&self) -> &AxisMotor<M, S> {
        &self.axis
    }

    pub fn axis_mut(&mut self) -> &mut AxisMotor<M, S> {
        &mut self.axis
    }

    /// Millimeters along the spool to degrees of motor rotation.
    pub fn distance_to_angle(
        &self,
        mm: f64,
    ) -> f64 {
        conversion::mm_to_degrees(mm, self.axis.config().deg_mm_ratio)
    }

    /// Current head height in mm.
    pub fn height(&self) -> f64 {
        self.axis.position()
    }

    /// Redefine the current height without moving.
    pub fn set_height(
        &mut self,
        height: f64,
    ) {
        self.axis.set_position(height);
    }

    /// Move the print head to `height` mm at the axis default speed.
    ///
    /// Heights below the bed or above `max_height` are rejected before any
    /// motor command is sent.
    pub fn move_to_height(
        &mut self,
        height: f64,
        max_height: f64,
    ) -> Result<(), DeviceError<M::Error>> {
        if !height.is_finite() || height < 0.0 || height > max_height {
            return Err(DeviceError::OutOfRange {
                target: height,
                min: 0.0,
                max: max_height,
            });
        }
        tracing::debug!(
            from = self.height(),
            to = height,
            degrees = self.distance_to_angle(height - self.height()),
            "Z move"
        );
        let speed = self.axis.config().default_speed;
        self.axis.move_to(height, speed)
    }

    pub fn calibrate<D: DelayNs>(
        &mut self,
        delay: &mut D,
        timing: HomingTiming,
    ) -> Result<(), DeviceError<M::Error>> {
        self.axis.calibrate(delay, timing)
    }

    pub fn release(&mut self) -> Result<(), DeviceError<M::Error>> {
        self.axis.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::{MotorPort, SensorPort};
    use crate::utils::controllers::sim::{MotorCall, SimEndstop, SimMotor};

    fn z_motor() -> ZMotor<SimMotor, SimEndstop> {
        let config = AxisConfig::new(MotorPort::OutC, SensorPort::In3, 2.0, 240.0, false);
        ZMotor::new(config, SimMotor::new(360), None).unwrap()
    }

    #[test]
    fn test_construction_keeps_parameters() {
        let config = AxisConfig::new(MotorPort::OutC, SensorPort::In3, 2.5, 240.0, true);
        let z = ZMotor::new(config, SimMotor::new(360), Some(SimEndstop::new())).unwrap();
        assert_eq!(z.config(), &config);
        assert_eq!(z.config().motor_port, MotorPort::OutC);
        assert_eq!(z.config().sensor_port, SensorPort::In3);
        assert_eq!(z.config().default_speed, 2.5);
        assert_eq!(z.config().deg_mm_ratio, 240.0);
        assert!(z.config().ev3_touch_sensor);
        assert!(z.axis().has_endstop());
    }

    #[test]
    fn test_distance_to_angle() {
        let z = z_motor();
        assert_eq!(z.distance_to_angle(0.5), 120.0);
        assert_eq!(z.distance_to_angle(-0.25), -60.0);
    }

    #[test]
    fn test_move_to_height_moves_delta() {
        let mut z = z_motor();
        z.move_to_height(0.5, 150.0).unwrap();
        z.axis_mut().driver_mut().clear_calls();
        z.move_to_height(0.7, 150.0).unwrap();
        assert_eq!(
            z.axis().driver().calls(),
            &[
                MotorCall::SetSpeed(480),
                MotorCall::RunToRelPos(48),
                MotorCall::WaitUntilNotMoving
            ]
        );
        assert_eq!(z.height(), 0.7);
    }

    #[test]
    fn test_move_to_height_rejects_out_of_range() {
        let mut z = z_motor();
        z.axis_mut().driver_mut().clear_calls();
        assert!(matches!(
            z.move_to_height(-0.1, 150.0),
            Err(DeviceError::OutOfRange { .. })
        ));
        assert!(matches!(
            z.move_to_height(150.5, 150.0),
            Err(DeviceError::OutOfRange { .. })
        ));
        assert!(z.axis().driver().calls().is_empty());
        assert_eq!(z.height(), 0.0);
    }
}
