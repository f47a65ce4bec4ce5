//! ev3dev hardware bindings.
//!
//! Maps the printer's motor and endstop seams onto `ev3dev-lang-rust` large
//! motors and touch sensors, accessed through the ev3dev sysfs tree.

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorKind, ErrorType, InputPin},
};
use ev3dev_lang_rust::{
    motors::{LargeMotor, MotorPort as Ev3MotorPort},
    sensors::{SensorPort as Ev3SensorPort, TouchSensor},
    Ev3Error,
};

use super::{
    driver::{DeviceError, Polarity, StopAction, TachoDriver},
    AxisMotor, Extruder, MotionSettings, PrintHead, ZMotor,
};
use crate::utils::config::{AxisConfig, ExtruderConfig, MotorPort, PrinterConfig, SensorPort};

pub type Ev3Axis = AxisMotor<Ev3Motor, TouchEndstop>;
pub type Ev3ZMotor = ZMotor<Ev3Motor, TouchEndstop>;
pub type Ev3PrintHead<D> = PrintHead<Ev3Motor, TouchEndstop, D>;

fn motor_port(port: MotorPort) -> Ev3MotorPort {
    match port {
        MotorPort::OutA => Ev3MotorPort::OutA,
        MotorPort::OutB => Ev3MotorPort::OutB,
        MotorPort::OutC => Ev3MotorPort::OutC,
        MotorPort::OutD => Ev3MotorPort::OutD,
    }
}

fn sensor_port(port: SensorPort) -> Ev3SensorPort {
    match port {
        SensorPort::In1 => Ev3SensorPort::In1,
        SensorPort::In2 => Ev3SensorPort::In2,
        SensorPort::In3 => Ev3SensorPort::In3,
        SensorPort::In4 => Ev3SensorPort::In4,
    }
}

/// An EV3 large motor.
pub struct Ev3Motor(LargeMotor);

impl Ev3Motor {
    /// Open the motor on `port` and reset it.
    pub fn open(port: MotorPort) -> Result<Self, Ev3Error> {
        let motor = LargeMotor::get(motor_port(port))?;
        motor.reset()?;
        Ok(Self(motor))
    }

    pub fn inner(&self) -> &LargeMotor {
        &self.0
    }
}

impl TachoDriver for Ev3Motor {
    type Error = Ev3Error;

    fn count_per_rot(&self) -> Result<i32, Self::Error> {
        self.0.get_count_per_rot()
    }

    fn set_speed_sp(
        &mut self,
        speed: i32,
    ) -> Result<(), Self::Error> {
        self.0.set_speed_sp(speed)
    }

    fn run_forever(&mut self) -> Result<(), Self::Error> {
        self.0.run_forever()
    }

    fn run_to_rel_pos(
        &mut self,
        counts: i32,
    ) -> Result<(), Self::Error> {
        self.0.run_to_rel_pos(Some(counts))
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.0.stop()
    }

    fn set_stop_action(
        &mut self,
        action: StopAction,
    ) -> Result<(), Self::Error> {
        let action = match action {
            StopAction::Coast => LargeMotor::STOP_ACTION_COAST,
            StopAction::Brake => LargeMotor::STOP_ACTION_BRAKE,
            StopAction::Hold => LargeMotor::STOP_ACTION_HOLD,
        };
        self.0.set_stop_action(action)
    }

    fn set_polarity(
        &mut self,
        polarity: Polarity,
    ) -> Result<(), Self::Error> {
        let polarity = match polarity {
            Polarity::Normal => LargeMotor::POLARITY_NORMAL,
            Polarity::Inversed => LargeMotor::POLARITY_INVERSED,
        };
        self.0.set_polarity(polarity)
    }

    fn position(&self) -> Result<i32, Self::Error> {
        self.0.get_position()
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.0.reset()
    }

    fn wait_until_not_moving(&mut self) -> Result<(), Self::Error> {
        self.0.wait_until_not_moving(None);
        Ok(())
    }
}

/// Error reading an EV3 touch sensor.
#[derive(Debug)]
pub struct TouchError(pub Ev3Error);

impl embedded_hal::digital::Error for TouchError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// EV3 touch sensor read as a digital input, high while pressed.
pub struct TouchEndstop(TouchSensor);

impl TouchEndstop {
    pub fn open(port: SensorPort) -> Result<Self, Ev3Error> {
        Ok(Self(TouchSensor::get(sensor_port(port))?))
    }
}

impl ErrorType for TouchEndstop {
    type Error = TouchError;
}

impl InputPin for TouchEndstop {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.get_pressed_state().map_err(TouchError)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|pressed| !pressed)
    }
}

fn open_endstop(config: &AxisConfig) -> Result<Option<TouchEndstop>, Ev3Error> {
    if config.ev3_touch_sensor {
        TouchEndstop::open(config.sensor_port).map(Some)
    } else {
        Ok(None)
    }
}

/// Open the motor and, when flagged, the touch sensor of an axis.
pub fn open_axis(config: AxisConfig) -> Result<Ev3Axis, DeviceError<Ev3Error>> {
    let motor = Ev3Motor::open(config.motor_port).map_err(DeviceError::Motor)?;
    let endstop = open_endstop(&config).map_err(DeviceError::Motor)?;
    AxisMotor::new(config, motor, endstop)
}

pub fn open_z(config: AxisConfig) -> Result<Ev3ZMotor, DeviceError<Ev3Error>> {
    let motor = Ev3Motor::open(config.motor_port).map_err(DeviceError::Motor)?;
    let endstop = open_endstop(&config).map_err(DeviceError::Motor)?;
    ZMotor::new(config, motor, endstop)
}

pub fn open_extruder(config: ExtruderConfig) -> Result<Extruder<Ev3Motor>, DeviceError<Ev3Error>> {
    let motor = Ev3Motor::open(config.motor_port).map_err(DeviceError::Motor)?;
    Extruder::new(config, motor)
}

/// Open every device named in `config` and assemble the print head.
pub fn open_printhead<D: DelayNs>(
    config: &PrinterConfig,
    delay: D,
) -> Result<Ev3PrintHead<D>, DeviceError<Ev3Error>> {
    let x = open_axis(config.x)?;
    let y = open_axis(config.y)?;
    let z = open_z(config.z)?;
    let e = config.extruder.map(open_extruder).transpose()?;
    tracing::info!("EV3 devices opened");
    Ok(PrintHead::new(x, y, z, e, delay, MotionSettings::from(config)))
}
