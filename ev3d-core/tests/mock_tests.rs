use std::io::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal_mock::eh1::{
    delay::NoopDelay,
    digital::{Mock as PinMock, State, Transaction as PinTrans},
};
use ev3d_core::utils::{
    config::{AxisConfig, CalibrationConfig, MotorPort, PrinterConfig, SensorPort},
    controllers::{
        sim::{MotorCall, SimMotor},
        sim_printhead, AxisMotor, DeviceError, HomingTiming, ZMotor,
    },
    gcode::{parse_gcode, parse_gcode_file, run_gcode, Instruction},
    math::motion::Position,
};

/// Create a read transaction returning the given endstop level.
pub fn read(level: State) -> PinTrans {
    PinTrans::get(level)
}

/// Delay that only adds up how long it was asked to wait.
#[derive(Default)]
struct TotalDelay {
    nanos: u64,
}

impl DelayNs for TotalDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.nanos += u64::from(ns);
    }
}

fn homing_axis(
    calibration: CalibrationConfig,
    expectations: &[PinTrans],
) -> AxisMotor<SimMotor, PinMock> {
    let config = AxisConfig::new(MotorPort::OutA, SensorPort::In1, 20.0, 5.0, true)
        .with_calibration(calibration);
    let mut axis = AxisMotor::new(config, SimMotor::new(360), Some(PinMock::new(expectations)))
        .unwrap();
    axis.driver_mut().clear_calls();
    axis
}

#[test]
fn test_calibrate_waits_for_press_then_release() {
    let expectations = [
        read(State::Low),
        read(State::Low),
        read(State::High),
        read(State::High),
        read(State::Low),
    ];
    let mut axis = homing_axis(CalibrationConfig::default(), &expectations);
    axis.set_position(42.0);

    axis.calibrate(&mut NoopDelay::new(), HomingTiming::default())
        .unwrap();

    assert_eq!(
        axis.driver().calls(),
        &[
            MotorCall::SetSpeed(50),
            MotorCall::RunForever,
            MotorCall::SetSpeed(-50),
            MotorCall::RunForever,
            MotorCall::Stop,
        ]
    );
    assert_eq!(axis.position(), 0.0);
    axis.endstop_mut().unwrap().done();
}

#[test]
fn test_calibrate_with_inverted_sensor() {
    // a normally closed switch reads high until pressed
    let expectations = [
        read(State::High),
        read(State::Low),
        read(State::Low),
        read(State::High),
    ];
    let calibration = CalibrationConfig {
        invert_sensor: true,
        ..Default::default()
    };
    let mut axis = homing_axis(calibration, &expectations);

    axis.calibrate(&mut NoopDelay::new(), HomingTiming::default())
        .unwrap();

    assert_eq!(axis.driver().calls().last(), Some(&MotorCall::Stop));
    axis.endstop_mut().unwrap().done();
}

#[test]
fn test_stuck_endstop_times_out_and_stops() {
    let expectations = [
        read(State::Low),
        read(State::Low),
        read(State::Low),
        read(State::Low),
    ];
    let mut axis = homing_axis(CalibrationConfig::default(), &expectations);
    let timing = HomingTiming {
        poll_interval_ms: 1,
        timeout_ms: 3,
    };
    let mut delay = TotalDelay::default();

    let err = axis.calibrate(&mut delay, timing).unwrap_err();

    assert!(matches!(err, DeviceError::EndstopTimeout(3)));
    assert_eq!(delay.nanos, 3_000_000);
    assert_eq!(axis.driver().calls().last(), Some(&MotorCall::Stop));
    assert!(!axis.driver().is_running());
    axis.endstop_mut().unwrap().done();
}

#[test]
fn test_zero_poll_interval_still_waits_full_timeout() {
    let expectations = [
        read(State::Low),
        read(State::Low),
        read(State::Low),
        read(State::Low),
    ];
    let mut axis = homing_axis(CalibrationConfig::default(), &expectations);
    let timing = HomingTiming {
        poll_interval_ms: 0,
        timeout_ms: 3,
    };
    let mut delay = TotalDelay::default();

    let err = axis.calibrate(&mut delay, timing).unwrap_err();

    assert!(matches!(err, DeviceError::EndstopTimeout(3)));
    // the timeout is real time spent waiting, not a read count
    assert_eq!(delay.nanos, 3_000_000);
    axis.endstop_mut().unwrap().done();
}

#[test]
fn test_wait_for_press_without_endstop() {
    let config = AxisConfig::new(MotorPort::OutC, SensorPort::In3, 2.0, 240.0, false);
    let mut z = ZMotor::new(config, SimMotor::new(360), None::<PinMock>).unwrap();
    let err = z
        .axis_mut()
        .wait_for_press(false, &mut NoopDelay::new(), HomingTiming::default())
        .unwrap_err();
    assert!(matches!(err, DeviceError::NoEndstop));
}

#[test]
fn test_program_runs_on_simulated_head() {
    let program = "\
; calibration cube start
G28
G90
G1 Z0.2 F600
G1 X10 Y10 E1.5
G4 P250
G91
G1 X-5 E0.5
G92 E0
M84
";
    let instructions = parse_gcode(program.as_bytes()).unwrap();
    assert_eq!(instructions.len(), 9);

    let mut head = sim_printhead(&PrinterConfig::default(), TotalDelay::default()).unwrap();
    run_gcode(&mut head, &instructions).unwrap();

    assert_eq!(head.position(), Position::new(5.0, 10.0, 0.2, 0.0));
    assert_eq!(head.velocity(), 10.0);
    assert_eq!(
        head.z.axis().driver().calls().last(),
        Some(&MotorCall::Stop)
    );
}

#[test]
fn test_runner_stops_on_device_error() {
    let instructions = [
        Instruction::LinearMove(ev3d_core::utils::LinearMoveCommand {
            z: Some(500.0),
            ..Default::default()
        }),
        Instruction::LinearMove(ev3d_core::utils::LinearMoveCommand {
            x: Some(10.0),
            ..Default::default()
        }),
    ];
    let mut head = sim_printhead(&PrinterConfig::default(), NoopDelay::new()).unwrap();
    let err = run_gcode(&mut head, &instructions).unwrap_err();
    assert!(matches!(err, DeviceError::OutOfRange { .. }));
    assert_eq!(head.position().x, 0.0);
}

#[test]
fn test_parse_gcode_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "G1 X1 Y2 ; first").unwrap();
    writeln!(file, "G1 Z0.4").unwrap();
    let instructions = parse_gcode_file(file.path()).unwrap();
    assert_eq!(instructions.len(), 2);
}

#[test]
fn test_instruction_json_shape() {
    let instructions = parse_gcode("G28 X\nG4 S1\n".as_bytes()).unwrap();
    let json = serde_json::to_value(&instructions).unwrap();
    assert_eq!(json[0]["op"], "home");
    assert_eq!(json[0]["x"], true);
    assert_eq!(json[0]["y"], false);
    assert_eq!(json[1]["op"], "pause");
    assert_eq!(json[1]["micros"], 1_000_000);
}
