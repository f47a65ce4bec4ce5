//! In-memory motor and endstop used for dry runs and tests.
//!
//! `SimMotor` records every command it receives and logs it through
//! `tracing`, so a dry run prints the motor traffic a real print would cause.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};

use super::driver::{Polarity, StopAction, TachoDriver};

/// A command received by a [`SimMotor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCall {
    SetSpeed(i32),
    RunForever,
    RunToRelPos(i32),
    Stop,
    StopAction(StopAction),
    Polarity(Polarity),
    Reset,
    WaitUntilNotMoving,
}

#[derive(Debug, Clone)]
pub struct SimMotor {
    label: &'static str,
    count_per_rot: i32,
    speed_sp: i32,
    /// Encoder position, advanced by positional runs only.
    position: i32,
    running: bool,
    calls: Vec<MotorCall>,
}

impl SimMotor {
    pub fn new(count_per_rot: i32) -> Self {
        Self::labeled("sim", count_per_rot)
    }

    /// A simulated motor whose log lines carry `label`.
    pub fn labeled(
        label: &'static str,
        count_per_rot: i32,
    ) -> Self {
        Self {
            label,
            count_per_rot,
            speed_sp: 0,
            position: 0,
            running: false,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[MotorCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn speed_sp(&self) -> i32 {
        self.speed_sp
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn record(
        &mut self,
        call: MotorCall,
    ) {
        tracing::trace!(motor = self.label, ?call, "sim motor");
        self.calls.push(call);
    }
}

impl TachoDriver for SimMotor {
    type Error = Infallible;

    fn count_per_rot(&self) -> Result<i32, Self::Error> {
        Ok(self.count_per_rot)
    }

    fn set_speed_sp(
        &mut self,
        speed: i32,
    ) -> Result<(), Self::Error> {
        self.speed_sp = speed;
        self.record(MotorCall::SetSpeed(speed));
        Ok(())
    }

    fn run_forever(&mut self) -> Result<(), Self::Error> {
        self.running = true;
        self.record(MotorCall::RunForever);
        Ok(())
    }

    fn run_to_rel_pos(
        &mut self,
        counts: i32,
    ) -> Result<(), Self::Error> {
        self.position += counts;
        self.record(MotorCall::RunToRelPos(counts));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.running = false;
        self.record(MotorCall::Stop);
        Ok(())
    }

    fn set_stop_action(
        &mut self,
        action: StopAction,
    ) -> Result<(), Self::Error> {
        self.record(MotorCall::StopAction(action));
        Ok(())
    }

    fn set_polarity(
        &mut self,
        polarity: Polarity,
    ) -> Result<(), Self::Error> {
        self.record(MotorCall::Polarity(polarity));
        Ok(())
    }

    fn position(&self) -> Result<i32, Self::Error> {
        Ok(self.position)
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.position = 0;
        self.speed_sp = 0;
        self.running = false;
        self.record(MotorCall::Reset);
        Ok(())
    }

    fn wait_until_not_moving(&mut self) -> Result<(), Self::Error> {
        self.record(MotorCall::WaitUntilNotMoving);
        Ok(())
    }
}

/// Endstop that flips between pressed and released on every read, starting
/// with pressed. Homing against it completes after a read or two.
#[derive(Debug, Clone, Default)]
pub struct SimEndstop {
    pressed: bool,
    reads: usize,
}

impl SimEndstop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ErrorType for SimEndstop {
    type Error = Infallible;
}

impl InputPin for SimEndstop {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.pressed = !self.pressed;
        self.reads += 1;
        Ok(self.pressed)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|pressed| !pressed)
    }
}
