//! Print head: the X, Y and Z axes plus the optional extruder.
//!
//! XY moves are open loop: each motor runs at a constant speed for the planned
//! duration and is then stopped. Z moves complete before any XY motion starts.

use embedded_hal::{delay::DelayNs, digital::InputPin};
use serde::{Deserialize, Serialize};

use super::{
    axis::{AxisMotor, HomingTiming},
    driver::{DeviceError, StopAction, TachoDriver},
    extruder::Extruder,
    zmotor::ZMotor,
};
use crate::utils::{
    config::PrinterConfig,
    math::motion::{
        check_velocity, plan_linear_move, LinearMoveCommand, MovePlan, Position, PositioningMode,
    },
    Duration,
};

/// Motion limits and defaults applied by the print head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    /// Head velocity in mm/s until a feed rate overrides it.
    pub velocity: f64,
    pub travel_limit: f64,
    pub max_height: f64,
    pub homing: HomingTiming,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self::from(&PrinterConfig::default())
    }
}

impl From<&PrinterConfig> for MotionSettings {
    fn from(config: &PrinterConfig) -> Self {
        Self {
            velocity: config.velocity,
            travel_limit: config.travel_limit,
            max_height: config.max_height,
            homing: HomingTiming::from(config),
        }
    }
}

/// Axes selected by a homing or release command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSelection {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisSelection {
    pub const ALL: Self = Self {
        x: true,
        y: true,
        z: true,
    };

    pub fn is_all(&self) -> bool {
        self.x && self.y && self.z
    }
}

pub struct PrintHead<M, S, D> {
    pub x: AxisMotor<M, S>,
    pub y: AxisMotor<M, S>,
    pub z: ZMotor<M, S>,
    pub e: Option<Extruder<M>>,
    delay: D,
    settings: MotionSettings,
    velocity: f64,
    mode: PositioningMode,
    extruded: f64,
}

impl<M, S, D> PrintHead<M, S, D>
where
    M: TachoDriver,
    S: InputPin,
    D: DelayNs,
{
    pub fn new(
        x: AxisMotor<M, S>,
        y: AxisMotor<M, S>,
        z: ZMotor<M, S>,
        e: Option<Extruder<M>>,
        delay: D,
        settings: MotionSettings,
    ) -> Self {
        Self {
            x,
            y,
            z,
            e,
            delay,
            velocity: settings.velocity,
            settings,
            mode: PositioningMode::Absolute,
            extruded: 0.0,
        }
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// Current head velocity in mm/s.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn set_velocity(
        &mut self,
        velocity: f64,
    ) -> Result<(), DeviceError<M::Error>> {
        self.velocity = check_velocity(velocity)?;
        Ok(())
    }

    pub fn position_mode(&self) -> PositioningMode {
        self.mode
    }

    pub fn set_position_mode(
        &mut self,
        mode: PositioningMode,
    ) {
        tracing::debug!(?mode, "Positioning mode");
        self.mode = mode;
    }

    /// Logical head position.
    pub fn position(&self) -> Position {
        Position {
            x: self.x.position(),
            y: self.y.position(),
            z: self.z.height(),
            e: self.extruded,
        }
    }

    /// Redefine the logical position of the given axes without moving (G92).
    pub fn set_position(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        e: Option<f64>,
    ) {
        if let Some(x) = x {
            self.x.set_position(x);
        }
        if let Some(y) = y {
            self.y.set_position(y);
        }
        if let Some(z) = z {
            self.z.set_height(z);
        }
        if let Some(e) = e {
            self.extruded = e;
        }
    }

    /// Execute a G0/G1 style move.
    pub fn linear_move(
        &mut self,
        command: &LinearMoveCommand,
    ) -> Result<(), DeviceError<M::Error>> {
        if let Some(feed_rate) = command.feed_rate {
            self.set_velocity(feed_rate)?;
        }
        if command.is_empty() {
            tracing::debug!(velocity = self.velocity, "Feed rate only move");
            return Ok(());
        }

        let current = self.position();
        let plan = plan_linear_move(
            current,
            command,
            self.mode,
            self.velocity,
            self.settings.travel_limit,
        )?;

        if plan.target.z != current.z {
            self.z
                .move_to_height(plan.target.z, self.settings.max_height)?;
        }

        if plan.is_idle() {
            return Ok(());
        }

        tracing::debug!(
            x = plan.target.x,
            y = plan.target.y,
            e = plan.target.e,
            duration = plan.duration,
            "Linear move"
        );
        self.run_timed(&plan)
    }

    fn run_timed(
        &mut self,
        plan: &MovePlan,
    ) -> Result<(), DeviceError<M::Error>> {
        let started = self.start_axes(plan);
        if started.is_ok() {
            self.sleep_micros((plan.duration * 1e6).round() as u64);
        }
        let stopped = self.stop_all();
        started?;
        stopped?;

        self.x.set_position(plan.target.x);
        self.y.set_position(plan.target.y);
        self.extruded = plan.target.e;
        Ok(())
    }

    fn start_axes(
        &mut self,
        plan: &MovePlan,
    ) -> Result<(), DeviceError<M::Error>> {
        self.x.run_at(plan.vx)?;
        self.y.run_at(plan.vy)?;
        match self.e.as_mut() {
            Some(extruder) => extruder.run_at(plan.ve)?,
            None if plan.ve != 0.0 => tracing::debug!("No extruder attached, E motion is logical only"),
            None => {}
        }
        Ok(())
    }

    /// Stop every motor, reporting the first failure.
    pub fn stop_all(&mut self) -> Result<(), DeviceError<M::Error>> {
        let x = self.x.stop();
        let y = self.y.stop();
        let z = self.z.axis_mut().stop();
        let e = match self.e.as_mut() {
            Some(extruder) => extruder.stop(),
            None => Ok(()),
        };
        x.and(y).and(z).and(e)
    }

    /// Block for `duration`.
    pub fn pause(
        &mut self,
        duration: Duration,
    ) {
        tracing::debug!(ms = duration.as_millis(), "Pause");
        self.sleep_micros(duration.as_micros());
    }

    fn sleep_micros(
        &mut self,
        mut micros: u64,
    ) {
        while micros > 0 {
            let chunk = micros.min(u64::from(u32::MAX));
            self.delay.delay_us(chunk as u32);
            micros -= chunk;
        }
    }

    /// Home every axis.
    pub fn calibrate(&mut self) -> Result<(), DeviceError<M::Error>> {
        self.home(AxisSelection::ALL)
    }

    /// Home the selected axes, X then Y then Z.
    pub fn home(
        &mut self,
        axes: AxisSelection,
    ) -> Result<(), DeviceError<M::Error>> {
        let timing = self.settings.homing;
        if axes.x {
            self.x.set_stop_action(StopAction::Brake)?;
            self.x.calibrate(&mut self.delay, timing)?;
        }
        if axes.y {
            self.y.set_stop_action(StopAction::Brake)?;
            self.y.calibrate(&mut self.delay, timing)?;
        }
        if axes.z {
            self.z.calibrate(&mut self.delay, timing)?;
        }
        Ok(())
    }

    /// Let the selected motors turn freely. Releasing every axis also
    /// releases the extruder.
    pub fn release(
        &mut self,
        axes: AxisSelection,
    ) -> Result<(), DeviceError<M::Error>> {
        if axes.x {
            self.x.release()?;
        }
        if axes.y {
            self.y.release()?;
        }
        if axes.z {
            self.z.release()?;
        }
        if axes.is_all() {
            if let Some(extruder) = self.e.as_mut() {
                extruder.release()?;
            }
        }
        tracing::info!(?axes, "Motors released");
        Ok(())
    }
}
