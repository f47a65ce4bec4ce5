//! Planning of timed linear moves.
//!
//! The printer has no closed-loop trajectory control: every XY move runs all
//! involved motors at constant speed for a fixed time, then stops them. This
//! module turns a G-code style move into that plan.

use serde::{Deserialize, Serialize};

/// Moves shorter than this are treated as no motion.
const MIN_TRAVEL: f64 = 1e-9;

/// Longest timed move, matching the longest G4 pause.
const MAX_MOVE_SECONDS: f64 = u32::MAX as f64 / 1e3;

/// Logical print head position in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Filament extruded so far.
    pub e: f64,
}

impl Position {
    pub fn new(
        x: f64,
        y: f64,
        z: f64,
        e: f64,
    ) -> Self {
        Self { x, y, z, e }
    }
}

/// How move coordinates are interpreted (G90/G91).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositioningMode {
    #[default]
    Absolute,
    Relative,
}

/// A single G0/G1 move. Axes left as `None` keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearMoveCommand {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub extruded: Option<f64>,
    /// Feed rate in mm/s.
    pub feed_rate: Option<f64>,
}

impl LinearMoveCommand {
    /// True when the command carries no coordinate at all.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.extruded.is_none()
    }
}

/// Errors raised while planning a move.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum MotionError {
    #[error("velocity must be positive and finite, got {0}")]
    InvalidVelocity(f64),
    #[error("move would take {0} s")]
    MoveTooLong(f64),
}

/// Result of planning a linear move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    /// Final logical position once the move completes.
    pub target: Position,
    /// Time the XY/E motors run for, in seconds. Zero for no XY/E motion.
    pub duration: f64,
    /// Per-axis velocities in mm/s during `duration`.
    pub vx: f64,
    pub vy: f64,
    pub ve: f64,
}

impl MovePlan {
    /// True when no XY or extruder motion is required.
    pub fn is_idle(&self) -> bool {
        self.duration <= 0.0
    }
}

fn resolve(
    current: f64,
    requested: Option<f64>,
    mode: PositioningMode,
) -> f64 {
    match mode {
        PositioningMode::Absolute => requested.unwrap_or(current),
        PositioningMode::Relative => current + requested.unwrap_or(0.0),
    }
}

/// Validate a head velocity in mm/s.
pub fn check_velocity(velocity: f64) -> Result<f64, MotionError> {
    if velocity.is_finite() && velocity > 0.0 {
        Ok(velocity)
    } else {
        Err(MotionError::InvalidVelocity(velocity))
    }
}

/// Plan a linear move from `current`.
///
/// X and Y targets are clamped to `[-travel_limit, travel_limit]`. The XY
/// path is covered at `velocity`; the extruder is scaled to finish at the same
/// time. An extrude-only move runs the extruder at `velocity`. Z is resolved
/// but not timed here, the Z axis moves on its own before the XY motion.
pub fn plan_linear_move(
    current: Position,
    command: &LinearMoveCommand,
    mode: PositioningMode,
    velocity: f64,
    travel_limit: f64,
) -> Result<MovePlan, MotionError> {
    let velocity = check_velocity(velocity)?;
    let limit = travel_limit.abs();

    let target = Position {
        x: resolve(current.x, command.x, mode).clamp(-limit, limit),
        y: resolve(current.y, command.y, mode).clamp(-limit, limit),
        z: resolve(current.z, command.z, mode),
        e: resolve(current.e, command.extruded, mode),
    };

    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let de = target.e - current.e;
    let distance = dx.hypot(dy);

    let duration = if distance > MIN_TRAVEL {
        distance / velocity
    } else if de.abs() > MIN_TRAVEL {
        de.abs() / velocity
    } else {
        0.0
    };

    if duration.is_nan() || duration > MAX_MOVE_SECONDS {
        return Err(MotionError::MoveTooLong(duration));
    }
    if duration <= 0.0 {
        return Ok(MovePlan {
            target,
            duration: 0.0,
            vx: 0.0,
            vy: 0.0,
            ve: 0.0,
        });
    }

    Ok(MovePlan {
        target,
        duration,
        vx: dx / duration,
        vy: dy / duration,
        ve: de / duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(
        a: f64,
        b: f64,
    ) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_absolute_diagonal_move() {
        let cmd = LinearMoveCommand {
            x: Some(3.0),
            y: Some(4.0),
            ..Default::default()
        };
        let plan = plan_linear_move(Position::default(), &cmd, PositioningMode::Absolute, 5.0, 100.0)
            .unwrap();
        assert!(close(plan.duration, 1.0));
        assert!(close(plan.vx, 3.0));
        assert!(close(plan.vy, 4.0));
        assert_eq!(plan.ve, 0.0);
    }

    #[test]
    fn test_relative_move_accumulates() {
        let current = Position::new(10.0, -5.0, 1.0, 2.0);
        let cmd = LinearMoveCommand {
            x: Some(-10.0),
            extruded: Some(0.5),
            ..Default::default()
        };
        let plan = plan_linear_move(current, &cmd, PositioningMode::Relative, 10.0, 100.0).unwrap();
        assert_eq!(plan.target, Position::new(0.0, -5.0, 1.0, 2.5));
        assert!(close(plan.duration, 1.0));
        assert!(close(plan.vx, -10.0));
        assert!(close(plan.ve, 0.5));
    }

    #[test]
    fn test_xy_is_clamped_to_travel_limit() {
        let cmd = LinearMoveCommand {
            x: Some(250.0),
            y: Some(-130.0),
            ..Default::default()
        };
        let plan = plan_linear_move(Position::default(), &cmd, PositioningMode::Absolute, 20.0, 100.0)
            .unwrap();
        assert_eq!(plan.target.x, 100.0);
        assert_eq!(plan.target.y, -100.0);
    }

    #[test]
    fn test_extrude_only_move() {
        let cmd = LinearMoveCommand {
            extruded: Some(-2.0),
            ..Default::default()
        };
        let plan = plan_linear_move(Position::default(), &cmd, PositioningMode::Absolute, 4.0, 100.0)
            .unwrap();
        assert!(close(plan.duration, 0.5));
        assert!(close(plan.ve, -4.0));
    }

    #[test]
    fn test_z_only_move_is_idle() {
        let cmd = LinearMoveCommand {
            z: Some(0.2),
            ..Default::default()
        };
        let plan = plan_linear_move(Position::default(), &cmd, PositioningMode::Absolute, 20.0, 100.0)
            .unwrap();
        assert!(plan.is_idle());
        assert_eq!(plan.target.z, 0.2);
    }

    #[test]
    fn test_rejects_endless_extrusion() {
        let cmd = LinearMoveCommand {
            extruded: Some(1e300),
            ..Default::default()
        };
        assert!(matches!(
            plan_linear_move(Position::default(), &cmd, PositioningMode::Absolute, 20.0, 100.0),
            Err(MotionError::MoveTooLong(_))
        ));
    }

    #[test]
    fn test_rejects_bad_velocity() {
        let cmd = LinearMoveCommand::default();
        assert_eq!(
            plan_linear_move(Position::default(), &cmd, PositioningMode::Absolute, 0.0, 100.0),
            Err(MotionError::InvalidVelocity(0.0))
        );
        assert!(check_velocity(f64::NAN).is_err());
    }
}
