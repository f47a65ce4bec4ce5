//! Utility re-exports for the EV3 printer.
//!
//! - `config`: TOML printer configuration
//! - `controllers`: motor, endstop and print head control
//! - `gcode`: G-code parsing and execution
//! - `math`: unit conversions and linear move planning

pub mod config;
pub mod controllers;
pub mod gcode;
pub mod math;

pub use config::PrinterConfig;
pub use controllers::{AxisMotor, DeviceError, Extruder, PrintHead, TachoDriver, ZMotor};
pub use embassy_time::Duration;
pub use gcode::{parse_gcode, parse_gcode_file, run_gcode, Instruction};
pub use math::motion::{LinearMoveCommand, Position, PositioningMode};
