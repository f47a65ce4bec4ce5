//! Core drivers and motion control for an EV3 based 3D printer.
//!
//! For a runnable front end, see the `ev3d-app/printer` binary.

pub mod utils;
