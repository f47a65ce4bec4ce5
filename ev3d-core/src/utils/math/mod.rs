//! Math utilities for the EV3 printer.
//!
//! This module provides unit conversions between millimeters, motor degrees and
//! tacho counts, and the planning of timed linear moves.

pub mod conversion;
pub mod motion;
