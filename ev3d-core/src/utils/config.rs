//! Printer configuration.
//!
//! Loaded from TOML. Every field has a default matching the reference build of
//! the printer, so an empty file is a valid configuration.
//!
//! ```toml
//! velocity = 20.0
//!
//! [z]
//! motor_port = "OutC"
//! sensor_port = "In3"
//! default_speed = 2.0
//! deg_mm_ratio = 240.0
//! ev3_touch_sensor = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// EV3 motor output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorPort {
    OutA,
    OutB,
    OutC,
    OutD,
}

/// EV3 sensor input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorPort {
    In1,
    In2,
    In3,
    In4,
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax")]
    Parse(#[from] toml::de::Error),
    #[error("unable to serialize config")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Endstop homing parameters of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Distance (mm) moved away from the endstop after homing.
    pub offset: f64,
    /// Home by running the motor backwards.
    pub invert_motor: bool,
    /// The endstop reads pressed when released.
    pub invert_sensor: bool,
    /// Homing speed in mm/s.
    pub speed: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            offset: 0.0,
            invert_motor: false,
            invert_sensor: false,
            speed: 10.0,
        }
    }
}

/// Parameters of one linear axis motor.
///
/// The first five fields are the motor's construction parameters and are kept
/// exactly as supplied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub motor_port: MotorPort,
    pub sensor_port: SensorPort,
    /// Travel speed in mm/s.
    #[serde(default = "default_axis_speed")]
    pub default_speed: f64,
    /// Motor degrees per millimeter of travel.
    pub deg_mm_ratio: f64,
    /// An EV3 touch sensor endstop is attached at `sensor_port`.
    #[serde(default = "default_true")]
    pub ev3_touch_sensor: bool,
    /// Run the motor with inversed polarity.
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

fn default_axis_speed() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}

impl AxisConfig {
    /// Build an axis from the five construction parameters, with default
    /// calibration and polarity.
    pub fn new(
        motor_port: MotorPort,
        sensor_port: SensorPort,
        default_speed: f64,
        deg_mm_ratio: f64,
        ev3_touch_sensor: bool,
    ) -> Self {
        Self {
            motor_port,
            sensor_port,
            default_speed,
            deg_mm_ratio,
            ev3_touch_sensor,
            inverted: false,
            calibration: CalibrationConfig::default(),
        }
    }

    pub fn with_calibration(
        mut self,
        calibration: CalibrationConfig,
    ) -> Self {
        self.calibration = calibration;
        self
    }

    fn validate(
        &self,
        axis: &str,
    ) -> Result<(), ConfigError> {
        if !self.deg_mm_ratio.is_finite() || self.deg_mm_ratio == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{axis}: deg_mm_ratio must be finite and non-zero"
            )));
        }
        if !(self.default_speed.is_finite() && self.default_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{axis}: default_speed must be positive"
            )));
        }
        if !(self.calibration.speed.is_finite() && self.calibration.speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{axis}: calibration speed must be positive"
            )));
        }
        Ok(())
    }
}

/// Parameters of the filament extruder motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtruderConfig {
    pub motor_port: MotorPort,
    /// Motor degrees per millimeter of filament.
    pub deg_mm_ratio: f64,
}

/// Full printer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Default head velocity in mm/s.
    pub velocity: f64,
    /// X and Y targets are clamped to +/- this value (mm).
    pub travel_limit: f64,
    /// Highest Z the head may be moved to (mm).
    pub max_height: f64,
    /// Give up waiting on an endstop after this long.
    pub endstop_timeout_ms: u64,
    /// Interval between endstop reads while homing.
    pub poll_interval_ms: u32,
    pub x: AxisConfig,
    pub y: AxisConfig,
    pub z: AxisConfig,
    pub extruder: Option<ExtruderConfig>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            x: AxisConfig::new(MotorPort::OutA, SensorPort::In1, 20.0, 5.0, true).with_calibration(
                CalibrationConfig {
                    invert_motor: true,
                    ..Default::default()
                },
            ),
            y: AxisConfig::new(MotorPort::OutB, SensorPort::In2, 20.0, 14.0625, true)
                .with_calibration(CalibrationConfig {
                    offset: -20.4,
                    invert_motor: true,
                    invert_sensor: true,
                    ..Default::default()
                }),
            z: AxisConfig::new(MotorPort::OutC, SensorPort::In3, 2.0, 240.0, false),
            extruder: None,
            velocity: 20.0,
            travel_limit: 100.0,
            max_height: 150.0,
            endstop_timeout_ms: 30_000,
            poll_interval_ms: 1,
        }
    }
}

impl PrinterConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PrinterConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded printer config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.x.validate("x")?;
        self.y.validate("y")?;
        self.z.validate("z")?;
        if let Some(extruder) = &self.extruder {
            if !extruder.deg_mm_ratio.is_finite() || extruder.deg_mm_ratio == 0.0 {
                return Err(ConfigError::Invalid(
                    "extruder: deg_mm_ratio must be finite and non-zero".into(),
                ));
            }
        }
        if !(self.velocity.is_finite() && self.velocity > 0.0) {
            return Err(ConfigError::Invalid("velocity must be positive".into()));
        }
        if !(self.travel_limit.is_finite() && self.travel_limit > 0.0) {
            return Err(ConfigError::Invalid("travel_limit must be positive".into()));
        }
        if !(self.max_height.is_finite() && self.max_height > 0.0) {
            return Err(ConfigError::Invalid("max_height must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
