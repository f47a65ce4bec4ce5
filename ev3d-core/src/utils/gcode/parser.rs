//! G-code parsing.
//!
//! Only the subset of G-code the printer can act on is understood:
//!
//! | Command     | Meaning                                   |
//! |-------------|-------------------------------------------|
//! | `G0`, `G1`  | linear move (`X Y Z E F`, F in mm/min)    |
//! | `G4`        | pause (`P` ms or `S` s)                   |
//! | `G28`       | home axes (`X Y Z` flags, none = all)     |
//! | `G90`/`G91` | absolute / relative positioning           |
//! | `G92`       | set logical position                      |
//! | `M18`/`M84` | release motors (`X Y Z` flags, none = all)|
//!
//! Anything after `;` is a comment. Other commands are skipped.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::utils::{
    controllers::AxisSelection,
    math::motion::{LinearMoveCommand, PositioningMode},
};

/// A single executable G-code instruction.
///
/// Serialized as JSON with tag `"op"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    LinearMove(LinearMoveCommand),
    Pause {
        micros: u64,
    },
    SetPositioning {
        mode: PositioningMode,
    },
    SetPosition {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        e: Option<f64>,
    },
    Home(AxisSelection),
    Release(AxisSelection),
}

/// Problems with a single line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid number in `{0}`")]
    InvalidNumber(String),
    #[error("missing value for `{0}`")]
    MissingValue(String),
    #[error("negative duration in `{0}`")]
    NegativeDuration(String),
    #[error("duration too long in `{0}`")]
    DurationTooLong(String),
}

/// Errors that can occur while reading a G-code program.
#[derive(Debug, thiserror::Error)]
pub enum GCodeError {
    #[error("unable to read {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read line {line}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {error}")]
    Parse { line: usize, error: ParseError },
}

/// Longest accepted G4 pause.
const MAX_PAUSE_MS: f64 = u32::MAX as f64;

/// A parameter word such as `X12.5`.
struct Word<'a> {
    letter: char,
    value: &'a str,
    raw: &'a str,
}

impl<'a> Word<'a> {
    fn split(raw: &'a str) -> Option<Self> {
        let letter = raw.chars().next()?.to_ascii_uppercase();
        Some(Self {
            letter,
            value: &raw[letter.len_utf8()..],
            raw,
        })
    }

    fn number(&self) -> Result<f64, ParseError> {
        if self.value.is_empty() {
            return Err(ParseError::MissingValue(self.raw.to_string()));
        }
        self.value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber(self.raw.to_string()))
    }
}

fn axis_flags(words: &[Word<'_>]) -> AxisSelection {
    let mut axes = AxisSelection {
        x: false,
        y: false,
        z: false,
    };
    for word in words {
        match word.letter {
            'X' => axes.x = true,
            'Y' => axes.y = true,
            'Z' => axes.z = true,
            _ => {}
        }
    }
    if axes.x || axes.y || axes.z {
        axes
    } else {
        AxisSelection::ALL
    }
}

fn linear_move(words: &[Word<'_>]) -> Result<Instruction, ParseError> {
    let mut cmd = LinearMoveCommand::default();
    for word in words {
        match word.letter {
            'X' => cmd.x = Some(word.number()?),
            'Y' => cmd.y = Some(word.number()?),
            'Z' => cmd.z = Some(word.number()?),
            'E' => cmd.extruded = Some(word.number()?),
            // mm/min to mm/s, F0 leaves the velocity unchanged
            'F' => {
                let feed_rate = word.number()?;
                if feed_rate != 0.0 {
                    cmd.feed_rate = Some(feed_rate / 60.0);
                }
            }
            _ => {}
        }
    }
    Ok(Instruction::LinearMove(cmd))
}

fn pause(words: &[Word<'_>]) -> Result<Instruction, ParseError> {
    let mut micros = 0.0;
    for word in words {
        let ms_per_unit = match word.letter {
            'P' => 1.0,
            'S' => 1e3,
            _ => continue,
        };
        let value = word.number()?;
        if value < 0.0 {
            return Err(ParseError::NegativeDuration(word.raw.to_string()));
        }
        let ms = value * ms_per_unit;
        if ms > MAX_PAUSE_MS {
            return Err(ParseError::DurationTooLong(word.raw.to_string()));
        }
        micros = ms * 1e3;
    }
    Ok(Instruction::Pause {
        micros: micros.round() as u64,
    })
}

fn set_position(words: &[Word<'_>]) -> Result<Instruction, ParseError> {
    let (mut x, mut y, mut z, mut e) = (None, None, None, None);
    for word in words {
        match word.letter {
            'X' => x = Some(word.number()?),
            'Y' => y = Some(word.number()?),
            'Z' => z = Some(word.number()?),
            'E' => e = Some(word.number()?),
            _ => {}
        }
    }
    if x.is_none() && y.is_none() && z.is_none() && e.is_none() {
        // bare G92 zeroes every axis
        return Ok(Instruction::SetPosition {
            x: Some(0.0),
            y: Some(0.0),
            z: Some(0.0),
            e: Some(0.0),
        });
    }
    Ok(Instruction::SetPosition { x, y, z, e })
}

/// Parse one line. Returns `Ok(None)` for blank, comment-only and
/// unsupported lines.
pub fn parse_line(line: &str) -> Result<Option<Instruction>, ParseError> {
    let code = line.split(';').next().unwrap_or_default();
    let mut words: Vec<Word<'_>> = code.split_whitespace().filter_map(Word::split).collect();

    // drop a leading line number (N123)
    if words.first().is_some_and(|w| w.letter == 'N') {
        words.remove(0);
    }
    let Some((command, params)) = words.split_first() else {
        return Ok(None);
    };

    let number = command.value.parse::<u32>().ok();
    let instruction = match (command.letter, number) {
        ('G', Some(0 | 1)) => linear_move(params)?,
        ('G', Some(4)) => pause(params)?,
        ('G', Some(28)) => Instruction::Home(axis_flags(params)),
        ('G', Some(90)) => Instruction::SetPositioning {
            mode: PositioningMode::Absolute,
        },
        ('G', Some(91)) => Instruction::SetPositioning {
            mode: PositioningMode::Relative,
        },
        ('G', Some(92)) => set_position(params)?,
        ('M', Some(18 | 84)) => Instruction::Release(axis_flags(params)),
        _ => {
            tracing::debug!(command = command.raw, "Skipping unsupported G-code");
            return Ok(None);
        }
    };
    Ok(Some(instruction))
}

/// Parse a whole G-code program.
pub fn parse_gcode<R: BufRead>(reader: R) -> Result<Vec<Instruction>, GCodeError> {
    let mut instructions = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| GCodeError::Read {
            line: line_no,
            source,
        })?;
        let parsed = parse_line(&line).map_err(|error| GCodeError::Parse {
            line: line_no,
            error,
        })?;
        if let Some(instruction) = parsed {
            instructions.push(instruction);
        }
    }
    Ok(instructions)
}

/// Parse the G-code file at `path`.
pub fn parse_gcode_file(path: impl AsRef<Path>) -> Result<Vec<Instruction>, GCodeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| GCodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let instructions = parse_gcode(BufReader::new(file))?;
    tracing::info!(path = %path.display(), count = instructions.len(), "Parsed G-code");
    Ok(instructions)
}
