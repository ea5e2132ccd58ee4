//! Video length parsing
//!
//! The catalog reports durations as a subset of ISO 8601 duration notation:
//! `P`, an optional day count, then `T` followed by any ordered subset of
//! hour, minute and second components (`PT1H2M3S`, `PT10M`, `P1DT2H`).
//! Premieres that have not started yet report the literal `P0D`.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

fn duration_re() -> &'static Regex {
    DURATION_RE.get_or_init(|| {
        Regex::new(r"^P(?:([0-9]*)D)?(?:T(?:([0-9]*)H)?(?:([0-9]*)M)?(?:([0-9]*)S)?)?$")
            .expect("duration pattern is valid")
    })
}

/// Length of a video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoLength {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl VideoLength {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

impl fmt::Display for VideoLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hours > 0 {
            write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
        } else if self.minutes > 0 {
            write!(f, "{}m {}s", self.minutes, self.seconds)
        } else {
            write!(f, "{}s", self.seconds)
        }
    }
}

/// Parse a duration token into hours, minutes and seconds.
///
/// Days are folded into hours. A component that carries a unit but no
/// digits (`PTH`) is rejected, as are a `T` with nothing after it (`P1DT`)
/// and a token with no components at all.
pub fn parse_duration(token: &str) -> Result<VideoLength> {
    if token == "P0D" {
        return Ok(VideoLength::default());
    }

    let caps = duration_re()
        .captures(token)
        .ok_or_else(|| Error::Format(format!("unrecognized duration token {:?}", token)))?;

    // `T` must introduce at least one time component
    if token.ends_with('T') {
        return Err(Error::Format(format!(
            "duration token {:?} has a bare 'T' with no time components",
            token
        )));
    }

    if (1..=4).all(|i| caps.get(i).is_none()) {
        return Err(Error::Format(format!(
            "duration token {:?} has no components",
            token
        )));
    }

    let component = |idx: usize, unit: char| -> Result<u32> {
        match caps.get(idx) {
            None => Ok(0),
            Some(m) if m.as_str().is_empty() => Err(Error::Format(format!(
                "duration token {:?} has a bare '{}' with no digits",
                token, unit
            ))),
            Some(m) => m.as_str().parse::<u32>().map_err(|e| {
                Error::Format(format!("duration token {:?}: {}", token, e))
            }),
        }
    };

    let days = component(1, 'D')?;
    let hours = component(2, 'H')?;
    let minutes = component(3, 'M')?;
    let seconds = component(4, 'S')?;

    let hours = days
        .checked_mul(24)
        .and_then(|h| h.checked_add(hours))
        .ok_or_else(|| Error::Format(format!("duration token {:?} overflows", token)))?;

    Ok(VideoLength::new(hours, minutes, seconds))
}
