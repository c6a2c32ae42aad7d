//! Pace and cadence conversion.
//!
//! Pace is expressed as minutes:seconds per mile. Cadence is steps per
//! minute and shares its unit with music tempo (BPM). The mapping is linear
//! in speed around a baseline of 180 steps/min at 7.5 mph.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Cadence a runner holds at the baseline speed.
pub const BASELINE_CADENCE: f64 = 180.0;
/// Speed in mph that corresponds to the baseline cadence.
pub const BASELINE_SPEED_MPH: f64 = 7.5;

pub const MIN_BPM: u32 = 120;
pub const MAX_BPM: u32 = 200;

#[derive(Debug, Error, PartialEq)]
pub enum PaceError {
    #[error("Invalid pace format: {0}")]
    Format(String),

    #[error("Seconds must be below 60, got {0}")]
    SecondsOutOfRange(u32),

    #[error("Pace must be greater than zero")]
    ZeroPace,

    #[error("BPM must be positive, got {0}")]
    NonPositiveBpm(i64),
}

/// A pace in minutes and seconds per mile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pace {
    pub minutes: u32,
    pub seconds: u32,
}

impl Pace {
    pub fn new(minutes: u32, seconds: u32) -> Result<Self, PaceError> {
        if seconds >= 60 {
            return Err(PaceError::SecondsOutOfRange(seconds));
        }
        if minutes == 0 && seconds == 0 {
            return Err(PaceError::ZeroPace);
        }
        Ok(Self { minutes, seconds })
    }

    /// Total pace in fractional minutes per mile.
    pub fn total_minutes(&self) -> f64 {
        self.minutes as f64 + self.seconds as f64 / 60.0
    }

    pub fn total_seconds(&self) -> u32 {
        self.minutes * 60 + self.seconds
    }

    /// Speed in miles per hour.
    pub fn speed_mph(&self) -> f64 {
        60.0 / self.total_minutes()
    }

    /// Builds a pace from fractional minutes, carrying rounded seconds into
    /// the minute so the result never reads "7:60".
    pub(crate) fn from_total_minutes(total: f64) -> Self {
        let total = total.max(0.0);
        let mut minutes = total.floor() as u32;
        let mut seconds = ((total - minutes as f64) * 60.0).round() as u32;
        if seconds >= 60 {
            minutes += 1;
            seconds -= 60;
        }
        Self { minutes, seconds }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

impl FromStr for Pace {
    type Err = PaceError;

    /// Accepts "m:ss" or a bare "m".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (min_part, sec_part) = match s.split_once(':') {
            Some((m, sec)) => (m, Some(sec)),
            None => (s, None),
        };

        let minutes = min_part
            .trim()
            .parse::<u32>()
            .map_err(|_| PaceError::Format(s.to_string()))?;
        let seconds = match sec_part {
            Some(sec) => sec
                .trim()
                .parse::<u32>()
                .map_err(|_| PaceError::Format(s.to_string()))?,
            None => 0,
        };

        Pace::new(minutes, seconds)
    }
}

/// Converts a pace to a target cadence, clamped to the supported BPM range.
pub fn pace_to_bpm(minutes: u32, seconds: u32) -> Result<u32, PaceError> {
    let pace = Pace::new(minutes, seconds)?;
    Ok(bpm_for_speed(pace.speed_mph()))
}

/// Converts a cadence back to the pace that produces it.
pub fn bpm_to_pace(bpm: i64) -> Result<Pace, PaceError> {
    if bpm <= 0 {
        return Err(PaceError::NonPositiveBpm(bpm));
    }
    Ok(Pace::from_total_minutes(60.0 / speed_for_bpm(bpm as f64)))
}

/// Speed in mph implied by a cadence.
pub fn speed_for_bpm(bpm: f64) -> f64 {
    bpm / BASELINE_CADENCE * BASELINE_SPEED_MPH
}

fn bpm_for_speed(mph: f64) -> u32 {
    let bpm = (BASELINE_CADENCE * (mph / BASELINE_SPEED_MPH)).round();
    bpm.clamp(MIN_BPM as f64, MAX_BPM as f64) as u32
}

/// How closely a tempo matches the target cadence.
///
/// Ordered from best to worst, so `Perfect < Good < Poor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Perfect,
    Good,
    Poor,
}

impl MatchQuality {
    /// Upper bound (inclusive) on the tempo delta for `Perfect`.
    pub const PERFECT_WITHIN: f64 = 3.0;
    /// Upper bound (inclusive) on the tempo delta for `Good`.
    pub const GOOD_WITHIN: f64 = 8.0;

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchQuality::Perfect => "perfect",
            MatchQuality::Good => "good",
            MatchQuality::Poor => "poor",
        }
    }
}

pub fn match_quality(track_bpm: f64, target_bpm: f64) -> MatchQuality {
    let delta = (track_bpm - target_bpm).abs();
    if delta <= MatchQuality::PERFECT_WITHIN {
        MatchQuality::Perfect
    } else if delta <= MatchQuality::GOOD_WITHIN {
        MatchQuality::Good
    } else {
        MatchQuality::Poor
    }
}

/// The cadence/pace pair a runner is currently targeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TargetPace {
    pub bpm: u32,
    /// Pace per mile formatted as "m:ss".
    pub pace: String,
}

impl TargetPace {
    /// Pace-mode input: the submitted pace is kept verbatim.
    pub fn from_pace(pace: Pace) -> Self {
        Self {
            bpm: bpm_for_speed(pace.speed_mph()),
            pace: pace.to_string(),
        }
    }

    /// BPM-mode input: the pace is derived from the cadence.
    pub fn from_bpm(bpm: u32) -> Result<Self, PaceError> {
        let pace = bpm_to_pace(bpm as i64)?;
        Ok(Self {
            bpm,
            pace: pace.to_string(),
        })
    }
}

/// A one-tap pace choice.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PacePreset {
    pub label: &'static str,
    pub pace: &'static str,
    pub bpm: u32,
}

pub const PRESETS: [PacePreset; 4] = [
    PacePreset { label: "Easy", pace: "9:00", bpm: 160 },
    PacePreset { label: "Moderate", pace: "8:00", bpm: 175 },
    PacePreset { label: "Tempo", pace: "7:00", bpm: 185 },
    PacePreset { label: "Fast", pace: "6:00", bpm: 195 },
];

impl PacePreset {
    pub fn target(&self) -> TargetPace {
        TargetPace {
            bpm: self.bpm,
            pace: self.pace.to_string(),
        }
    }
}

/// Formats a duration as `h:mm:ss`, or `m:ss` under an hour.
pub fn format_clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let mins = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}
