//! Decoding of the consensus `height/round/step` triple.

use crate::utils::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Consensus phase a height is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Propose,
    Prevote,
    Precommit,
    Commit,
    Unknown,
}

impl Phase {
    /// Map a step number to its phase; anything outside 1..=4 is `Unknown`
    pub fn from_step(step: u32) -> Self {
        match step {
            1 => Phase::Propose,
            2 => Phase::Prevote,
            3 => Phase::Precommit,
            4 => Phase::Commit,
            _ => Phase::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Propose => "propose",
            Phase::Prevote => "prevote",
            Phase::Precommit => "precommit",
            Phase::Commit => "commit",
            Phase::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded `"H/R/S"` snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStep {
    pub height: u64,
    pub round: u32,
    pub phase: Phase,
}

/// Parse a `"12345/0/1"` string into height, round and phase
///
/// # Errors
/// * `ParseError::InvalidRoundStep` - not exactly three numeric components
pub fn parse_round_step(raw: &str) -> Result<RoundStep, ParseError> {
    let invalid = || ParseError::InvalidRoundStep(raw.to_string());

    let mut parts = raw.trim().split('/');
    let (Some(h), Some(r), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let height = h.parse::<u64>().map_err(|_| invalid())?;
    let round = r.parse::<u32>().map_err(|_| invalid())?;
    let step = s.parse::<u32>().map_err(|_| invalid())?;

    Ok(RoundStep {
        height,
        round,
        phase: Phase::from_step(step),
    })
}
