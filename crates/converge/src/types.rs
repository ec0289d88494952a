//! Core types for dependency-ordered convergence

use crate::value::Param;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way the apply pass walks the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Dependencies before dependants (create / converge)
    #[default]
    Forward,
    /// Dependants before dependencies (teardown)
    Reverse,
}

impl Direction {
    /// Forward unless `reverse` is set
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse { Self::Reverse } else { Self::Forward }
    }

    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }
}

/// Pass of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Discovery of existing objects, always forward
    Preflight,
    /// Convergence in the requested direction
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preflight => f.write_str("preflight"),
            Self::Apply => f.write_str("apply"),
        }
    }
}

/// What happened to one resource in one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// A handler claimed the resource and reported its state
    Reported,
    /// A handler claimed the resource without reporting state
    Claimed,
    /// No handler took part (grouping resource, or no preflight for it)
    Unhandled,
    /// Bypassed because `skip` was truthy
    Skipped,
}

/// Desired state requested through `params.ensure`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ensure {
    #[default]
    Present,
    Absent,
    /// Present, and upgraded if a newer version exists
    Latest,
}

impl Ensure {
    /// Parse an `ensure` param; missing means present
    ///
    /// Anything else is a configuration error the handler must not guess at.
    pub fn from_param(param: Option<&Param>) -> Result<Self> {
        match param {
            None => Ok(Self::Present),
            Some(p) => match p.as_str() {
                Some("present") => Ok(Self::Present),
                Some("absent") => Ok(Self::Absent),
                Some("latest") => Ok(Self::Latest),
                _ => bail!("invalid ensure value: {p} (expected present, absent or latest)"),
            },
        }
    }

    pub fn is_present(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Counts collected over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Resources whose preflight reported existing state
    pub discovered: usize,
    /// Resources claimed by an apply handler
    pub applied: usize,
    /// Applied resources whose handler reported new state
    pub reported: usize,
    /// Resources bypassed by `skip`
    pub skipped: usize,
    /// Resources no apply handler took part in
    pub unhandled: usize,
    /// Total seconds spent in `delay` pauses
    pub delayed_secs: u64,
}

impl RunSummary {
    /// Record the outcome of one resource in one pass
    pub fn add(&mut self, phase: Phase, outcome: &Outcome) {
        match (phase, outcome) {
            (Phase::Preflight, Outcome::Reported) => self.discovered += 1,
            (Phase::Preflight, _) => {}
            (Phase::Apply, Outcome::Reported) => {
                self.applied += 1;
                self.reported += 1;
            }
            (Phase::Apply, Outcome::Claimed) => self.applied += 1,
            (Phase::Apply, Outcome::Unhandled) => self.unhandled += 1,
            (Phase::Apply, Outcome::Skipped) => self.skipped += 1,
        }
    }

    /// Resources visited by the apply pass
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.unhandled
    }
}
