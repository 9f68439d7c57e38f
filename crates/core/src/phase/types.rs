//! The `Phase` progress value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a plot job, as `major:minor`.
///
/// Unknown phases sort below every known one; known phases compare
/// lexicographically on `(major, minor)`. Field order matters for the
/// derived ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Phase {
    known: bool,
    major: u32,
    minor: u32,
}

impl Phase {
    /// A known phase.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            known: true,
            major,
            minor,
        }
    }

    /// A phase that could not be determined (e.g. no log file).
    pub const fn unknown() -> Self {
        Self {
            known: false,
            major: 0,
            minor: 0,
        }
    }

    /// Known to exist but not yet started.
    pub const fn not_started() -> Self {
        Self::new(0, 0)
    }

    pub fn is_known(&self) -> bool {
        self.known
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.known {
            write!(f, "{}:{}", self.major, self.minor)
        } else {
            write!(f, "?:?")
        }
    }
}
