//! Input validation, run before anything is downloaded or staged.

use super::FailureKind;

/// Result of checking a request against the input limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(FailureKind),
}

/// Upper bound on the reported source duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationLimit {
    max_secs: u32,
}

impl DurationLimit {
    pub fn new(max_secs: u32) -> Self {
        Self { max_secs }
    }

    pub fn max_secs(&self) -> u32 {
        self.max_secs
    }

    /// Accept durations up to and including the limit.
    pub fn check(&self, duration_secs: u32) -> Verdict {
        if duration_secs > self.max_secs {
            Verdict::Reject(FailureKind::DurationExceeded {
                duration_secs,
                limit_secs: self.max_secs,
            })
        } else {
            Verdict::Accept
        }
    }
}

impl Default for DurationLimit {
    fn default() -> Self {
        Self::new(60)
    }
}
