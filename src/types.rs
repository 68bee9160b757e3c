//! Public types produced by probe runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Tri-state verdict of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    /// The check passed.
    Good,
    /// The check completed and the host failed it.
    Bad,
    /// The check could not be carried out; see [`ProbeReport::error`].
    Skipped,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Bad => write!(f, "bad"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Probe-specific evidence payload.
///
/// Each probe produces its own shape; callers interpret the payload according
/// to which probe produced it. Dial probes produce no payload at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ProbeOutput {
    /// Resolved addresses, in resolver order (IPv4 and IPv6 may be mixed).
    Addresses(Vec<String>),
    /// Address → "is inside a published range" flag, one entry per address.
    RangeMembership(BTreeMap<String, bool>),
}

/// Completed probe verdict.
///
/// Hard failures (bad input, resolution errors, dial errors) are returned as
/// `Err(ProbeError)` instead of a report; an `Err` is a failing, inconclusive
/// outcome with no grade. A report with [`Grade::Skipped`] carries the
/// underlying error in [`error`](Self::error) so the caller can see why the
/// check was inconclusive without treating it as a probe failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    /// Verdict quality.
    pub grade: Grade,
    /// Evidence backing the verdict, when the probe produces any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ProbeOutput>,
    /// The error that made a [`Grade::Skipped`] verdict inconclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl ProbeReport {
    /// A `Good` verdict with optional evidence.
    #[must_use]
    pub fn good(output: Option<ProbeOutput>) -> Self {
        Self {
            grade: Grade::Good,
            output,
            error: None,
        }
    }

    /// An inconclusive verdict carrying the error that prevented the check.
    #[must_use]
    pub fn skipped(error: ProbeError) -> Self {
        Self {
            grade: Grade::Skipped,
            output: None,
            error: Some(error),
        }
    }
}
