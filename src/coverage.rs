//! Enrollment coverage reporting.
//!
//! Derived on demand from the profile store and the roster; holds no state
//! of its own. Surfaces legislators who are unenrolled or sitting below the
//! minimum sample count, so operators know which meetings to label next.

use crate::error::{Result, RollcallError};
use crate::roster::RosterIndex;
use crate::store::ProfileStore;
use serde::Serialize;

/// Per-legislator coverage line.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageEntry {
    pub slug: String,
    pub name: String,
    pub chamber: String,
    pub samples: u32,
    pub meetings: u32,
    pub total_speech_secs: f64,
    pub enrolled: bool,
    /// Enrolled, but with fewer samples than the configured minimum.
    pub below_minimum: bool,
}

/// Coverage across the whole roster.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub entries: Vec<CoverageEntry>,
    pub total: usize,
    pub enrolled: usize,
    pub unenrolled: usize,
    pub weak: usize,
    pub min_samples: u32,
}

/// Compute coverage for every roster entry.
///
/// Entities without a profile document count as unenrolled rather than
/// erroring; the roster is the authoritative population.
pub fn coverage_report(
    store: &ProfileStore,
    roster: &RosterIndex,
    min_samples: u32,
) -> Result<CoverageReport> {
    let mut entries = Vec::with_capacity(roster.len());
    let mut enrolled = 0;
    let mut weak = 0;

    for roster_entry in roster.entries() {
        let (samples, meetings, total_speech_secs) = match store.get(&roster_entry.slug) {
            Ok(profile) => (
                profile.stats.total_samples,
                profile.stats.meetings.len() as u32,
                profile.stats.total_speech_secs,
            ),
            Err(RollcallError::NotFound { .. }) => (0, 0, 0.0),
            Err(e) => return Err(e),
        };

        let is_enrolled = samples > 0;
        let below_minimum = is_enrolled && samples < min_samples;
        if is_enrolled {
            enrolled += 1;
        }
        if below_minimum {
            weak += 1;
        }

        entries.push(CoverageEntry {
            slug: roster_entry.slug.clone(),
            name: roster_entry.name.clone(),
            chamber: roster_entry.chamber.clone(),
            samples,
            meetings,
            total_speech_secs,
            enrolled: is_enrolled,
            below_minimum,
        });
    }

    let total = entries.len();
    Ok(CoverageReport {
        unenrolled: total - enrolled,
        entries,
        total,
        enrolled,
        weak,
        min_samples,
    })
}
