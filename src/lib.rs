pub mod config;
pub mod db;
pub mod fixtures;
pub mod models;
pub mod utils;
pub mod validation;

use std::{fs, path::Path};

use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{info, warn};

use db::{Store, StoreError};
use models::{Event, EventCandidate, EventSubmission};
use validation::{ValidationResult, Violation};

pub use validation::validate;

#[derive(Deserialize)]
#[serde(untagged)]
enum SubmissionFile {
    Many(Vec<EventSubmission>),
    One(EventSubmission),
}

/// One candidate's outcome from [`check_candidates`] or [`import_candidates`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOutcome {
    pub index: usize,
    pub name: Option<String>,
    pub violations: Vec<Violation>,
}

impl CandidateOutcome {
    pub fn is_accepted(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Event>,
    pub rejected: Vec<CandidateOutcome>,
}

/// Reads a JSON file holding one submission or an array of them.
pub fn read_submissions(path: &Path, tz: Tz) -> anyhow::Result<Vec<EventCandidate>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    let parsed: SubmissionFile = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid event submission file", path.display()))?;
    let submissions = match parsed {
        SubmissionFile::Many(items) => items,
        SubmissionFile::One(item) => vec![item],
    };
    Ok(submissions
        .into_iter()
        .map(|submission| submission.into_candidate(tz))
        .collect())
}

/// Dry run: validates each candidate against the store and against the
/// candidates accepted before it in the same batch.
pub fn check_candidates(
    store: &Store,
    candidates: &[EventCandidate],
) -> Result<Vec<CandidateOutcome>, StoreError> {
    let mut accepted: Vec<Event> = Vec::new();
    let mut outcomes = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        // Same as `Store::insert`: a submitted id never exempts the candidate.
        let candidate = &EventCandidate {
            id: None,
            ..candidate.clone()
        };
        let mut existing = match candidate.uniqueness_key() {
            Some(key) => store.snapshot_for(&key)?,
            None => Vec::new(),
        };
        existing.extend(accepted.iter().cloned());

        let violations = match validation::validate_new(candidate, &existing) {
            Ok(fields) => {
                // Placeholder id; candidates here never carry one.
                accepted.push(fields.into_event(0, Utc::now(), Utc::now()));
                Vec::new()
            }
            Err(errors) => errors.0,
        };
        outcomes.push(CandidateOutcome {
            index,
            name: candidate.name.clone(),
            violations,
        });
    }

    Ok(outcomes)
}

/// Inserts every valid candidate in order. Rejections are collected, not fatal;
/// only storage failures abort the run.
pub fn import_candidates(
    store: &mut Store,
    candidates: &[EventCandidate],
) -> Result<ImportReport, StoreError> {
    let mut report = ImportReport::default();
    if candidates.is_empty() {
        return Ok(report);
    }

    for (index, candidate) in candidates.iter().enumerate() {
        match store.insert(candidate) {
            Ok(event) => report.imported.push(event),
            Err(StoreError::Invalid(errors)) => {
                warn!(index, "rejected event candidate: {errors}");
                report.rejected.push(CandidateOutcome {
                    index,
                    name: candidate.name.clone(),
                    violations: errors.0,
                });
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        imported = report.imported.len(),
        rejected = report.rejected.len(),
        "import finished"
    );
    Ok(report)
}

/// Convenience over [`validate`] for callers holding a store.
pub fn validate_against_store(
    store: &Store,
    candidate: &EventCandidate,
) -> Result<ValidationResult, StoreError> {
    let existing = match candidate.uniqueness_key() {
        Some(key) => store.snapshot_for(&key)?,
        None => Vec::new(),
    };
    Ok(validate(candidate, &existing))
}
