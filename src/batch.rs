// src/batch.rs — Per-run accounting shared by generate and evaluate

use std::fmt;

use tracing::{error, warn};

use crate::infra::errors::PipelineError;

/// An item left pending by this run, with the reason it was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    /// Pair key (`3 -> 17`) or argument id (`argument 42`).
    pub item: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Items selected as pending at the start of the run.
    pub selected: usize,
    /// Records written.
    pub completed: usize,
    pub skipped: Vec<Skipped>,
}

impl BatchReport {
    pub fn with_selected(selected: usize) -> Self {
        Self {
            selected,
            ..Default::default()
        }
    }

    pub fn skip(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            item: item.into(),
            reason: reason.into(),
        });
    }

    /// Log a per-item failure and leave the item pending. Fatal errors are
    /// handed back so the run stops.
    pub fn fail(&mut self, item: impl Into<String>, err: PipelineError) -> Result<(), PipelineError> {
        if err.is_fatal() {
            return Err(err);
        }
        let item = item.into();
        if err.is_transient() {
            warn!("Skipping {}: {}", item, err);
        } else {
            error!("Skipping {}: {}", item, err);
        }
        self.skip(item, err.to_string());
        Ok(())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} selected, {} written, {} skipped",
            self.selected,
            self.completed,
            self.skipped.len()
        )
    }
}
