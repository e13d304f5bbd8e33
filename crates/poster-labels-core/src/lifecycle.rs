//! Correction lifecycle: validation, administration, and cleanup.
//!
//! [`validate_correction`] is the gate every learn request passes through.
//! [`CorrectionLifecycle`] wraps a [`CorrectionStore`] with the operator
//! actions: listing, history, stats, deactivate/reactivate/remove, and the
//! [`sweep`](CorrectionLifecycle::sweep) that purges rows the learn path
//! would never have accepted.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::models::{
    Correction, CorrectionHistoryEntry, CorrectionState, CorrectionStats, FieldKind, TenantKey,
};
use crate::store::{original_key, CorrectionStore};

/// Default number of history entries shown.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Why a learn request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("original text is empty")]
    EmptyOriginal,
    #[error("corrected text is identical to the original")]
    Unchanged,
    #[error("corrected text is too short")]
    TooShort,
}

/// Accept or refuse an (original, corrected) pair.
///
/// Corrected text of one character or less is refused.
pub fn validate_correction(original: &str, corrected: &str) -> Result<(), Rejection> {
    if original.trim().is_empty() {
        return Err(Rejection::EmptyOriginal);
    }
    if original == corrected {
        return Err(Rejection::Unchanged);
    }
    if corrected.trim().chars().count() <= 1 {
        return Err(Rejection::TooShort);
    }
    Ok(())
}

/// Errors from operator actions on a single correction.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("correction {0} not found")]
    NotFound(i64),
    #[error(
        "correction {id} cannot be reactivated: correction {active_id} is already active for '{original_text}'"
    )]
    Conflict {
        id: i64,
        active_id: i64,
        original_text: String,
    },
}

/// Why [`CorrectionLifecycle::sweep`] removed a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepReason {
    /// Empty original or corrected text, or corrected equal to original.
    Invalid,
    /// Corrected text of at most one character, or with trailing whitespace.
    Degenerate,
}

/// Classify a stored correction, `None` if it is healthy.
pub fn classify(c: &Correction) -> Option<SweepReason> {
    let original = c.original_text.trim();
    let corrected = c.corrected_text.trim();
    if original.is_empty() || corrected.is_empty() || c.original_text == c.corrected_text {
        return Some(SweepReason::Invalid);
    }
    if corrected.chars().count() <= 1 || c.corrected_text.ends_with(char::is_whitespace) {
        return Some(SweepReason::Degenerate);
    }
    None
}

/// Counts removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invalid: u64,
    pub degenerate: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.invalid + self.degenerate
    }
}

/// Operator-facing operations over one correction store.
#[derive(Clone)]
pub struct CorrectionLifecycle {
    store: Arc<dyn CorrectionStore>,
}

impl CorrectionLifecycle {
    pub fn new(store: Arc<dyn CorrectionStore>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        tenant: &TenantKey,
        state: CorrectionState,
        kind: Option<FieldKind>,
    ) -> Result<Vec<Correction>> {
        self.store.list_corrections(tenant, state, kind).await
    }

    /// Newest-first learn events; `None` means [`DEFAULT_HISTORY_LIMIT`].
    pub async fn history(
        &self,
        tenant: &TenantKey,
        limit: Option<usize>,
    ) -> Result<Vec<CorrectionHistoryEntry>> {
        self.store
            .history(tenant, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
    }

    pub async fn stats(&self, tenant: &TenantKey) -> Result<CorrectionStats> {
        self.store.stats(tenant).await
    }

    /// Stop applying a correction without deleting it.
    pub async fn deactivate(&self, tenant: &TenantKey, id: i64) -> Result<()> {
        if !self.store.set_active(tenant, id, false, now()).await? {
            return Err(LifecycleError::NotFound(id).into());
        }
        info!(id, tenant = %tenant, "correction deactivated");
        Ok(())
    }

    /// Re-enable a correction, unless another active correction already
    /// covers the same original text.
    pub async fn reactivate(&self, tenant: &TenantKey, id: i64) -> Result<()> {
        let correction = self
            .store
            .get_correction(tenant, id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        if correction.active {
            return Ok(());
        }

        let key = original_key(&correction.original_text);
        let clash = self
            .store
            .active_corrections(tenant, correction.field_kind)
            .await?
            .into_iter()
            .find(|c| c.id != id && original_key(&c.original_text) == key);
        if let Some(active) = clash {
            return Err(LifecycleError::Conflict {
                id,
                active_id: active.id,
                original_text: correction.original_text,
            }
            .into());
        }

        self.store.set_active(tenant, id, true, now()).await?;
        info!(id, tenant = %tenant, "correction reactivated");
        Ok(())
    }

    /// Hard-delete a correction. History is kept.
    pub async fn remove(&self, tenant: &TenantKey, id: i64) -> Result<()> {
        if !self.store.remove_correction(tenant, id).await? {
            return Err(LifecycleError::NotFound(id).into());
        }
        info!(id, tenant = %tenant, "correction removed");
        Ok(())
    }

    /// Delete invalid and degenerate rows across all tenants.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut doomed = Vec::new();
        for c in self.store.all_corrections().await? {
            match classify(&c) {
                Some(SweepReason::Invalid) => report.invalid += 1,
                Some(SweepReason::Degenerate) => report.degenerate += 1,
                None => continue,
            }
            doomed.push(c.id);
        }

        if !doomed.is_empty() {
            self.store.remove_corrections(&doomed).await?;
        }
        info!(
            invalid = report.invalid,
            degenerate = report.degenerate,
            "correction sweep finished"
        );
        Ok(report)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
