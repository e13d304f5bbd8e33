//! Storage abstraction for learned corrections.
//!
//! The [`CorrectionStore`] trait defines every storage operation the
//! resolver and lifecycle manager need, enabling pluggable backends
//! (SQLite in the `posters` binary, in-memory for tests and single-node
//! use).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Invariants every backend upholds
//!
//! - At most one *active* correction per (tenant, field kind, lowercased
//!   original text). [`record_correction`](CorrectionStore::record_correction)
//!   updates in place instead of inserting a duplicate.
//! - The history log is append-only: one entry per accepted learn event,
//!   written in the same unit of work as the upsert.
//! - [`record_usage`](CorrectionStore::record_usage) increments atomically,
//!   so concurrent resolutions never corrupt or duplicate a row.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    Correction, CorrectionHistoryEntry, CorrectionState, CorrectionStats, FieldKind,
    LearnedCorrection, TenantKey,
};

/// What [`CorrectionStore::record_correction`] did with an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new active correction was inserted with this id.
    Created(i64),
    /// The existing active correction with this id was updated.
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

/// Key used for the one-active-correction-per-original invariant.
pub fn original_key(original_text: &str) -> String {
    original_text.to_lowercase()
}

/// Abstract storage backend for learned corrections.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`active_corrections`](CorrectionStore::active_corrections) | Active corrections for one tenant and field kind |
/// | [`record_usage`](CorrectionStore::record_usage) | Bump usage count and timestamps |
/// | [`record_correction`](CorrectionStore::record_correction) | Append history and upsert a correction |
/// | [`get_correction`](CorrectionStore::get_correction) | Fetch one correction within a tenant |
/// | [`list_corrections`](CorrectionStore::list_corrections) | List by state and field kind |
/// | [`set_active`](CorrectionStore::set_active) | Deactivate or reactivate |
/// | [`remove_correction`](CorrectionStore::remove_correction) | Hard delete |
/// | [`history`](CorrectionStore::history) | Newest-first audit log |
/// | [`stats`](CorrectionStore::stats) | Per-tenant counts |
/// | [`all_corrections`](CorrectionStore::all_corrections) | Every row, all tenants (for sweeps) |
/// | [`remove_corrections`](CorrectionStore::remove_corrections) | Bulk hard delete |
#[async_trait]
pub trait CorrectionStore: Send + Sync {
    /// Active corrections for `tenant` and `kind`, highest usage first,
    /// then oldest id first.
    async fn active_corrections(
        &self,
        tenant: &TenantKey,
        kind: FieldKind,
    ) -> Result<Vec<Correction>>;

    /// Increment `usage_count` and set `last_used_at`/`updated_at` to `at`
    /// for each id. An id listed twice is incremented twice.
    async fn record_usage(&self, ids: &[i64], at: i64) -> Result<()>;

    /// Append a history entry, then update the matching active correction
    /// (new corrected text, usage + 1) or insert a new one with usage 1.
    async fn record_correction(&self, learned: &LearnedCorrection) -> Result<UpsertOutcome>;

    /// Fetch a correction by id, only if it belongs to `tenant`.
    async fn get_correction(&self, tenant: &TenantKey, id: i64) -> Result<Option<Correction>>;

    /// Corrections for `tenant` in the given state, optionally one kind,
    /// highest usage first.
    async fn list_corrections(
        &self,
        tenant: &TenantKey,
        state: CorrectionState,
        kind: Option<FieldKind>,
    ) -> Result<Vec<Correction>>;

    /// Set the `active` flag. Returns `false` if no such correction exists
    /// for `tenant`.
    async fn set_active(&self, tenant: &TenantKey, id: i64, active: bool, at: i64)
        -> Result<bool>;

    /// Delete a correction. Returns `false` if no such correction exists
    /// for `tenant`.
    async fn remove_correction(&self, tenant: &TenantKey, id: i64) -> Result<bool>;

    /// Up to `limit` history entries for `tenant`, newest first.
    async fn history(&self, tenant: &TenantKey, limit: usize)
        -> Result<Vec<CorrectionHistoryEntry>>;

    /// Counts for the administration view.
    async fn stats(&self, tenant: &TenantKey) -> Result<CorrectionStats>;

    /// Every stored correction across all tenants, active or not.
    async fn all_corrections(&self) -> Result<Vec<Correction>>;

    /// Delete the given ids regardless of tenant. Returns how many existed.
    async fn remove_corrections(&self, ids: &[i64]) -> Result<u64>;
}
