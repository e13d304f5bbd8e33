//! In-memory [`CorrectionStore`] implementation for tests and single-node use.
//!
//! Corrections and history live in `Vec`s behind one `std::sync::Mutex`,
//! so an upsert and its history entry are applied together. Nothing
//! survives the process.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{
    Correction, CorrectionHistoryEntry, CorrectionState, CorrectionStats, FieldKind,
    LearnedCorrection, TenantKey,
};

use super::{original_key, CorrectionStore, UpsertOutcome};

#[derive(Default)]
struct Inner {
    corrections: Vec<Correction>,
    history: Vec<CorrectionHistoryEntry>,
    next_correction_id: i64,
    next_history_id: i64,
}

/// In-memory correction store.
#[derive(Default)]
pub struct InMemoryCorrectionStore {
    inner: Mutex<Inner>,
}

impl InMemoryCorrectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a correction row verbatim, bypassing validation.
    ///
    /// Used to seed legacy or degenerate data that the learn path would
    /// refuse. Returns the assigned id.
    pub fn insert_raw(
        &self,
        tenant: &TenantKey,
        kind: FieldKind,
        original_text: &str,
        corrected_text: &str,
        active: bool,
        at: i64,
    ) -> Result<i64> {
        let mut inner = self.lock()?;
        inner.next_correction_id += 1;
        let id = inner.next_correction_id;
        inner.corrections.push(Correction {
            id,
            tenant: tenant.clone(),
            field_kind: kind,
            original_text: original_text.to_string(),
            corrected_text: corrected_text.to_string(),
            usage_count: 1,
            active,
            created_at: at,
            updated_at: at,
            last_used_at: at,
        });
        Ok(id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("in-memory correction store lock poisoned"))
    }
}

fn by_usage(rows: &mut [Correction]) {
    rows.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl CorrectionStore for InMemoryCorrectionStore {
    async fn active_corrections(
        &self,
        tenant: &TenantKey,
        kind: FieldKind,
    ) -> Result<Vec<Correction>> {
        let inner = self.lock()?;
        let mut rows: Vec<Correction> = inner
            .corrections
            .iter()
            .filter(|c| c.active && c.field_kind == kind && &c.tenant == tenant)
            .cloned()
            .collect();
        by_usage(&mut rows);
        Ok(rows)
    }

    async fn record_usage(&self, ids: &[i64], at: i64) -> Result<()> {
        let mut inner = self.lock()?;
        for id in ids {
            if let Some(c) = inner.corrections.iter_mut().find(|c| c.id == *id) {
                c.usage_count += 1;
                c.last_used_at = at;
                c.updated_at = at;
            }
        }
        Ok(())
    }

    async fn record_correction(&self, learned: &LearnedCorrection) -> Result<UpsertOutcome> {
        let mut inner = self.lock()?;

        inner.next_history_id += 1;
        let history_id = inner.next_history_id;
        inner.history.push(CorrectionHistoryEntry {
            id: history_id,
            tenant: learned.tenant.clone(),
            session_id: learned.session_id.clone(),
            field_kind: learned.field_kind,
            original_text: learned.original_text.clone(),
            corrected_text: learned.corrected_text.clone(),
            created_at: learned.at,
        });

        let key = original_key(&learned.original_text);
        let existing = inner.corrections.iter_mut().find(|c| {
            c.active
                && c.field_kind == learned.field_kind
                && c.tenant == learned.tenant
                && original_key(&c.original_text) == key
        });

        if let Some(c) = existing {
            c.corrected_text = learned.corrected_text.clone();
            c.usage_count += 1;
            c.updated_at = learned.at;
            c.last_used_at = learned.at;
            return Ok(UpsertOutcome::Updated(c.id));
        }

        inner.next_correction_id += 1;
        let id = inner.next_correction_id;
        inner.corrections.push(Correction {
            id,
            tenant: learned.tenant.clone(),
            field_kind: learned.field_kind,
            original_text: learned.original_text.clone(),
            corrected_text: learned.corrected_text.clone(),
            usage_count: 1,
            active: true,
            created_at: learned.at,
            updated_at: learned.at,
            last_used_at: learned.at,
        });
        Ok(UpsertOutcome::Created(id))
    }

    async fn get_correction(&self, tenant: &TenantKey, id: i64) -> Result<Option<Correction>> {
        let inner = self.lock()?;
        Ok(inner
            .corrections
            .iter()
            .find(|c| c.id == id && &c.tenant == tenant)
            .cloned())
    }

    async fn list_corrections(
        &self,
        tenant: &TenantKey,
        state: CorrectionState,
        kind: Option<FieldKind>,
    ) -> Result<Vec<Correction>> {
        let inner = self.lock()?;
        let mut rows: Vec<Correction> = inner
            .corrections
            .iter()
            .filter(|c| &c.tenant == tenant && state.matches(c.active))
            .filter(|c| kind.map_or(true, |k| c.field_kind == k))
            .cloned()
            .collect();
        by_usage(&mut rows);
        Ok(rows)
    }

    async fn set_active(
        &self,
        tenant: &TenantKey,
        id: i64,
        active: bool,
        at: i64,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner
            .corrections
            .iter_mut()
            .find(|c| c.id == id && &c.tenant == tenant)
        {
            Some(c) => {
                c.active = active;
                c.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_correction(&self, tenant: &TenantKey, id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.corrections.len();
        inner
            .corrections
            .retain(|c| !(c.id == id && &c.tenant == tenant));
        Ok(inner.corrections.len() < before)
    }

    async fn history(
        &self,
        tenant: &TenantKey,
        limit: usize,
    ) -> Result<Vec<CorrectionHistoryEntry>> {
        let inner = self.lock()?;
        let mut rows: Vec<CorrectionHistoryEntry> = inner
            .history
            .iter()
            .filter(|h| &h.tenant == tenant)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn stats(&self, tenant: &TenantKey) -> Result<CorrectionStats> {
        let inner = self.lock()?;
        let mine: Vec<&Correction> = inner
            .corrections
            .iter()
            .filter(|c| &c.tenant == tenant)
            .collect();
        let count_kind = |k: FieldKind| mine.iter().filter(|c| c.field_kind == k).count() as i64;
        Ok(CorrectionStats {
            total: mine.len() as i64,
            active: mine.iter().filter(|c| c.active).count() as i64,
            history: inner.history.iter().filter(|h| &h.tenant == tenant).count() as i64,
            names: count_kind(FieldKind::Name),
            weights: count_kind(FieldKind::Weight),
            varieties: count_kind(FieldKind::Variety),
        })
    }

    async fn all_corrections(&self) -> Result<Vec<Correction>> {
        let inner = self.lock()?;
        Ok(inner.corrections.clone())
    }

    async fn remove_corrections(&self, ids: &[i64]) -> Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.corrections.len();
        inner.corrections.retain(|c| !ids.contains(&c.id));
        Ok((before - inner.corrections.len()) as u64)
    }
}
