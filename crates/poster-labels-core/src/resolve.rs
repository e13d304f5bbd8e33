//! Learned-correction resolution.
//!
//! [`CorrectionResolver`] turns an extracted field into its corrected form
//! using the tenant's active corrections for that field kind, and records
//! new corrections taught by the user.
//!
//! # Read path
//!
//! Tiers are tried in order; the first that matches wins:
//!
//! 1. **Exact**: case-insensitive equality with a stored original.
//! 2. **Normalized**: equality after [`fold`] (accents stripped,
//!    whitespace collapsed, lowercased).
//! 3. **Token**: each whitespace-separated token is matched (normalized)
//!    independently; matching tokens are replaced and the string rejoined.
//! 4. **Chained**: after an exact/normalized hit, the corrected text is
//!    looked up again, following `A → B → C` for at most
//!    [`MAX_CHAIN_HOPS`] hops. A text seen before ends the chain and the
//!    last resolved value is returned.
//!
//! Every correction applied has its usage recorded before the value is
//! returned. A resolver without a store (see [`CorrectionResolver::disabled`])
//! returns its input unchanged.
//!
//! # Failure semantics
//!
//! [`resolve`](CorrectionResolver::resolve) never fails: a storage error is
//! logged and the candidate comes back unchanged, so one unreachable
//! database never aborts a whole CSV batch. [`learn`](CorrectionResolver::learn)
//! is an explicit user action and propagates storage errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::lifecycle::{validate_correction, Rejection};
use crate::models::{Correction, FieldKind, LearnedCorrection, TenantKey};
use crate::normalize::fold;
use crate::store::{CorrectionStore, UpsertOutcome};

/// Upper bound on `A → B → C …` hops during chained resolution.
pub const MAX_CHAIN_HOPS: usize = 10;

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Normalized,
    Token,
    Chained,
}

/// Result of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    /// `None` when nothing matched and `text` is the candidate itself.
    pub tier: Option<MatchTier>,
    /// Ids of the corrections applied, in application order.
    pub applied: Vec<i64>,
}

impl Resolution {
    fn unchanged(candidate: &str) -> Self {
        Self {
            text: candidate.to_string(),
            tier: None,
            applied: Vec::new(),
        }
    }
}

/// Outcome of [`CorrectionResolver::learn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnOutcome {
    /// Validation refused the request; nothing was written.
    Rejected(Rejection),
    /// History was appended and the correction upserted.
    Stored(UpsertOutcome),
}

/// Lookup tables over one tenant/kind snapshot of active corrections.
///
/// Rows arrive highest-usage first; the first row for a key wins.
struct CorrectionIndex<'a> {
    exact: HashMap<String, &'a Correction>,
    folded: HashMap<String, &'a Correction>,
}

impl<'a> CorrectionIndex<'a> {
    fn new(rows: &'a [Correction]) -> Self {
        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        for c in rows {
            exact.entry(c.original_text.to_lowercase()).or_insert(c);
            folded.entry(fold(&c.original_text)).or_insert(c);
        }
        Self { exact, folded }
    }

    fn direct(&self, text: &str) -> Option<(&'a Correction, MatchTier)> {
        if let Some(c) = self.exact.get(&text.to_lowercase()) {
            return Some((*c, MatchTier::Exact));
        }
        self.normalized(text).map(|c| (c, MatchTier::Normalized))
    }

    fn normalized(&self, text: &str) -> Option<&'a Correction> {
        let key = fold(text);
        if key.is_empty() {
            return None;
        }
        self.folded.get(&key).copied()
    }
}

/// Applies and learns corrections for one injected [`CorrectionStore`].
#[derive(Clone, Default)]
pub struct CorrectionResolver {
    store: Option<Arc<dyn CorrectionStore>>,
}

impl CorrectionResolver {
    pub fn new(store: Arc<dyn CorrectionStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A resolver with no backing store: identity resolution, and `learn`
    /// reports that learning is unavailable.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Arc<dyn CorrectionStore>> {
        self.store.as_ref()
    }

    /// Resolve `candidate`, falling back to it unchanged on any storage error.
    pub async fn resolve(&self, candidate: &str, kind: FieldKind, tenant: &TenantKey) -> String {
        match self.try_resolve(candidate, kind, tenant).await {
            Ok(resolution) => resolution.text,
            Err(e) => {
                warn!(
                    field = %kind,
                    tenant = %tenant,
                    error = %e,
                    "correction lookup failed; keeping extracted text"
                );
                candidate.to_string()
            }
        }
    }

    /// Resolve `candidate`, surfacing storage errors.
    pub async fn try_resolve(
        &self,
        candidate: &str,
        kind: FieldKind,
        tenant: &TenantKey,
    ) -> Result<Resolution> {
        let store = match &self.store {
            Some(s) => s,
            None => return Ok(Resolution::unchanged(candidate)),
        };
        if candidate.trim().is_empty() {
            return Ok(Resolution::unchanged(candidate));
        }

        let rows = store.active_corrections(tenant, kind).await?;
        if rows.is_empty() {
            return Ok(Resolution::unchanged(candidate));
        }
        let index = CorrectionIndex::new(&rows);

        let resolution = match index.direct(candidate) {
            Some((first, tier)) => follow_chain(&index, candidate, first, tier),
            None => substitute_tokens(&index, candidate),
        };

        if !resolution.applied.is_empty() {
            store
                .record_usage(&resolution.applied, chrono::Utc::now().timestamp())
                .await?;
            debug!(
                field = %kind,
                tier = ?resolution.tier,
                from = candidate,
                to = %resolution.text,
                "applied learned correction"
            );
        }
        Ok(resolution)
    }

    /// Teach a correction. Invalid requests are a silent no-op
    /// ([`LearnOutcome::Rejected`]); storage errors propagate.
    pub async fn learn(
        &self,
        original_text: &str,
        corrected_text: &str,
        kind: FieldKind,
        tenant: &TenantKey,
        session_id: &str,
    ) -> Result<LearnOutcome> {
        let original = original_text.trim();
        let corrected = corrected_text.trim();

        if let Err(rejection) = validate_correction(original, corrected) {
            debug!(
                field = %kind,
                original = original_text,
                corrected = corrected_text,
                reason = %rejection,
                "correction ignored"
            );
            return Ok(LearnOutcome::Rejected(rejection));
        }

        let store = match &self.store {
            Some(s) => s,
            None => bail!("learning is unavailable: no correction store is configured"),
        };

        let outcome = store
            .record_correction(&LearnedCorrection {
                tenant: tenant.clone(),
                session_id: session_id.to_string(),
                field_kind: kind,
                original_text: original.to_string(),
                corrected_text: corrected.to_string(),
                at: chrono::Utc::now().timestamp(),
            })
            .await?;
        debug!(field = %kind, tenant = %tenant, outcome = ?outcome, "correction learned");
        Ok(LearnOutcome::Stored(outcome))
    }
}

fn follow_chain(
    index: &CorrectionIndex<'_>,
    candidate: &str,
    first: &Correction,
    tier: MatchTier,
) -> Resolution {
    let mut applied = vec![first.id];
    let mut current = first.corrected_text.clone();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(fold(candidate));
    seen.insert(fold(&current));

    let mut chained = false;
    while applied.len() < MAX_CHAIN_HOPS {
        let next = match index.direct(&current) {
            Some((c, _)) => c,
            None => break,
        };
        if !seen.insert(fold(&next.corrected_text)) {
            break;
        }
        applied.push(next.id);
        current = next.corrected_text.clone();
        chained = true;
    }

    Resolution {
        text: current,
        tier: Some(if chained { MatchTier::Chained } else { tier }),
        applied,
    }
}

fn substitute_tokens(index: &CorrectionIndex<'_>, candidate: &str) -> Resolution {
    let mut applied = Vec::new();
    let tokens: Vec<String> = candidate
        .split_whitespace()
        .map(|token| match index.normalized(token) {
            Some(c) => {
                applied.push(c.id);
                c.corrected_text.clone()
            }
            None => token.to_string(),
        })
        .collect();

    if applied.is_empty() {
        return Resolution::unchanged(candidate);
    }
    Resolution {
        text: tokens.join(" "),
        tier: Some(MatchTier::Token),
        applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CorrectionState;
    use crate::store::memory::InMemoryCorrectionStore;

    fn seeded(rows: &[(FieldKind, &str, &str)]) -> (Arc<InMemoryCorrectionStore>, CorrectionResolver) {
        let store = Arc::new(InMemoryCorrectionStore::new());
        let tenant = TenantKey::anonymous();
        for (kind, from, to) in rows {
            store.insert_raw(&tenant, *kind, from, to, true, 1).unwrap();
        }
        let resolver = CorrectionResolver::new(store.clone());
        (store, resolver)
    }

    async fn usage_of(store: &InMemoryCorrectionStore, original: &str) -> i64 {
        store
            .list_corrections(&TenantKey::anonymous(), CorrectionState::All, None)
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.original_text == original)
            .map(|c| c.usage_count)
            .unwrap()
    }

    #[tokio::test]
    async fn test_exact_match_case_insensitive() {
        let (store, r) = seeded(&[(FieldKind::Name, "REFRI COCA", "REFRIGERANTE COCA-COLA")]);
        let t = TenantKey::anonymous();
        let res = r.try_resolve("refri coca", FieldKind::Name, &t).await.unwrap();
        assert_eq!(res.text, "REFRIGERANTE COCA-COLA");
        assert_eq!(res.tier, Some(MatchTier::Exact));
        assert_eq!(usage_of(&store, "REFRI COCA").await, 2);
    }

    #[tokio::test]
    async fn test_normalized_match_ignores_accents_and_spacing() {
        let (_, r) = seeded(&[(FieldKind::Name, "LEITE ANCÉLI", "LEITE ANCÉLI INTEGRAL")]);
        let t = TenantKey::anonymous();
        let res = r.try_resolve("LEITE  ANCELI", FieldKind::Name, &t).await.unwrap();
        assert_eq!(res.text, "LEITE ANCÉLI INTEGRAL");
        assert_eq!(res.tier, Some(MatchTier::Normalized));
    }

    #[tokio::test]
    async fn test_exact_match_beats_token_rule() {
        let (store, r) = seeded(&[
            (FieldKind::Name, "COCA COLA LATA", "COCA-COLA LATA"),
            (FieldKind::Name, "LATA", "LATA 350ML"),
        ]);
        let t = TenantKey::anonymous();
        let res = r.try_resolve("COCA COLA LATA", FieldKind::Name, &t).await.unwrap();
        assert_eq!(res.text, "COCA-COLA LATA");
        assert_eq!(res.tier, Some(MatchTier::Exact));
        assert_eq!(usage_of(&store, "LATA").await, 1);
    }

    #[tokio::test]
    async fn test_token_substitution() {
        let (store, r) = seeded(&[
            (FieldKind::Name, "REFRIG", "REFRIGERANTE"),
            (FieldKind::Name, "GUARANA", "GUARANÁ"),
        ]);
        let t = TenantKey::anonymous();
        let res = r
            .try_resolve("REFRIG  GUARANA ANTARCTICA", FieldKind::Name, &t)
            .await
            .unwrap();
        assert_eq!(res.text, "REFRIGERANTE GUARANÁ ANTARCTICA");
        assert_eq!(res.tier, Some(MatchTier::Token));
        assert_eq!(res.applied.len(), 2);
        assert_eq!(usage_of(&store, "REFRIG").await, 2);
    }

    #[tokio::test]
    async fn test_chain_resolution() {
        let (_, r) = seeded(&[(FieldKind::Name, "A", "B"), (FieldKind::Name, "B", "C")]);
        let t = TenantKey::anonymous();
        let res = r.try_resolve("A", FieldKind::Name, &t).await.unwrap();
        assert_eq!(res.text, "C");
        assert_eq!(res.tier, Some(MatchTier::Chained));
        assert_eq!(res.applied.len(), 2);
    }

    #[tokio::test]
    async fn test_chain_cycle_terminates() {
        let (_, r) = seeded(&[(FieldKind::Name, "A", "B"), (FieldKind::Name, "B", "A")]);
        let t = TenantKey::anonymous();
        let first = r.try_resolve("A", FieldKind::Name, &t).await.unwrap();
        let second = r.try_resolve("A", FieldKind::Name, &t).await.unwrap();
        assert_eq!(first.text, "B");
        assert_eq!(first.text, second.text);
    }

    #[tokio::test]
    async fn test_chain_bounded_by_max_hops() {
        let names: Vec<String> = (0..=15).map(|i| format!("N{}", i)).collect();
        let rows: Vec<(FieldKind, &str, &str)> = names
            .windows(2)
            .map(|w| (FieldKind::Name, w[0].as_str(), w[1].as_str()))
            .collect();
        let (_, r) = seeded(&rows);
        let res = r
            .try_resolve("N0", FieldKind::Name, &TenantKey::anonymous())
            .await
            .unwrap();
        assert_eq!(res.applied.len(), MAX_CHAIN_HOPS);
        assert_eq!(res.text, format!("N{}", MAX_CHAIN_HOPS));
    }

    #[tokio::test]
    async fn test_field_kind_scoping() {
        let (_, r) = seeded(&[(FieldKind::Weight, "1 KG", "1KG")]);
        let t = TenantKey::anonymous();
        assert_eq!(r.resolve("1 KG", FieldKind::Name, &t).await, "1 KG");
        assert_eq!(r.resolve("1 KG", FieldKind::Weight, &t).await, "1KG");
    }

    #[tokio::test]
    async fn test_inactive_correction_ignored() {
        let store = Arc::new(InMemoryCorrectionStore::new());
        let t = TenantKey::anonymous();
        store
            .insert_raw(&t, FieldKind::Name, "FEIJAO", "FEIJÃO", false, 1)
            .unwrap();
        let r = CorrectionResolver::new(store);
        assert_eq!(r.resolve("FEIJAO", FieldKind::Name, &t).await, "FEIJAO");
    }

    #[tokio::test]
    async fn test_no_match_passthrough() {
        let (_, r) = seeded(&[(FieldKind::Name, "X", "Y")]);
        let res = r
            .try_resolve("ARROZ", FieldKind::Name, &TenantKey::anonymous())
            .await
            .unwrap();
        assert_eq!(res, Resolution::unchanged("ARROZ"));
    }

    #[tokio::test]
    async fn test_disabled_resolver_is_identity() {
        let r = CorrectionResolver::disabled();
        let t = TenantKey::anonymous();
        assert!(!r.is_enabled());
        assert_eq!(r.resolve("ARROZ", FieldKind::Name, &t).await, "ARROZ");
        assert!(r.learn("ARROZ", "ARROZ TIO JOAO", FieldKind::Name, &t, "s").await.is_err());
    }

    #[tokio::test]
    async fn test_learn_rejects_short_correction() {
        let (store, r) = seeded(&[]);
        let t = TenantKey::anonymous();
        let out = r
            .learn("REFRIGERANTE COLA", "C", FieldKind::Name, &t, "s1")
            .await
            .unwrap();
        assert_eq!(out, LearnOutcome::Rejected(Rejection::TooShort));
        assert!(store.all_corrections().await.unwrap().is_empty());
        assert!(store.history(&t, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_learn_upsert_keeps_single_row() {
        let (store, r) = seeded(&[]);
        let t = TenantKey::new(Some("ana"), Some("loja-1"));
        r.learn("X", "Y", FieldKind::Name, &t, "s1").await.unwrap();
        r.learn("X", "Z", FieldKind::Name, &t, "s2").await.unwrap();
        let rows = store.active_corrections(&t, FieldKind::Name).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].corrected_text, "Z");
        assert_eq!(rows[0].usage_count, 2);
    }

    #[tokio::test]
    async fn test_learned_correction_applies_on_next_resolve() {
        let (_, r) = seeded(&[]);
        let t = TenantKey::anonymous();
        r.learn("ACUCAR UNIAO", "AÇÚCAR UNIÃO", FieldKind::Name, &t, "s")
            .await
            .unwrap();
        assert_eq!(r.resolve("AÇUCAR UNIÃO", FieldKind::Name, &t).await, "AÇÚCAR UNIÃO");
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl CorrectionStore for BrokenStore {
        async fn active_corrections(&self, _: &TenantKey, _: FieldKind) -> Result<Vec<Correction>> {
            bail!("database is unreachable")
        }
        async fn record_usage(&self, _: &[i64], _: i64) -> Result<()> {
            bail!("database is unreachable")
        }
        async fn record_correction(&self, _: &LearnedCorrection) -> Result<UpsertOutcome> {
            bail!("database is unreachable")
        }
        async fn get_correction(&self, _: &TenantKey, _: i64) -> Result<Option<Correction>> {
            bail!("database is unreachable")
        }
        async fn list_corrections(
            &self,
            _: &TenantKey,
            _: CorrectionState,
            _: Option<FieldKind>,
        ) -> Result<Vec<Correction>> {
            bail!("database is unreachable")
        }
        async fn set_active(&self, _: &TenantKey, _: i64, _: bool, _: i64) -> Result<bool> {
            bail!("database is unreachable")
        }
        async fn remove_correction(&self, _: &TenantKey, _: i64) -> Result<bool> {
            bail!("database is unreachable")
        }
        async fn history(
            &self,
            _: &TenantKey,
            _: usize,
        ) -> Result<Vec<crate::models::CorrectionHistoryEntry>> {
            bail!("database is unreachable")
        }
        async fn stats(&self, _: &TenantKey) -> Result<crate::models::CorrectionStats> {
            bail!("database is unreachable")
        }
        async fn all_corrections(&self) -> Result<Vec<Correction>> {
            bail!("database is unreachable")
        }
        async fn remove_corrections(&self, _: &[i64]) -> Result<u64> {
            bail!("database is unreachable")
        }
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_passthrough() {
        let r = CorrectionResolver::new(Arc::new(BrokenStore));
        let t = TenantKey::anonymous();
        assert_eq!(r.resolve("ARROZ", FieldKind::Name, &t).await, "ARROZ");
        assert!(r.try_resolve("ARROZ", FieldKind::Name, &t).await.is_err());
        assert!(r.learn("ARROZ", "ARROZ TIO JOAO", FieldKind::Name, &t, "s").await.is_err());
    }
}
