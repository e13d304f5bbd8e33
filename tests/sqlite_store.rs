use std::sync::Arc;

use tempfile::TempDir;

use poster_labels::config::Config;
use poster_labels::db;
use poster_labels::migrate;
use poster_labels::sqlite_store::SqliteCorrectionStore;
use poster_labels_core::lifecycle::{CorrectionLifecycle, LifecycleError, SweepReport};
use poster_labels_core::models::{CorrectionState, FieldKind, RawLine, TenantKey};
use poster_labels_core::process::DescriptionProcessor;
use poster_labels_core::resolve::{CorrectionResolver, LearnOutcome, MatchTier};
use poster_labels_core::store::{CorrectionStore, UpsertOutcome};
use rust_decimal::Decimal;

async fn setup() -> (TempDir, Arc<SqliteCorrectionStore>) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("data").join("posters.sqlite");
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    (tmp, Arc::new(SqliteCorrectionStore::new(pool)))
}

#[tokio::test]
async fn test_migrations_idempotent() {
    let (_tmp, store) = setup().await;
    migrate::apply(store.pool()).await.unwrap();
    migrate::apply(store.pool()).await.unwrap();
}

#[tokio::test]
async fn test_upsert_uniqueness() {
    let (_tmp, store) = setup().await;
    let resolver = CorrectionResolver::new(store.clone());
    let t = TenantKey::new(Some("maria"), Some("loja-centro"));

    let first = resolver.learn("X", "Y", FieldKind::Name, &t, "s1").await.unwrap();
    let second = resolver.learn("X", "Z", FieldKind::Name, &t, "s2").await.unwrap();
    let id = match first {
        LearnOutcome::Stored(UpsertOutcome::Created(id)) => id,
        other => panic!("expected created, got {:?}", other),
    };
    assert_eq!(second, LearnOutcome::Stored(UpsertOutcome::Updated(id)));

    let rows = store.active_corrections(&t, FieldKind::Name).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].corrected_text, "Z");
    assert_eq!(rows[0].usage_count, 2);

    let history = store.history(&t, 50).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].session_id, "s2");
}

#[tokio::test]
async fn test_upsert_is_case_insensitive() {
    let (_tmp, store) = setup().await;
    let resolver = CorrectionResolver::new(store.clone());
    let t = TenantKey::anonymous();
    resolver.learn("Refri", "REFRIGERANTE", FieldKind::Name, &t, "s").await.unwrap();
    resolver.learn("REFRI", "REFRIGERANTE 2L", FieldKind::Name, &t, "s").await.unwrap();
    let rows = store.active_corrections(&t, FieldKind::Name).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].original_text, "Refri");
    assert_eq!(rows[0].corrected_text, "REFRIGERANTE 2L");
}

#[tokio::test]
async fn test_rejected_learn_leaves_store_untouched() {
    let (_tmp, store) = setup().await;
    let resolver = CorrectionResolver::new(store.clone());
    let t = TenantKey::anonymous();
    let out = resolver
        .learn("REFRIGERANTE COLA", "C", FieldKind::Name, &t, "s")
        .await
        .unwrap();
    assert!(matches!(out, LearnOutcome::Rejected(_)));
    assert!(store.all_corrections().await.unwrap().is_empty());
    assert_eq!(store.stats(&t).await.unwrap().history, 0);
}

#[tokio::test]
async fn test_resolution_records_usage() {
    let (_tmp, store) = setup().await;
    let t = TenantKey::anonymous();
    store.insert_raw(&t, FieldKind::Name, "A", "B", true, 1).await.unwrap();
    store.insert_raw(&t, FieldKind::Name, "B", "C", true, 1).await.unwrap();
    let resolver = CorrectionResolver::new(store.clone());

    let res = resolver.try_resolve("a", FieldKind::Name, &t).await.unwrap();
    assert_eq!(res.text, "C");
    assert_eq!(res.tier, Some(MatchTier::Chained));

    for c in store.all_corrections().await.unwrap() {
        assert_eq!(c.usage_count, 2, "usage for {}", c.original_text);
        assert!(c.last_used_at > 1);
    }
}

#[tokio::test]
async fn test_tenant_isolation() {
    let (_tmp, store) = setup().await;
    let resolver = CorrectionResolver::new(store.clone());
    let ana = TenantKey::new(Some("ana"), Some("loja-1"));
    let bia = TenantKey::new(Some("bia"), Some("loja-1"));
    resolver
        .learn("FEIJAO", "FEIJÃO CARIOCA", FieldKind::Name, &ana, "s")
        .await
        .unwrap();

    assert_eq!(resolver.resolve("FEIJAO", FieldKind::Name, &ana).await, "FEIJÃO CARIOCA");
    assert_eq!(resolver.resolve("FEIJAO", FieldKind::Name, &bia).await, "FEIJAO");
    assert!(store.history(&bia, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lifecycle() {
    let (_tmp, store) = setup().await;
    let lifecycle = CorrectionLifecycle::new(store.clone());
    let t = TenantKey::anonymous();
    let old = store.insert_raw(&t, FieldKind::Weight, "1 KG", "1KG", true, 1).await.unwrap();

    lifecycle.deactivate(&t, old).await.unwrap();
    assert!(store.active_corrections(&t, FieldKind::Weight).await.unwrap().is_empty());

    // A new active correction for the same original may now be learned.
    let resolver = CorrectionResolver::new(store.clone());
    resolver.learn("1 kg", "1 KG.", FieldKind::Weight, &t, "s").await.unwrap();

    let err = lifecycle.reactivate(&t, old).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LifecycleError>(),
        Some(LifecycleError::Conflict { .. })
    ));

    let all = lifecycle.list(&t, CorrectionState::All, Some(FieldKind::Weight)).await.unwrap();
    assert_eq!(all.len(), 2);
    let inactive = lifecycle.list(&t, CorrectionState::Inactive, None).await.unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].id, old);

    lifecycle.remove(&t, old).await.unwrap();
    assert!(store.get_correction(&t, old).await.unwrap().is_none());
    assert!(lifecycle.remove(&t, old).await.is_err());

    let stats = lifecycle.stats(&t).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.weights, 1);
    assert_eq!(stats.history, 1);
}

#[tokio::test]
async fn test_partial_index_blocks_second_active_row() {
    let (_tmp, store) = setup().await;
    let t = TenantKey::anonymous();
    store.insert_raw(&t, FieldKind::Name, "X", "Y", true, 1).await.unwrap();
    assert!(store.insert_raw(&t, FieldKind::Name, "x", "Z", true, 1).await.is_err());
    assert!(store.insert_raw(&t, FieldKind::Name, "x", "Z", false, 1).await.is_ok());
}

#[tokio::test]
async fn test_sweep() {
    let (_tmp, store) = setup().await;
    let t = TenantKey::anonymous();
    store.insert_raw(&t, FieldKind::Name, "ARROZ", "ARROZ", true, 1).await.unwrap();
    store.insert_raw(&t, FieldKind::Name, "OLEO", "", false, 1).await.unwrap();
    store.insert_raw(&t, FieldKind::Name, "COLA", "C", true, 1).await.unwrap();
    store.insert_raw(&t, FieldKind::Variety, "UVA", "UVA ", true, 1).await.unwrap();
    store.insert_raw(&t, FieldKind::Name, "REFRI", "REFRIGERANTE", true, 1).await.unwrap();

    let report = CorrectionLifecycle::new(store.clone()).sweep().await.unwrap();
    assert_eq!(report, SweepReport { invalid: 2, degenerate: 2 });
    let left = store.all_corrections().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].original_text, "REFRI");
}

#[tokio::test]
async fn test_pipeline_with_learned_corrections() {
    let (_tmp, store) = setup().await;
    let t = TenantKey::anonymous();
    let processor = DescriptionProcessor::new(CorrectionResolver::new(store.clone()));
    processor
        .resolver()
        .learn("REFRIG", "REFRIGERANTE", FieldKind::Name, &t, "s")
        .await
        .unwrap();

    let lines = vec![
        RawLine::new("REFRIG GUARANA ANTARCTICA 2L", Decimal::new(799, 2)),
        RawLine::new("COCA COLA LATA 350ML", Decimal::new(450, 2)),
    ];
    let items = processor.process_lines(&lines, &t).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].base_name(), "REFRIGERANTE GUARANA ANTARCTICA");
    assert_eq!(items[1].formatted_label(), "COCA COLA LATA\n350ML");
}
