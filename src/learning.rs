//! Learning administration commands: teach, inspect and clean corrections.

use anyhow::Result;

use poster_labels_core::lifecycle::CorrectionLifecycle;
use poster_labels_core::models::{Correction, CorrectionState, FieldKind, TenantKey};
use poster_labels_core::resolve::{CorrectionResolver, LearnOutcome};
use poster_labels_core::store::UpsertOutcome;

use crate::backend;
use crate::config::Config;

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

async fn lifecycle(config: &Config) -> Result<CorrectionLifecycle> {
    Ok(CorrectionLifecycle::new(backend::require_store(config).await?))
}

pub async fn run_learn(
    config: &Config,
    original: &str,
    corrected: &str,
    kind: FieldKind,
    tenant: &TenantKey,
    session_id: &str,
) -> Result<()> {
    let resolver = CorrectionResolver::new(backend::require_store(config).await?);
    match resolver
        .learn(original, corrected, kind, tenant, session_id)
        .await?
    {
        LearnOutcome::Stored(UpsertOutcome::Created(id)) => {
            println!("Learned correction #{}: '{}' -> '{}'", id, original.trim(), corrected.trim())
        }
        LearnOutcome::Stored(UpsertOutcome::Updated(id)) => {
            println!("Updated correction #{}: '{}' -> '{}'", id, original.trim(), corrected.trim())
        }
        LearnOutcome::Rejected(reason) => println!("Correction not learned: {}", reason),
    }
    Ok(())
}

pub async fn run_list(
    config: &Config,
    tenant: &TenantKey,
    state: CorrectionState,
    kind: Option<FieldKind>,
) -> Result<()> {
    let rows = lifecycle(config).await?.list(tenant, state, kind).await?;
    if rows.is_empty() {
        println!("No corrections.");
        return Ok(());
    }
    for c in &rows {
        print_correction(c);
    }
    Ok(())
}

fn print_correction(c: &Correction) {
    println!(
        "#{:<5} {:<9} {:<8} '{}' -> '{}'  used {}x, last {}",
        c.id,
        c.field_kind.as_str(),
        if c.active { "active" } else { "inactive" },
        c.original_text,
        c.corrected_text,
        c.usage_count,
        format_ts_iso(c.last_used_at)
    );
}

pub async fn run_history(config: &Config, tenant: &TenantKey, limit: Option<usize>) -> Result<()> {
    let entries = lifecycle(config).await?.history(tenant, limit).await?;
    if entries.is_empty() {
        println!("No history.");
        return Ok(());
    }
    for h in &entries {
        println!(
            "{}  {:<9} '{}' -> '{}'  (session {})",
            format_ts_iso(h.created_at),
            h.field_kind.as_str(),
            h.original_text,
            h.corrected_text,
            h.session_id
        );
    }
    Ok(())
}

pub async fn run_stats(config: &Config, tenant: &TenantKey) -> Result<()> {
    let stats = lifecycle(config).await?.stats(tenant).await?;

    println!("Poster Labels - Learning Stats ({})", tenant);
    println!("==============================");
    println!();
    println!("  Corrections: {}", stats.total);
    println!("  Active:      {}", stats.active);
    println!("  Inactive:    {}", stats.total - stats.active);
    println!("  History:     {}", stats.history);
    println!();
    println!("  NOME:        {}", stats.names);
    println!("  GRAMAGEM:    {}", stats.weights);
    println!("  VARIEDADE:   {}", stats.varieties);
    Ok(())
}

pub async fn run_deactivate(config: &Config, tenant: &TenantKey, id: i64) -> Result<()> {
    lifecycle(config).await?.deactivate(tenant, id).await?;
    println!("Correction #{} deactivated.", id);
    Ok(())
}

pub async fn run_activate(config: &Config, tenant: &TenantKey, id: i64) -> Result<()> {
    lifecycle(config).await?.reactivate(tenant, id).await?;
    println!("Correction #{} activated.", id);
    Ok(())
}

pub async fn run_remove(config: &Config, tenant: &TenantKey, id: i64) -> Result<()> {
    lifecycle(config).await?.remove(tenant, id).await?;
    println!("Correction #{} removed.", id);
    Ok(())
}

pub async fn run_sweep(config: &Config) -> Result<()> {
    let report = lifecycle(config).await?.sweep().await?;
    println!(
        "Sweep complete: removed {} invalid and {} degenerate correction(s).",
        report.invalid, report.degenerate
    );
    Ok(())
}
