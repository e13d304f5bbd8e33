//! SQLite-backed [`CorrectionStore`] implementation.
//!
//! Maps each store operation onto the `corrections` and
//! `correction_history` tables created by [`migrate`](crate::migrate).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use poster_labels_core::models::{
    Correction, CorrectionHistoryEntry, CorrectionState, CorrectionStats, FieldKind,
    LearnedCorrection, TenantKey,
};
use poster_labels_core::store::{original_key, CorrectionStore, UpsertOutcome};

const CORRECTION_COLUMNS: &str = "id, user_id, company_id, field_kind, original_text, \
     corrected_text, usage_count, active, created_at, updated_at, last_used_at";

/// SQLite implementation of the [`CorrectionStore`] trait.
///
/// The partial unique index on active `(tenant, field_kind, original_key)`
/// backs the one-active-correction invariant; learn events run in a single
/// transaction so the history entry and the upsert land together.
pub struct SqliteCorrectionStore {
    pool: SqlitePool,
}

impl SqliteCorrectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a correction row verbatim, bypassing validation.
    ///
    /// Used to load legacy data; also how tests seed degenerate rows for
    /// the sweep.
    pub async fn insert_raw(
        &self,
        tenant: &TenantKey,
        kind: FieldKind,
        original_text: &str,
        corrected_text: &str,
        active: bool,
        at: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO corrections (user_id, company_id, field_kind, original_text, original_key,
                                     corrected_text, usage_count, active,
                                     created_at, updated_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.user_id())
        .bind(tenant.company_id())
        .bind(kind.as_str())
        .bind(original_text)
        .bind(original_key(original_text))
        .bind(corrected_text)
        .bind(active)
        .bind(at)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

fn row_to_correction(row: &SqliteRow) -> Result<Correction> {
    let kind: String = row.try_get("field_kind")?;
    let user_id: String = row.try_get("user_id")?;
    let company_id: String = row.try_get("company_id")?;
    Ok(Correction {
        id: row.try_get("id")?,
        tenant: TenantKey::new(Some(user_id.as_str()), Some(company_id.as_str())),
        field_kind: kind
            .parse()
            .with_context(|| format!("corrupt field_kind in corrections table: '{}'", kind))?,
        original_text: row.try_get("original_text")?,
        corrected_text: row.try_get("corrected_text")?,
        usage_count: row.try_get("usage_count")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_used_at: row.try_get("last_used_at")?,
    })
}

fn row_to_history(row: &SqliteRow) -> Result<CorrectionHistoryEntry> {
    let kind: String = row.try_get("field_kind")?;
    let user_id: String = row.try_get("user_id")?;
    let company_id: String = row.try_get("company_id")?;
    Ok(CorrectionHistoryEntry {
        id: row.try_get("id")?,
        tenant: TenantKey::new(Some(user_id.as_str()), Some(company_id.as_str())),
        session_id: row.try_get("session_id")?,
        field_kind: kind
            .parse()
            .with_context(|| format!("corrupt field_kind in correction_history: '{}'", kind))?,
        original_text: row.try_get("original_text")?,
        corrected_text: row.try_get("corrected_text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CorrectionStore for SqliteCorrectionStore {
    async fn active_corrections(
        &self,
        tenant: &TenantKey,
        kind: FieldKind,
    ) -> Result<Vec<Correction>> {
        let sql = format!(
            "SELECT {} FROM corrections \
             WHERE user_id = ? AND company_id = ? AND field_kind = ? AND active = 1 \
             ORDER BY usage_count DESC, id ASC",
            CORRECTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tenant.user_id())
            .bind(tenant.company_id())
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_correction).collect()
    }

    async fn record_usage(&self, ids: &[i64], at: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                r#"
                UPDATE corrections
                SET usage_count = usage_count + 1, last_used_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_correction(&self, learned: &LearnedCorrection) -> Result<UpsertOutcome> {
        let tenant = &learned.tenant;
        let key = original_key(&learned.original_text);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO correction_history (user_id, company_id, session_id, field_kind,
                                            original_text, corrected_text, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.user_id())
        .bind(tenant.company_id())
        .bind(&learned.session_id)
        .bind(learned.field_kind.as_str())
        .bind(&learned.original_text)
        .bind(&learned.corrected_text)
        .bind(learned.at)
        .execute(&mut *tx)
        .await?;

        let update_sql = r#"
            UPDATE corrections
            SET corrected_text = ?, usage_count = usage_count + 1,
                updated_at = ?, last_used_at = ?
            WHERE user_id = ? AND company_id = ? AND field_kind = ?
              AND original_key = ? AND active = 1
            RETURNING id
        "#;

        let updated: Option<i64> = sqlx::query_scalar(update_sql)
            .bind(&learned.corrected_text)
            .bind(learned.at)
            .bind(learned.at)
            .bind(tenant.user_id())
            .bind(tenant.company_id())
            .bind(learned.field_kind.as_str())
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match updated {
            Some(id) => UpsertOutcome::Updated(id),
            None => {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO corrections (user_id, company_id, field_kind, original_text,
                                             original_key, corrected_text, usage_count, active,
                                             created_at, updated_at, last_used_at)
                    VALUES (?, ?, ?, ?, ?, ?, 1, 1, ?, ?, ?)
                    "#,
                )
                .bind(tenant.user_id())
                .bind(tenant.company_id())
                .bind(learned.field_kind.as_str())
                .bind(&learned.original_text)
                .bind(&key)
                .bind(&learned.corrected_text)
                .bind(learned.at)
                .bind(learned.at)
                .bind(learned.at)
                .execute(&mut *tx)
                .await;

                match inserted {
                    Ok(result) => UpsertOutcome::Created(result.last_insert_rowid()),
                    // Another writer created the active row first: update it instead.
                    Err(e) if is_unique_violation(&e) => {
                        let id: i64 = sqlx::query_scalar(update_sql)
                            .bind(&learned.corrected_text)
                            .bind(learned.at)
                            .bind(learned.at)
                            .bind(tenant.user_id())
                            .bind(tenant.company_id())
                            .bind(learned.field_kind.as_str())
                            .bind(&key)
                            .fetch_one(&mut *tx)
                            .await?;
                        UpsertOutcome::Updated(id)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn get_correction(&self, tenant: &TenantKey, id: i64) -> Result<Option<Correction>> {
        let sql = format!(
            "SELECT {} FROM corrections WHERE id = ? AND user_id = ? AND company_id = ?",
            CORRECTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant.user_id())
            .bind(tenant.company_id())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_correction).transpose()
    }

    async fn list_corrections(
        &self,
        tenant: &TenantKey,
        state: CorrectionState,
        kind: Option<FieldKind>,
    ) -> Result<Vec<Correction>> {
        let mut sql = format!(
            "SELECT {} FROM corrections WHERE user_id = ? AND company_id = ?",
            CORRECTION_COLUMNS
        );
        match state {
            CorrectionState::Active => sql.push_str(" AND active = 1"),
            CorrectionState::Inactive => sql.push_str(" AND active = 0"),
            CorrectionState::All => {}
        }
        if kind.is_some() {
            sql.push_str(" AND field_kind = ?");
        }
        sql.push_str(" ORDER BY usage_count DESC, id ASC");

        let mut query = sqlx::query(&sql)
            .bind(tenant.user_id())
            .bind(tenant.company_id());
        if let Some(k) = kind {
            query = query.bind(k.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_correction).collect()
    }

    async fn set_active(
        &self,
        tenant: &TenantKey,
        id: i64,
        active: bool,
        at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE corrections SET active = ?, updated_at = ? \
             WHERE id = ? AND user_id = ? AND company_id = ?",
        )
        .bind(active)
        .bind(at)
        .bind(id)
        .bind(tenant.user_id())
        .bind(tenant.company_id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_correction(&self, tenant: &TenantKey, id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM corrections WHERE id = ? AND user_id = ? AND company_id = ?")
                .bind(id)
                .bind(tenant.user_id())
                .bind(tenant.company_id())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn history(
        &self,
        tenant: &TenantKey,
        limit: usize,
    ) -> Result<Vec<CorrectionHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, company_id, session_id, field_kind,
                   original_text, corrected_text, created_at
            FROM correction_history
            WHERE user_id = ? AND company_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(tenant.user_id())
        .bind(tenant.company_id())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_history).collect()
    }

    async fn stats(&self, tenant: &TenantKey) -> Result<CorrectionStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(active), 0) AS active,
                COALESCE(SUM(field_kind = 'NOME'), 0) AS names,
                COALESCE(SUM(field_kind = 'GRAMAGEM'), 0) AS weights,
                COALESCE(SUM(field_kind = 'VARIEDADE'), 0) AS varieties
            FROM corrections
            WHERE user_id = ? AND company_id = ?
            "#,
        )
        .bind(tenant.user_id())
        .bind(tenant.company_id())
        .fetch_one(&self.pool)
        .await?;

        let history: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM correction_history WHERE user_id = ? AND company_id = ?",
        )
        .bind(tenant.user_id())
        .bind(tenant.company_id())
        .fetch_one(&self.pool)
        .await?;

        Ok(CorrectionStats {
            total: row.try_get("total")?,
            active: row.try_get("active")?,
            history,
            names: row.try_get("names")?,
            weights: row.try_get("weights")?,
            varieties: row.try_get("varieties")?,
        })
    }

    async fn all_corrections(&self) -> Result<Vec<Correction>> {
        let sql = format!("SELECT {} FROM corrections ORDER BY id", CORRECTION_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_correction).collect()
    }

    async fn remove_corrections(&self, ids: &[i64]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM corrections WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}
