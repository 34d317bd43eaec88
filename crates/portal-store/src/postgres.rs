//! PostgreSQL 스냅샷 저장소.
//!
//! 스냅샷 문서를 JSONB로 저장합니다. latest는 피드당 한 행을 upsert,
//! 히스토리는 append-only 행으로 쌓습니다.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info};

use portal_core::domain::{Feed, SnapshotDocument};

use crate::error::StoreError;
use crate::repository::SnapshotRepository;

/// PostgreSQL 저장소.
pub struct PostgresSnapshotRepository {
    pool: PgPool,
}

impl PostgresSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 필요한 테이블/인덱스 생성 (기동 시 1회).
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_latest (
                feed TEXT PRIMARY KEY,
                document JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_snapshots (
                id BIGSERIAL PRIMARY KEY,
                feed TEXT NOT NULL,
                document JSONB NOT NULL,
                collected_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_feed_snapshots_feed_collected
            ON feed_snapshots (feed, collected_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("스냅샷 스키마 확인 완료");
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepository for PostgresSnapshotRepository {
    async fn latest(&self, feed: Feed) -> Result<Option<SnapshotDocument>, StoreError> {
        let row: Option<Value> = sqlx::query_scalar(
            r#"SELECT document FROM feed_latest WHERE feed = $1"#,
        )
        .bind(feed.slug())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn replace_latest(&self, feed: Feed, doc: &SnapshotDocument) -> Result<(), StoreError> {
        let document = serde_json::to_value(doc)?;

        sqlx::query(
            r#"
            INSERT INTO feed_latest (feed, document, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (feed)
            DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
            "#,
        )
        .bind(feed.slug())
        .bind(&document)
        .execute(&self.pool)
        .await?;

        debug!(feed = feed.slug(), "latest 문서 교체 저장");
        Ok(())
    }

    async fn append_history(&self, feed: Feed, doc: &SnapshotDocument) -> Result<(), StoreError> {
        let document = serde_json::to_value(doc)?;

        sqlx::query(
            r#"
            INSERT INTO feed_snapshots (feed, document, collected_at)
            VALUES ($1, $2, COALESCE($3, NOW()))
            "#,
        )
        .bind(feed.slug())
        .bind(&document)
        .bind(doc.collected_at)
        .execute(&self.pool)
        .await?;

        debug!(feed = feed.slug(), "히스토리 문서 추가");
        Ok(())
    }

    async fn history(&self, feed: Feed, limit: u32) -> Result<Vec<SnapshotDocument>, StoreError> {
        let rows: Vec<Value> = sqlx::query_scalar(
            r#"
            SELECT document FROM feed_snapshots
            WHERE feed = $1
            ORDER BY collected_at DESC
            LIMIT $2
            "#,
        )
        .bind(feed.slug())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }
}
