//! PostgreSQL 저장소.
//!
//! # 테이블
//!
//! - `tracked_symbol`: 추적 심볼 (symbol PK)
//! - `metric_point`: 시계열 포인트. `(symbol, metric_kind, date)` 고유 제약,
//!   지표별 필드는 JSONB `fields` 컬럼에 저장
//!
//! 변경 집합은 하나의 트랜잭션으로 적용됩니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info, instrument, warn};
use tracker_core::{
    DateRange, MetricKind, MetricValues, MutationSet, StoredPoint, StoredSnapshot, TimeSeriesPoint,
    TrackedSymbol,
};

use super::{MetricStore, SymbolStore};
use crate::error::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tracked_symbol (
        symbol            TEXT PRIMARY KEY,
        exchange          TEXT NOT NULL,
        display_name      TEXT NOT NULL,
        last_refreshed_at TIMESTAMPTZ,
        created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metric_point (
        id          BIGSERIAL PRIMARY KEY,
        symbol      TEXT NOT NULL,
        metric_kind TEXT NOT NULL,
        date        DATE NOT NULL,
        fields      JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (symbol, metric_kind, date)
    )
    "#,
];

/// 저장 포인트 레코드.
#[derive(Debug, FromRow)]
struct MetricPointRecord {
    id: i64,
    symbol: String,
    date: NaiveDate,
    fields: Json<MetricValues>,
}

impl MetricPointRecord {
    /// 저장 포인트로 변환. 값의 지표 종류가 조회 종류와 다르면 버립니다.
    fn into_stored(self, kind: MetricKind) -> Option<StoredPoint> {
        if self.fields.0.kind() != kind {
            warn!(id = self.id, symbol = %self.symbol, "저장된 값의 지표 종류 불일치, 무시");
            return None;
        }
        Some(StoredPoint {
            id: self.id,
            point: TimeSeriesPoint {
                symbol: self.symbol,
                date: self.date,
                values: self.fields.0,
            },
        })
    }
}

/// 추적 심볼 레코드.
#[derive(Debug, FromRow)]
struct TrackedSymbolRecord {
    symbol: String,
    exchange: String,
    display_name: String,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl From<TrackedSymbolRecord> for TrackedSymbol {
    fn from(r: TrackedSymbolRecord) -> Self {
        TrackedSymbol {
            symbol: r.symbol,
            exchange: r.exchange,
            display_name: r.display_name,
            last_refreshed_at: r.last_refreshed_at,
        }
    }
}

/// PostgreSQL 기반 저장소.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 연결 풀 생성 후 저장소 반환.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 테이블이 없으면 생성합니다. 여러 번 호출해도 안전합니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("저장소 스키마 확인 완료");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetricStore for PgStore {
    #[instrument(skip(self))]
    async fn load_snapshot(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<StoredSnapshot> {
        let records: Vec<MetricPointRecord> = sqlx::query_as(
            r#"
            SELECT id, symbol, date, fields
            FROM metric_point
            WHERE symbol = $1
              AND metric_kind = $2
              AND ($3::date IS NULL OR date >= $3)
              AND ($4::date IS NULL OR date <= $4)
            ORDER BY date
            "#,
        )
        .bind(symbol)
        .bind(kind.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        let points = records.into_iter().filter_map(|r| r.into_stored(kind));

        let snapshot = StoredSnapshot::from_points(symbol, kind, points);
        debug!(symbol, count = snapshot.len(), "스냅샷 로드");
        Ok(snapshot)
    }

    async fn apply_mutations(&self, mutations: &MutationSet) -> Result<u64> {
        if mutations.is_empty() {
            return Ok(0);
        }

        let kind = mutations.kind.as_str();
        let mut affected = 0u64;
        let mut tx = self.pool.begin().await?;

        for point in &mutations.inserts {
            // 다른 경로로 먼저 들어온 행이 있으면 값만 교체
            let result = sqlx::query(
                r#"
                INSERT INTO metric_point (symbol, metric_kind, date, fields)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (symbol, metric_kind, date) DO UPDATE SET
                    fields = EXCLUDED.fields,
                    updated_at = NOW()
                "#,
            )
            .bind(&point.symbol)
            .bind(kind)
            .bind(point.date)
            .bind(Json(&point.values))
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        for update in &mutations.updates {
            let result = sqlx::query(
                r#"
                UPDATE metric_point
                SET fields = $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(update.id)
            .bind(Json(&update.point.values))
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            symbol = %mutations.symbol,
            kind,
            inserts = mutations.inserts.len(),
            updates = mutations.updates.len(),
            affected,
            "변경 집합 적용"
        );
        Ok(affected)
    }
}

#[async_trait]
impl SymbolStore for PgStore {
    async fn tracked_symbols(&self) -> Result<Vec<TrackedSymbol>> {
        let records: Vec<TrackedSymbolRecord> = sqlx::query_as(
            r#"
            SELECT symbol, exchange, display_name, last_refreshed_at
            FROM tracked_symbol
            ORDER BY symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn seed_symbols(&self, symbols: &[TrackedSymbol]) -> Result<u64> {
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;

        for s in symbols {
            let result = sqlx::query(
                r#"
                INSERT INTO tracked_symbol (symbol, exchange, display_name, last_refreshed_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (symbol) DO NOTHING
                "#,
            )
            .bind(&s.symbol)
            .bind(&s.exchange)
            .bind(&s.display_name)
            .bind(s.last_refreshed_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn mark_refreshed(&self, symbol: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE tracked_symbol SET last_refreshed_at = $2 WHERE symbol = $1")
            .bind(symbol)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
