use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Executor,
};
use time::{OffsetDateTime, UtcOffset};
use volume_client::{
    db::{reading_queries, StoreError},
    domain::{AggregateRow, PeriodToken, Reading, ReadingKind},
};

use super::ReadingStore;
use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the shared pool from explicit sizing and verify it with a ping.
    ///
    /// Every connection runs with its session time zone pinned to `offset`, so
    /// `date_trunc` buckets line up with the windows computed in the service.
    pub async fn connect(url: &str, cfg: &DatabaseConfig, offset: UtcOffset) -> anyhow::Result<Self> {
        let tz_sql = session_time_zone_sql(offset);
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(cfg.min_connections)
            .max_lifetime(cfg.max_lifetime())
            .idle_timeout(cfg.idle_timeout())
            .acquire_timeout(cfg.acquire_timeout())
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                let tz_sql = tz_sql.clone();
                Box::pin(async move {
                    conn.execute(tz_sql.as_str()).await?;
                    Ok(())
                })
            })
            .connect(url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        tracing::info!(
            max_connections = cfg.max_connections,
            min_connections = cfg.min_connections,
            session_offset = %offset,
            "database pool ready"
        );

        Ok(Self::new(pool))
    }
}

/// `SET TIME ZONE` statement for a fixed offset, e.g. `INTERVAL '-03:00' HOUR TO MINUTE`.
pub fn session_time_zone_sql(offset: UtcOffset) -> String {
    let total = offset.whole_minutes();
    let sign = if total < 0 { '-' } else { '+' };
    let abs = total.unsigned_abs();
    format!(
        "SET TIME ZONE INTERVAL '{sign}{:02}:{:02}' HOUR TO MINUTE",
        abs / 60,
        abs % 60
    )
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn create_reading(
        &self,
        kind: ReadingKind,
        value: f64,
        created_at: OffsetDateTime,
    ) -> Result<Reading, StoreError> {
        reading_queries::create_reading(&self.pool, kind, value, created_at).await
    }

    async fn sum_grouped_by_truncated_timestamp(
        &self,
        kind: ReadingKind,
        period: PeriodToken,
        limit: i64,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        let started = std::time::Instant::now();
        let res = reading_queries::sum_grouped_by_truncated_timestamp(&self.pool, kind, period, limit).await;
        metrics::histogram!("aggregate_query_seconds").record(started.elapsed().as_secs_f64());
        res
    }

    async fn sum_for_window(
        &self,
        kind: ReadingKind,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Option<f64>, StoreError> {
        reading_queries::sum_for_window(&self.pool, kind, start, end).await
    }

    async fn list_recent(&self, kind: ReadingKind, limit: i64) -> Result<Vec<Reading>, StoreError> {
        reading_queries::list_recent(&self.pool, kind, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use time::macros::offset;

    #[test]
    fn session_zone_matches_offset() {
        assert_eq!(
            session_time_zone_sql(offset!(-3)),
            "SET TIME ZONE INTERVAL '-03:00' HOUR TO MINUTE"
        );
        assert_eq!(
            session_time_zone_sql(offset!(+5:30)),
            "SET TIME ZONE INTERVAL '+05:30' HOUR TO MINUTE"
        );
        assert_eq!(session_time_zone_sql(UtcOffset::UTC), "SET TIME ZONE INTERVAL '+00:00' HOUR TO MINUTE");
    }

    #[test]
    fn configured_offset_reaches_the_session_zone() {
        let cfg = AppConfig::from_toml_str("[server]\nutc_offset_minutes = -180\n").unwrap();
        let offset = cfg.server.utc_offset().unwrap();
        assert_eq!(
            session_time_zone_sql(offset),
            "SET TIME ZONE INTERVAL '-03:00' HOUR TO MINUTE"
        );
    }
}
