use std::{str::FromStr, sync::Arc};

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};
use volume_client::domain::{AggregateRow, PeriodToken, Reading, ReadingKind};

use crate::{config::PeriodsConfig, error::ApiError, store::ReadingStore};

/// Presentation unit applied to aggregated totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    Liters,
    Money,
}

impl FromStr for ValueKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "liters" => Ok(Self::Liters),
            "money" => Ok(Self::Money),
            _ => Err(ApiError::validation("invalid type")),
        }
    }
}

impl ValueKind {
    /// An absent or empty `type` parameter means liters.
    pub fn from_query(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw {
            None | Some("") => Ok(Self::default()),
            Some(s) => s.parse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub period: PeriodToken,
    pub row_limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotal {
    #[serde(with = "time::serde::rfc3339")]
    pub period: OffsetDateTime,
    pub total_value_float: f64,
    pub total_value_money: f64,
}

/// Rescale totals in place; liters leaves rows untouched.
pub fn apply_value_kind(rows: &mut [AggregateRow], kind: ValueKind, money_multiplier: f64) {
    if kind == ValueKind::Money {
        for row in rows.iter_mut() {
            row.total_value *= money_multiplier;
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn ReadingStore>,
    periods: PeriodsConfig,
    money_multiplier: f64,
    utc_offset: UtcOffset,
    recent_limit: i64,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        periods: PeriodsConfig,
        money_multiplier: f64,
        utc_offset: UtcOffset,
        recent_limit: i64,
    ) -> Self {
        Self {
            store,
            periods,
            money_multiplier,
            utc_offset,
            recent_limit,
        }
    }

    pub fn resolve_period(&self, token: &str) -> Result<ResolvedPeriod, ApiError> {
        let period: PeriodToken = token.parse().map_err(|_| ApiError::validation("invalid period"))?;
        Ok(ResolvedPeriod {
            period,
            row_limit: self.periods.row_limit(period),
        })
    }

    /// Grouped totals for `token`, newest bucket first.
    pub async fn aggregate(
        &self,
        kind: ReadingKind,
        token: &str,
        value_kind: ValueKind,
    ) -> Result<Vec<AggregateRow>, ApiError> {
        let resolved = self.resolve_period(token)?;
        metrics::counter!("aggregate_requests_total", "period" => resolved.period.as_str()).increment(1);

        let mut rows = self
            .store
            .sum_grouped_by_truncated_timestamp(kind, resolved.period, resolved.row_limit)
            .await?;

        if rows.is_empty() {
            tracing::info!(%kind, period = %resolved.period, "no readings for period");
            return Err(ApiError::not_found("no readings found"));
        }

        apply_value_kind(&mut rows, value_kind, self.money_multiplier);
        tracing::info!(%kind, period = %resolved.period, count = rows.len(), "aggregated readings");

        Ok(rows)
    }

    /// Total over the window of `token` that contains `now`.
    pub async fn total_for_period(
        &self,
        kind: ReadingKind,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<PeriodTotal, ApiError> {
        let resolved = self.resolve_period(token)?;
        let (start, end) = resolved.period.window_containing(now.to_offset(self.utc_offset));

        let total = self
            .store
            .sum_for_window(kind, start, end)
            .await?
            .ok_or_else(|| ApiError::not_found("no readings found"))?;

        Ok(PeriodTotal {
            period: start,
            total_value_float: total,
            total_value_money: total * self.money_multiplier,
        })
    }

    pub async fn list_recent(&self, kind: ReadingKind) -> Result<Vec<Reading>, ApiError> {
        let rows = self.store.list_recent(kind, self.recent_limit).await?;
        if rows.is_empty() {
            return Err(ApiError::not_found("no readings found"));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DEFAULT_MONEY_MULTIPLIER, store::MemoryReadingStore};
    use time::macros::{datetime, offset};

    fn aggregator(store: Arc<MemoryReadingStore>) -> Aggregator {
        Aggregator::new(store, PeriodsConfig::default(), DEFAULT_MONEY_MULTIPLIER, UtcOffset::UTC, 50)
    }

    async fn seed(store: &MemoryReadingStore, values: &[(OffsetDateTime, f64)]) {
        for (ts, v) in values {
            store.create_reading(ReadingKind::Volume, *v, *ts).await.unwrap();
        }
    }

    #[test]
    fn resolves_every_token_to_its_row_limit() {
        let agg = aggregator(Arc::new(MemoryReadingStore::default()));
        let expected = [
            ("second", 60),
            ("minute", 60),
            ("hour", 24),
            ("day", 30),
            ("week", 21),
            ("month", 12),
            ("year", 10),
        ];
        for (token, limit) in expected {
            assert_eq!(agg.resolve_period(token).unwrap().row_limit, limit, "token {token}");
        }
    }

    #[test]
    fn rejects_unknown_period() {
        let agg = aggregator(Arc::new(MemoryReadingStore::default()));
        for token in ["fortnight", "", "HOUR", "days"] {
            match agg.resolve_period(token) {
                Err(ApiError::Validation(msg)) => assert_eq!(msg, "invalid period"),
                other => panic!("expected validation error for {token:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn value_kind_defaults_to_liters() {
        assert_eq!(ValueKind::from_query(None).unwrap(), ValueKind::Liters);
        assert_eq!(ValueKind::from_query(Some("")).unwrap(), ValueKind::Liters);
        assert_eq!(ValueKind::from_query(Some("money")).unwrap(), ValueKind::Money);
        assert!(matches!(ValueKind::from_query(Some("dollars")), Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn same_hour_readings_collapse_into_one_bucket() {
        let store = Arc::new(MemoryReadingStore::default());
        seed(
            &store,
            &[
                (datetime!(2024-03-13 10:01:00 UTC), 10.0),
                (datetime!(2024-03-13 10:20:00 UTC), 20.0),
                (datetime!(2024-03-13 10:59:59 UTC), 30.0),
            ],
        )
        .await;
        let agg = aggregator(store);

        let liters = agg.aggregate(ReadingKind::Volume, "hour", ValueKind::Liters).await.unwrap();
        assert_eq!(
            liters,
            vec![AggregateRow { period: datetime!(2024-03-13 10:00:00 UTC), total_value: 60.0 }]
        );

        let money = agg.aggregate(ReadingKind::Volume, "hour", ValueKind::Money).await.unwrap();
        assert_eq!(money[0].total_value, 120.0);
    }

    #[tokio::test]
    async fn money_rows_are_liters_rows_doubled() {
        let store = Arc::new(MemoryReadingStore::default());
        seed(
            &store,
            &[
                (datetime!(2024-01-02 08:00:00 UTC), 1.25),
                (datetime!(2024-01-09 08:00:00 UTC), 3.5),
                (datetime!(2024-01-10 08:00:00 UTC), 7.0),
                (datetime!(2024-02-20 08:00:00 UTC), 0.1),
            ],
        )
        .await;
        let agg = aggregator(store);

        for token in ["day", "week", "month", "year"] {
            let liters = agg.aggregate(ReadingKind::Volume, token, ValueKind::Liters).await.unwrap();
            let money = agg.aggregate(ReadingKind::Volume, token, ValueKind::Money).await.unwrap();

            assert_eq!(liters.len(), money.len());
            for (l, m) in liters.iter().zip(&money) {
                assert_eq!(l.period, m.period);
                assert_eq!(m.total_value, l.total_value * 2.0);
            }
        }
    }

    #[tokio::test]
    async fn rows_are_newest_first_and_capped_by_row_limit() {
        let store = Arc::new(MemoryReadingStore::default());
        let start = datetime!(2024-01-01 00:00:00 UTC);
        let readings: Vec<_> = (0..40).map(|d| (start + time::Duration::days(d), 1.0)).collect();
        seed(&store, &readings).await;
        let agg = aggregator(store);

        let rows = agg.aggregate(ReadingKind::Volume, "day", ValueKind::Liters).await.unwrap();

        assert_eq!(rows.len(), 30);
        assert_eq!(rows[0].period, datetime!(2024-02-09 00:00:00 UTC));
        assert!(rows.windows(2).all(|w| w[0].period > w[1].period));
    }

    #[tokio::test]
    async fn empty_store_is_not_found() {
        let agg = aggregator(Arc::new(MemoryReadingStore::default()));
        let res = agg.aggregate(ReadingKind::Volume, "hour", ValueKind::Liters).await;
        assert!(matches!(res, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_period_is_checked_before_touching_storage() {
        let store = Arc::new(MemoryReadingStore::default());
        store.set_unavailable(true);
        let agg = aggregator(store);

        let res = agg.aggregate(ReadingKind::Volume, "fortnight", ValueKind::Liters).await;
        assert!(matches!(res, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn weekly_total_starts_on_monday() {
        let store = Arc::new(MemoryReadingStore::default());
        seed(
            &store,
            &[
                (datetime!(2024-03-10 23:00:00 UTC), 100.0), // previous Sunday
                (datetime!(2024-03-11 00:00:00 UTC), 4.0),
                (datetime!(2024-03-13 09:00:00 UTC), 6.0),
            ],
        )
        .await;
        let agg = aggregator(store);

        // Wednesday.
        let total = agg
            .total_for_period(ReadingKind::Volume, "week", datetime!(2024-03-13 12:00:00 UTC))
            .await
            .unwrap();
        assert_eq!(total.period, datetime!(2024-03-11 00:00:00 UTC));
        assert_eq!(total.total_value_float, 10.0);
        assert_eq!(total.total_value_money, 20.0);

        // Monday.
        let total = agg
            .total_for_period(ReadingKind::Volume, "week", datetime!(2024-03-11 06:00:00 UTC))
            .await
            .unwrap();
        assert_eq!(total.period, datetime!(2024-03-11 00:00:00 UTC));
    }

    #[tokio::test]
    async fn totals_use_the_configured_local_offset() {
        let store = Arc::new(MemoryReadingStore::default());
        seed(&store, &[(datetime!(2024-03-14 01:00:00 UTC), 3.0)]).await;
        let agg = Aggregator::new(store, PeriodsConfig::default(), 2.0, offset!(-3), 50);

        // 02:00 UTC on the 14th is 23:00 on the 13th at -03:00.
        let total = agg
            .total_for_period(ReadingKind::Volume, "day", datetime!(2024-03-14 02:00:00 UTC))
            .await
            .unwrap();

        assert_eq!(total.period, datetime!(2024-03-13 00:00:00 -3));
        assert_eq!(total.total_value_float, 3.0);
    }

    #[tokio::test]
    async fn grouped_bucket_matches_total_window_under_offset() {
        let store = Arc::new(MemoryReadingStore::new(offset!(-3)));
        seed(
            &store,
            &[
                (datetime!(2024-03-14 01:00:00 UTC), 3.0),
                (datetime!(2024-03-14 04:00:00 UTC), 5.0),
            ],
        )
        .await;
        let agg = Aggregator::new(store, PeriodsConfig::default(), 2.0, offset!(-3), 50);

        let rows = agg.aggregate(ReadingKind::Volume, "day", ValueKind::Liters).await.unwrap();
        let total = agg
            .total_for_period(ReadingKind::Volume, "day", datetime!(2024-03-14 02:00:00 UTC))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let bucket = rows.iter().find(|r| r.period == total.period).unwrap();
        assert_eq!(bucket.total_value, total.total_value_float);
        assert_eq!(total.total_value_float, 3.0);
    }

    #[tokio::test]
    async fn empty_current_window_is_not_found() {
        let store = Arc::new(MemoryReadingStore::default());
        seed(&store, &[(datetime!(2024-01-01 00:00:00 UTC), 1.0)]).await;
        let agg = aggregator(store);

        let res = agg
            .total_for_period(ReadingKind::Volume, "day", datetime!(2024-03-13 12:00:00 UTC))
            .await;
        assert!(matches!(res, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn recent_readings_are_newest_first() {
        let store = Arc::new(MemoryReadingStore::default());
        seed(
            &store,
            &[
                (datetime!(2024-03-13 10:00:00 UTC), 1.0),
                (datetime!(2024-03-13 12:00:00 UTC), 2.0),
                (datetime!(2024-03-13 11:00:00 UTC), 3.0),
            ],
        )
        .await;
        let agg = Aggregator::new(store, PeriodsConfig::default(), 2.0, UtcOffset::UTC, 2);

        let rows = agg.list_recent(ReadingKind::Volume).await.unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }
}
