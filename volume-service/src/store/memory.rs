use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicBool, AtomicI64, Ordering},
};

use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use volume_client::{
    db::StoreError,
    domain::{AggregateRow, PeriodToken, Reading, ReadingKind},
};

use super::ReadingStore;

/// Process-local store with the same bucketing rules as the PostgreSQL one.
///
/// Buckets are computed in `offset`, which plays the role of the database
/// session time zone.
pub struct MemoryReadingStore {
    readings: Mutex<HashMap<ReadingKind, Vec<Reading>>>,
    next_id: AtomicI64,
    offset: UtcOffset,
    unavailable: AtomicBool,
}

impl Default for MemoryReadingStore {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl MemoryReadingStore {
    pub fn new(offset: UtcOffset) -> Self {
        Self {
            readings: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            offset,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail as if the pool could not hand out a connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self, kind: ReadingKind) -> usize {
        self.readings.lock().await.get(&kind).map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn create_reading(
        &self,
        kind: ReadingKind,
        value: f64,
        created_at: OffsetDateTime,
    ) -> Result<Reading, StoreError> {
        self.check_available()?;

        let reading = Reading {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            value,
            created_at,
        };
        self.readings
            .lock()
            .await
            .entry(kind)
            .or_default()
            .push(reading.clone());

        Ok(reading)
    }

    async fn sum_grouped_by_truncated_timestamp(
        &self,
        kind: ReadingKind,
        period: PeriodToken,
        limit: i64,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        self.check_available()?;

        let guard = self.readings.lock().await;
        let mut buckets: BTreeMap<OffsetDateTime, f64> = BTreeMap::new();
        for r in guard.get(&kind).into_iter().flatten() {
            let bucket = period.truncate(r.created_at.to_offset(self.offset));
            *buckets.entry(bucket).or_insert(0.0) += r.value;
        }

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(buckets
            .into_iter()
            .rev()
            .take(limit)
            .map(|(period, total_value)| AggregateRow { period, total_value })
            .collect())
    }

    async fn sum_for_window(
        &self,
        kind: ReadingKind,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Option<f64>, StoreError> {
        self.check_available()?;

        let guard = self.readings.lock().await;
        let mut in_window = guard
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|r| r.created_at >= start && r.created_at < end)
            .peekable();

        if in_window.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(in_window.map(|r| r.value).sum()))
    }

    async fn list_recent(&self, kind: ReadingKind, limit: i64) -> Result<Vec<Reading>, StoreError> {
        self.check_available()?;

        let guard = self.readings.lock().await;
        let mut rows: Vec<Reading> = guard.get(&kind).cloned().unwrap_or_default();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[tokio::test]
    async fn groups_by_bucket_newest_first_and_caps_bucket_count() {
        let store = MemoryReadingStore::default();
        for (ts, v) in [
            (datetime!(2024-03-13 10:05:00 UTC), 1.0),
            (datetime!(2024-03-13 10:55:00 UTC), 2.0),
            (datetime!(2024-03-13 11:10:00 UTC), 4.0),
            (datetime!(2024-03-13 12:00:00 UTC), 8.0),
        ] {
            store.create_reading(ReadingKind::Volume, v, ts).await.unwrap();
        }

        let rows = store
            .sum_grouped_by_truncated_timestamp(ReadingKind::Volume, PeriodToken::Hour, 2)
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                AggregateRow { period: datetime!(2024-03-13 12:00:00 UTC), total_value: 8.0 },
                AggregateRow { period: datetime!(2024-03-13 11:00:00 UTC), total_value: 4.0 },
            ]
        );
    }

    #[tokio::test]
    async fn buckets_follow_the_store_offset() {
        let store = MemoryReadingStore::new(offset!(-3));
        // 01:30 UTC on the 14th is still the 13th at -03:00.
        store
            .create_reading(ReadingKind::Volume, 5.0, datetime!(2024-03-14 01:30:00 UTC))
            .await
            .unwrap();

        let rows = store
            .sum_grouped_by_truncated_timestamp(ReadingKind::Volume, PeriodToken::Day, 10)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, datetime!(2024-03-13 00:00:00 -3));
    }

    #[tokio::test]
    async fn kinds_are_kept_apart() {
        let store = MemoryReadingStore::default();
        store
            .create_reading(ReadingKind::FlowRate, 1.0, datetime!(2024-03-13 10:00:00 UTC))
            .await
            .unwrap();

        assert_eq!(store.len(ReadingKind::FlowRate).await, 1);
        assert_eq!(store.len(ReadingKind::Volume).await, 0);
        assert!(store.list_recent(ReadingKind::Volume, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_window_sums_to_none() {
        let store = MemoryReadingStore::default();
        store
            .create_reading(ReadingKind::Volume, 1.0, datetime!(2024-03-13 10:00:00 UTC))
            .await
            .unwrap();

        let none = store
            .sum_for_window(
                ReadingKind::Volume,
                datetime!(2024-03-14 00:00:00 UTC),
                datetime!(2024-03-15 00:00:00 UTC),
            )
            .await
            .unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn unavailable_store_reports_database_errors() {
        let store = MemoryReadingStore::default();
        store.set_unavailable(true);

        let res = store.list_recent(ReadingKind::Volume, 10).await;
        assert!(matches!(res, Err(StoreError::Database(_))));
    }
}
