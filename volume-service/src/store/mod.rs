pub mod memory;
pub mod postgres;

pub use memory::MemoryReadingStore;
pub use postgres::PgReadingStore;

use time::OffsetDateTime;
use volume_client::{
    db::StoreError,
    domain::{AggregateRow, PeriodToken, Reading, ReadingKind},
};

/// Persistence capabilities the ingestion and aggregation paths rely on.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn create_reading(
        &self,
        kind: ReadingKind,
        value: f64,
        created_at: OffsetDateTime,
    ) -> Result<Reading, StoreError>;

    /// Newest bucket first, at most `limit` buckets.
    async fn sum_grouped_by_truncated_timestamp(
        &self,
        kind: ReadingKind,
        period: PeriodToken,
        limit: i64,
    ) -> Result<Vec<AggregateRow>, StoreError>;

    /// Sum over `[start, end)`, or `None` when nothing was recorded in it.
    async fn sum_for_window(
        &self,
        kind: ReadingKind,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Option<f64>, StoreError>;

    async fn list_recent(&self, kind: ReadingKind, limit: i64) -> Result<Vec<Reading>, StoreError>;
}
