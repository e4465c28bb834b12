//! Synthetic history generator.
//!
//! Fills a collection with one reading batch per day so the aggregation
//! routes have something to show on a fresh database. Not part of the
//! ingestion path.

use futures::{stream, StreamExt};
use rand::Rng;
use time::{Duration, OffsetDateTime, Time};
use volume_client::domain::ReadingKind;

use crate::{config::PopulateConfig, store::ReadingStore};

const SECS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticReading {
    pub created_at: OffsetDateTime,
    pub value: f64,
}

/// Generate `per_day` readings for every local day from `days` days before
/// `today` up to and including `today`. `days` is a plain day count, so a span
/// crossing February 29th starts one calendar date later than "a year ago".
///
/// Each reading lands at a uniformly random second of its day with a value in
/// `[0, max_value)`.
pub fn synthetic_readings<R: Rng>(
    rng: &mut R,
    today: OffsetDateTime,
    cfg: &PopulateConfig,
) -> Vec<SyntheticReading> {
    let first_midnight = today.replace_time(Time::MIDNIGHT) - Duration::days(cfg.days as i64);
    let mut out = Vec::with_capacity((cfg.days as usize + 1) * cfg.per_day as usize);

    for day in 0..=cfg.days as i64 {
        let midnight = first_midnight + Duration::days(day);
        for _ in 0..cfg.per_day {
            let offset = rng.gen_range(0..SECS_PER_DAY);
            out.push(SyntheticReading {
                created_at: midnight + Duration::seconds(offset),
                value: rng.gen::<f64>() * cfg.max_value,
            });
        }
    }

    out
}

/// Insert `readings` with bounded concurrency and return how many were stored.
///
/// Best effort: a failed insert is logged and skipped.
pub async fn populate(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    readings: Vec<SyntheticReading>,
    concurrency: usize,
) -> usize {
    let total = readings.len();

    let inserted = stream::iter(readings)
        .map(|r| async move {
            match store.create_reading(kind, r.value, r.created_at).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(error = %e, created_at = %r.created_at, "back-fill insert failed, skipping");
                    false
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter(|ok| futures::future::ready(*ok))
        .count()
        .await;

    metrics::counter!("backfill_inserted_total").increment(inserted as u64);
    tracing::info!(%kind, inserted, attempted = total, "back-fill finished");

    inserted
}
