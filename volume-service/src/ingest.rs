use std::sync::Arc;

use time::OffsetDateTime;
use volume_client::domain::{Reading, ReadingKind};

use crate::{error::ApiError, store::ReadingStore};

/// Parse a reading sent as a decimal string.
///
/// Rules:
/// - plain base-10 float syntax only: no unit suffix, no thousands separator,
///   no surrounding whitespace;
/// - the result must be finite.
pub fn parse_reading_value(raw: &str) -> Result<f64, ApiError> {
    let looks_numeric = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));

    match raw.parse::<f64>() {
        Ok(v) if looks_numeric && v.is_finite() => Ok(v),
        _ => Err(ApiError::validation("not a numeric string")),
    }
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ReadingStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// Validate `raw` and store it with `received_at` as its timestamp.
    pub async fn record_reading(
        &self,
        kind: ReadingKind,
        raw: &str,
        received_at: OffsetDateTime,
    ) -> Result<Reading, ApiError> {
        let value = match parse_reading_value(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%kind, raw, "rejected non-numeric reading");
                metrics::counter!("readings_rejected_total").increment(1);
                return Err(e);
            }
        };

        let created = self.store.create_reading(kind, value, received_at).await?;

        metrics::counter!("readings_ingested_total", "kind" => kind.as_str()).increment(1);
        tracing::info!(
            %kind,
            id = created.id,
            value = created.value,
            created_at = %created.created_at,
            "reading stored"
        );

        Ok(created)
    }
}
