use time::OffsetDateTime;

/// Sum of readings whose `created_at` truncates to `period`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AggregateRow {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub period: OffsetDateTime,
    pub total_value: f64,
}
