use time::OffsetDateTime;

/// A single stored sensor reading.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Reading {
    pub id: i64,
    pub value: f64,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
}

/// Which collection a reading belongs to. Both kinds share the same row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReadingKind {
    Volume,
    FlowRate,
}

impl ReadingKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Volume => "volumes",
            Self::FlowRate => "flow_rates",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::FlowRate => "flow_rate",
        }
    }
}

impl std::fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
