pub mod reading_queries;

/// Failure reported by the backing store.
///
/// `NoRows` is kept apart from every other driver failure so callers can map
/// it to an empty-result signal instead of a server fault.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no rows returned")]
    NoRows,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NoRows,
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_no_rows() {
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NoRows));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Database(sqlx::Error::PoolTimedOut)
        ));
    }
}
