use sqlx::PgPool;
use time::OffsetDateTime;

use super::StoreError;
use crate::domain::{AggregateRow, PeriodToken, Reading, ReadingKind};

/// Insert one reading and return it as stored.
pub async fn create_reading(
    pool: &PgPool,
    kind: ReadingKind,
    value: f64,
    created_at: OffsetDateTime,
) -> Result<Reading, StoreError> {
    // Table names come from a closed enum, never from user input.
    let sql = format!(
        r#"
        INSERT INTO {} (value, created_at)
        VALUES ($1, $2)
        RETURNING id, value, created_at
        "#,
        kind.table_name()
    );

    let row = sqlx::query_as::<_, Reading>(&sql)
        .bind(value)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Sum readings grouped by `date_trunc(period, created_at)`, newest bucket first.
///
/// Truncation follows the session `TimeZone` of the connection.
pub async fn sum_grouped_by_truncated_timestamp(
    pool: &PgPool,
    kind: ReadingKind,
    period: PeriodToken,
    limit: i64,
) -> Result<Vec<AggregateRow>, StoreError> {
    let sql = format!(
        r#"
        SELECT
            date_trunc($1, created_at) AS period,
            SUM(value)::float8         AS total_value
        FROM {}
        GROUP BY period
        ORDER BY period DESC
        LIMIT $2
        "#,
        kind.table_name()
    );

    let rows = sqlx::query_as::<_, AggregateRow>(&sql)
        .bind(period.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Sum of readings with `start <= created_at < end`; `None` when the window is empty.
pub async fn sum_for_window(
    pool: &PgPool,
    kind: ReadingKind,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Option<f64>, StoreError> {
    let sql = format!(
        r#"
        SELECT SUM(value)::float8
        FROM {}
        WHERE created_at >= $1
          AND created_at <  $2
        "#,
        kind.table_name()
    );

    let total = sqlx::query_scalar::<_, Option<f64>>(&sql)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Most recent raw readings, newest first.
pub async fn list_recent(pool: &PgPool, kind: ReadingKind, limit: i64) -> Result<Vec<Reading>, StoreError> {
    let sql = format!(
        r#"
        SELECT id, value, created_at
        FROM {}
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
        kind.table_name()
    );

    let rows = sqlx::query_as::<_, Reading>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

