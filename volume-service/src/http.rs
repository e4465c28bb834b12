use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use volume_client::domain::{AggregateRow, Reading, ReadingKind};

use crate::{
    aggregate::{Aggregator, PeriodTotal, ValueKind},
    backfill,
    config::{AppConfig, PopulateConfig},
    error::ApiError,
    ingest::Ingestor,
    store::ReadingStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub ingestor: Ingestor,
    pub aggregator: Aggregator,
    pub populate: PopulateConfig,
    pub utc_offset: UtcOffset,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, cfg: &AppConfig) -> anyhow::Result<Self> {
        let utc_offset = cfg.server.utc_offset()?;
        Ok(Self {
            ingestor: Ingestor::new(store.clone()),
            aggregator: Aggregator::new(
                store.clone(),
                cfg.periods.clone(),
                cfg.money.multiplier,
                utc_offset,
                cfg.server.recent_limit,
            ),
            store,
            populate: cfg.populate.clone(),
            utc_offset,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadingPayload {
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
    #[serde(rename = "type")]
    pub value_kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopulateQuery {
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PopulateResponse {
    pub inserted: usize,
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/volume", post(post_volume))
        .route("/vazao", post(post_flow_rate))
        .route("/volume-periodo", get(volume_by_period))
        .route("/vazao-periodo", get(flow_rate_by_period))
        .route("/volume-total", get(volume_total))
        .route("/vazao-total", get(flow_rate_total))
        .route("/volumes", get(recent_volumes))
        .route("/vazoes", get(recent_flow_rates));

    if state.populate.enabled {
        app = app.route("/populate-volumes", post(populate_volumes));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn record(
    state: &AppState,
    kind: ReadingKind,
    payload: Result<Json<ReadingPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!(%kind, error = %e, "unreadable request body");
        ApiError::validation("invalid payload")
    })?;

    let created = state
        .ingestor
        .record_reading(kind, &payload.value, OffsetDateTime::now_utc().to_offset(state.utc_offset))
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn post_volume(
    State(state): State<AppState>,
    payload: Result<Json<ReadingPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    record(&state, ReadingKind::Volume, payload).await
}

async fn post_flow_rate(
    State(state): State<AppState>,
    payload: Result<Json<ReadingPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    record(&state, ReadingKind::FlowRate, payload).await
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    match query {
        Ok(Query(params)) => Ok(params),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable query string");
            Err(ApiError::validation("invalid query"))
        }
    }
}

fn required_period(query: &PeriodQuery) -> Result<&str, ApiError> {
    match query.period.as_deref() {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(ApiError::validation("period is required")),
    }
}

async fn by_period(state: &AppState, kind: ReadingKind, query: PeriodQuery) -> Result<Json<Vec<AggregateRow>>, ApiError> {
    let value_kind = ValueKind::from_query(query.value_kind.as_deref())?;
    let period = required_period(&query)?;

    let rows = state.aggregator.aggregate(kind, period, value_kind).await?;
    Ok(Json(rows))
}

async fn volume_by_period(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Vec<AggregateRow>>, ApiError> {
    by_period(&state, ReadingKind::Volume, query_params(query)?).await
}

async fn flow_rate_by_period(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Vec<AggregateRow>>, ApiError> {
    by_period(&state, ReadingKind::FlowRate, query_params(query)?).await
}

async fn total(state: &AppState, kind: ReadingKind, query: PeriodQuery) -> Result<Json<PeriodTotal>, ApiError> {
    let period = required_period(&query)?;
    let total = state
        .aggregator
        .total_for_period(kind, period, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(total))
}

async fn volume_total(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<PeriodTotal>, ApiError> {
    total(&state, ReadingKind::Volume, query_params(query)?).await
}

async fn flow_rate_total(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<PeriodTotal>, ApiError> {
    total(&state, ReadingKind::FlowRate, query_params(query)?).await
}

async fn recent_volumes(State(state): State<AppState>) -> Result<Json<Vec<Reading>>, ApiError> {
    Ok(Json(state.aggregator.list_recent(ReadingKind::Volume).await?))
}

async fn recent_flow_rates(State(state): State<AppState>) -> Result<Json<Vec<Reading>>, ApiError> {
    Ok(Json(state.aggregator.list_recent(ReadingKind::FlowRate).await?))
}

async fn populate_volumes(
    State(state): State<AppState>,
    query: Result<Query<PopulateQuery>, QueryRejection>,
) -> Result<Json<PopulateResponse>, ApiError> {
    let seed = query_params(query)?.seed.unwrap_or_else(rand::random);
    let today = OffsetDateTime::now_utc().to_offset(state.utc_offset);
    let readings = backfill::synthetic_readings(&mut StdRng::seed_from_u64(seed), today, &state.populate);

    tracing::info!(seed, count = readings.len(), "populating synthetic volumes");
    let inserted = backfill::populate(
        state.store.as_ref(),
        ReadingKind::Volume,
        readings,
        state.populate.concurrency,
    )
    .await;

    Ok(Json(PopulateResponse { inserted }))
}
