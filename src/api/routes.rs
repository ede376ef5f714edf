//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<PriceOracle>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::format::format_price_response;
use crate::oracle::PriceOracle;
use crate::types::{
    AlertThreshold, AuthoritativePrice, CardKey, HistoricalPoint, MarketAnalysis,
    PriceOptions, QuickPrice, ResponseStyle, Urgency,
};

pub type AppState = Arc<PriceOracle>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CardQuery {
    pub name: String,
    pub set: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl CardQuery {
    fn key(&self) -> CardKey {
        CardKey::new(&self.name, &self.set, self.condition.as_deref())
    }
}

/// Name and set only. The quick and analysis lookups always price the
/// default condition, so a `condition` parameter is rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardNameQuery {
    pub name: String,
    pub set: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub name: String,
    pub set: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormatQuery {
    pub name: String,
    pub set: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertRequest {
    pub name: String,
    pub set: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub buy_below: Option<f64>,
    #[serde(default)]
    pub sell_above: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub card_key: CardKey,
    pub threshold: AlertThreshold,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattedResponse {
    pub card_key: CardKey,
    pub style: ResponseStyle,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub card_key: CardKey,
    pub points: Vec<HistoricalPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A 400 with a JSON body.
pub struct BadRequest(String);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: self.0 })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/price
pub async fn get_price(
    State(oracle): State<AppState>,
    Query(q): Query<PriceQuery>,
) -> Result<Json<AuthoritativePrice>, BadRequest> {
    let urgency = match q.urgency.as_deref() {
        Some(u) => u.parse::<Urgency>().map_err(|e| BadRequest(e.to_string()))?,
        None => Urgency::default(),
    };

    let result = oracle
        .get_authoritative_price(
            &q.name,
            &q.set,
            PriceOptions {
                condition: q.condition,
                urgency,
            },
        )
        .await;

    Ok(Json(result))
}

/// GET /api/quick (near-mint only)
pub async fn get_quick(
    State(oracle): State<AppState>,
    Query(q): Query<CardNameQuery>,
) -> Json<QuickPrice> {
    Json(oracle.get_quick_price(&q.name, &q.set).await)
}

/// GET /api/analysis (near-mint only)
pub async fn get_analysis(
    State(oracle): State<AppState>,
    Query(q): Query<CardNameQuery>,
) -> Json<MarketAnalysis> {
    Json(oracle.get_market_analysis(&q.name, &q.set).await)
}

/// GET /api/format
pub async fn get_formatted(
    State(oracle): State<AppState>,
    Query(q): Query<FormatQuery>,
) -> Result<Json<FormattedResponse>, BadRequest> {
    let style = match q.style.as_deref() {
        Some(s) => s.parse::<ResponseStyle>().map_err(|e| BadRequest(e.to_string()))?,
        None => ResponseStyle::default(),
    };

    let result = oracle
        .get_authoritative_price(
            &q.name,
            &q.set,
            PriceOptions {
                condition: q.condition,
                urgency: Urgency::Normal,
            },
        )
        .await;

    Ok(Json(FormattedResponse {
        card_key: result.card.key.clone(),
        style,
        text: format_price_response(&result, style),
    }))
}

/// POST /api/alerts
pub async fn post_alert(
    State(oracle): State<AppState>,
    Json(req): Json<AlertRequest>,
) -> Json<AlertResponse> {
    let card_key = CardKey::new(&req.name, &req.set, req.condition.as_deref());
    let threshold = oracle.set_alert(&card_key, req.buy_below, req.sell_above).await;
    Json(AlertResponse { card_key, threshold })
}

/// DELETE /api/alerts
pub async fn delete_alert(
    State(oracle): State<AppState>,
    Json(req): Json<CardQuery>,
) -> StatusCode {
    match oracle.remove_alert(&req.key()).await {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// GET /api/history
pub async fn get_history(
    State(oracle): State<AppState>,
    Query(q): Query<CardQuery>,
) -> Json<HistoryResponse> {
    let card_key = q.key();
    let points = oracle.history(&card_key).await;
    Json(HistoryResponse { card_key, points })
}

/// GET /api/cache
pub async fn get_cache_stats(State(oracle): State<AppState>) -> Json<CacheStats> {
    Json(oracle.cache_stats().await)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
