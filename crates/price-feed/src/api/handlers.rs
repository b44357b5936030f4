//! API handlers for price feed HTTP endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::{Country, Envelope};
use std::sync::Arc;
use std::time::Duration;

use crate::api::models::*;
use crate::cache::PriceFeedCache;
use crate::calc::{self, CalculationInput};
use crate::error::FeedError;
use crate::history::{self, HistoryPeriod};

type ApiError = (StatusCode, Json<Envelope<()>>);

pub struct PriceApiState {
    pub cache: Arc<PriceFeedCache>,
    /// Country code → tax rate in percent
    pub tax_rates: Vec<(Country, f64)>,
    pub calculation_validity: Duration,
}

impl PriceApiState {
    fn tax_rate_for(&self, country: Country) -> f64 {
        self.tax_rates
            .iter()
            .find(|(c, _)| *c == country)
            .map(|(_, rate)| *rate)
            .unwrap_or(0.0)
    }
}

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(Envelope::error(code, message)))
}

fn parse_country(raw: Option<&str>) -> Result<Country, ApiError> {
    // India is the primary storefront; an absent country selects it.
    let Some(raw) = raw else {
        return Ok(Country::IN);
    };
    Country::parse(raw).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_COUNTRY",
            format!("unsupported country: {}", raw),
        )
    })
}

/// `GET /price/gold/spot`
pub async fn get_spot_price(
    State(state): State<Arc<PriceApiState>>,
) -> Json<Envelope<SpotPriceResponse>> {
    let spot = state.cache.spot_price().await;
    Json(Envelope::success(SpotPriceResponse::from(spot)))
}

/// `GET /price/gold?country=IN|AE|UK`
pub async fn get_price_table(
    State(state): State<Arc<PriceApiState>>,
    Query(params): Query<CountryParams>,
) -> Result<Json<Envelope<PriceTableResponse>>, ApiError> {
    let country = parse_country(params.country.as_deref())?;
    let table = state.cache.price_table(country).await;
    Ok(Json(Envelope::success(PriceTableResponse::from(
        table.as_ref(),
    ))))
}

/// `GET /price/gold/history?period=7d|30d|90d|365d&country=..`
pub async fn get_history(
    State(state): State<Arc<PriceApiState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Envelope<HistoryResponse>>, ApiError> {
    let country = parse_country(params.country.as_deref())?;

    let period = match params.period.as_deref() {
        None => HistoryPeriod::Days30,
        Some(raw) => HistoryPeriod::parse(raw).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_PERIOD",
                format!("unsupported period: {}", raw),
            )
        })?,
    };

    let table = state.cache.price_table(country).await;
    let base = common::round2(table.base_price_per_gram());
    let (points, summary) = history::generate(base, period, Utc::now().date_naive());

    Ok(Json(Envelope::success(HistoryResponse {
        period: period.label().to_string(),
        country,
        currency: table.currency,
        summary: summary.into(),
        points: points.iter().map(HistoryPointResponse::from).collect(),
    })))
}

/// `POST /price/calculate`
pub async fn calculate_price(
    State(state): State<Arc<PriceApiState>>,
    Json(req): Json<CalculateRequest>,
) -> Result<Json<Envelope<CalculationResponse>>, ApiError> {
    let table = state.cache.price_table(req.country).await;

    let input = CalculationInput {
        gold_weight_grams: req.gold_weight,
        purity: req.purity,
        stone_value: req.stone_value,
        labor_cost: req.labor_cost,
        making_charges_percent: req.making_charges_percent,
    };

    let calculation = calc::calculate(
        &input,
        &table,
        state.tax_rate_for(req.country),
        state.calculation_validity,
        Utc::now(),
    )
    .map_err(|e| match e {
        FeedError::Validation(msg) => {
            api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
        other => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            other.to_string(),
        ),
    })?;

    Ok(Json(Envelope::success(CalculationResponse::from(
        calculation,
    ))))
}
