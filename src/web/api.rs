use crate::i18n::{Lang, Translations};
use crate::market::{quote, Asset, MarketFeed, Quote, TransactionFeed};
use crate::metrics;
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Shared state behind the site data endpoints.
#[derive(Clone)]
pub struct ApiState {
    pub market: Arc<dyn MarketFeed>,
    pub transactions: TransactionFeed,
    pub translations: Arc<Translations>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "ok": false, "error": message })), status)
        .into_response()
}

fn with_state(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn health_check() -> Result<Response, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
    .into_response())
}

async fn get_token(state: ApiState) -> Result<Response, Infallible> {
    match state.market.token_data().await {
        Ok(data) => Ok(warp::reply::json(&data).into_response()),
        Err(e) => {
            error!("Failed to fetch token data: {}", e);
            Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch token data"))
        }
    }
}

async fn get_transactions(state: ApiState) -> Result<Response, Infallible> {
    Ok(warp::reply::json(&state.transactions.snapshot().await).into_response())
}

fn price(query: &QuoteQuery) -> crate::Result<Quote> {
    let from: Asset = query.from.parse()?;
    let to: Asset = query.to.parse()?;
    quote(from, to, query.amount)
}

async fn get_quote(query: QuoteQuery) -> Result<Response, Infallible> {
    match price(&query) {
        Ok(q) => Ok(warp::reply::json(&q).into_response()),
        Err(e) => Ok(error_reply(StatusCode::BAD_REQUEST, &e.to_string())),
    }
}

async fn get_translations(code: String, state: ApiState) -> Result<Response, Infallible> {
    let table = code
        .parse::<Lang>()
        .ok()
        .and_then(|lang| state.translations.table(lang));
    match table {
        Some(table) => Ok(warp::reply::json(table).into_response()),
        None => Ok(error_reply(
            StatusCode::NOT_FOUND,
            &format!("Unsupported language '{}'", code),
        )),
    }
}

async fn get_metrics() -> Result<Response, Infallible> {
    match metrics::gather() {
        Ok(text) => Ok(warp::reply::with_header(text, "content-type", "text/plain; version=0.0.4")
            .into_response()),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics"))
        }
    }
}

pub fn routes(state: ApiState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let health = warp::path!("health").and(warp::get()).and_then(health_check);
    let token = warp::path!("api" / "token")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_token);
    let transactions = warp::path!("api" / "transactions")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_transactions);
    let quote_route = warp::path!("api" / "quote")
        .and(warp::get())
        .and(warp::query::<QuoteQuery>())
        .and_then(get_quote);
    let i18n = warp::path!("api" / "i18n" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_translations);
    let metrics_route = warp::path!("metrics").and(warp::get()).and_then(get_metrics);

    health
        .or(token)
        .unify()
        .or(transactions)
        .unify()
        .or(quote_route)
        .unify()
        .or(i18n)
        .unify()
        .or(metrics_route)
        .unify()
}
