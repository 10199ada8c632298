//! Read-only views of the payment ledger.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use checkout::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::{Storefront, TransactionQuery, TransactionRecord, TransactionStatus};

use crate::AppState;
use crate::error::ApiError;

pub const PAGE_SIZE: usize = 25;
const RECENT: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    /// `today`, `week` or `month`.
    pub period: Option<String>,
    pub page: Option<String>,
}

#[derive(Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionRecord>,
    pub page: usize,
    pub per_page: usize,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub total: u64,
    pub pending: u64,
    pub complete: u64,
    pub recent: Vec<TransactionRecord>,
}

/// Start of the reporting window, if any.
fn period_start(period: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let start = match period {
        "" => None,
        "today" => now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc()),
        "week" => Some(now - chrono::Duration::days(7)),
        "month" => Some(now - chrono::Duration::days(30)),
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown period '{other}', expected today, week or month"
            )));
        }
    };
    Ok(start)
}

/// Out-of-range or unparseable pages fall back to the nearest valid page.
fn page_number(raw: Option<&str>, total_pages: u64) -> usize {
    let requested = raw.and_then(|p| p.trim().parse::<usize>().ok()).unwrap_or(1);
    requested.clamp(1, total_pages.max(1) as usize)
}

fn build_query(params: &ListParams, now: DateTime<Utc>) -> Result<TransactionQuery, ApiError> {
    let mut query = TransactionQuery::new();
    if let Some(search) = &params.search {
        query = query.search(search.as_str());
    }
    if let Some(status) = params.status.as_deref().map(str::trim)
        && !status.is_empty()
    {
        let status = TransactionStatus::from_str(status).map_err(ApiError::BadRequest)?;
        query = query.status(status);
    }
    if let Some(start) = period_start(params.period.as_deref().unwrap_or("").trim(), now)? {
        query = query.from_timestamp(start);
    }
    Ok(query)
}

/// GET /transactions: filtered ledger, newest first, 25 per page.
#[tracing::instrument(skip(state))]
pub async fn list<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<TransactionPage>, ApiError> {
    let query = build_query(&params, Utc::now())?;

    let total = state.store.count_transactions(query.clone()).await?;
    let total_pages = total.div_ceil(PAGE_SIZE as u64);
    let page = page_number(params.page.as_deref(), total_pages);

    let transactions = state
        .store
        .query_transactions(query.offset((page - 1) * PAGE_SIZE).limit(PAGE_SIZE))
        .await?;

    Ok(Json(TransactionPage {
        transactions,
        page,
        per_page: PAGE_SIZE,
        total,
        total_pages,
    }))
}

/// GET /transactions/summary: ledger counts and the latest records.
#[tracing::instrument(skip(state))]
pub async fn summary<S: Storefront + Clone + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let counts = state.store.summary().await?;
    let recent = state
        .store
        .query_transactions(TransactionQuery::new().limit(RECENT))
        .await?;

    Ok(Json(SummaryResponse {
        total: counts.total,
        pending: counts.pending,
        complete: counts.complete,
        recent,
    }))
}
