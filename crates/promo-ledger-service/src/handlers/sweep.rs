//! Expiry sweep handlers.
//!
//! Both passes are triggered on demand by the platform scheduler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use promo_ledger_engine::{SweepReport, WarningReport};

use crate::error::ApiError;
use crate::state::AppState;

/// Expire every allocation past its date and reclaim unused credit.
pub async fn sweep_expired(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.sweeper.sweep_expired()?;
    Ok(Json(report))
}

/// Expiry warnings request.
#[derive(Debug, Deserialize)]
pub struct WarningsRequest {
    /// How many days ahead to warn (default: 7).
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,
}

fn default_days_ahead() -> i64 {
    7
}

/// Send expiry warnings for allocations lapsing inside the window.
pub async fn send_warnings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WarningsRequest>,
) -> Result<Json<WarningReport>, ApiError> {
    let report = state.sweeper.send_expiry_warnings(body.days_ahead).await?;
    Ok(Json(report))
}
