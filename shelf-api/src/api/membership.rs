//! Membership endpoints

use axum::{extract::State, Json};
use indexmap::IndexMap;
use serde_json::{json, Value};
use shelf_common::Record;

use crate::error::ApiResult;
use crate::AppState;

type Keyed = Json<IndexMap<String, Record>>;

/// GET /pricing_plans
pub async fn pricing_plans(State(state): State<AppState>) -> ApiResult<Keyed> {
    Ok(Json(state.membership.pricing_plans().await?))
}

/// GET /sold_subscriptions
pub async fn sold_subscriptions(State(state): State<AppState>) -> ApiResult<Keyed> {
    Ok(Json(state.membership.sold_subscriptions().await?))
}

/// GET /all_members
pub async fn all_members(State(state): State<AppState>) -> ApiResult<Keyed> {
    Ok(Json(state.membership.members().await?))
}

/// GET /all_contacts
pub async fn all_contacts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let contacts = state.membership.contacts().await?;
    Ok(Json(json!({ "contacts": contacts })))
}
