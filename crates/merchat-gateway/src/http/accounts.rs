use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /accounts — per-account supervisor state plus presence (§4.13).
pub async fn accounts_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let accounts = state.store.list_accounts(None).unwrap_or_default();
    let body: Vec<Value> = accounts
        .iter()
        .map(|a| {
            json!({
                "channel": a.channel,
                "shop_id": a.shop_id.as_str(),
                "account_user_id": a.account_user_id.as_str(),
                "presence": a.presence.to_string(),
                "session_state": format!("{:?}", state.supervisor.state_of(a)),
            })
        })
        .collect();
    Json(json!({ "accounts": body }))
}
