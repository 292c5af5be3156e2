use axum::{extract::State, Json};

use crate::backend::AppState;
use crate::snapshot::TreeSnapshot;

/// GET/POST /tree - Current hierarchy, device table and pending log entries
pub async fn get_tree(State(state): State<AppState>) -> Json<TreeSnapshot> {
    let snapshot = state.backend.lock().snapshot();
    Json(snapshot)
}
