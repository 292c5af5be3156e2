//! Node mutation endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

use super::error::ApiError;
use crate::backend::{AppState, NodeAction};
use crate::snapshot::TreeSnapshot;

/// Body of `POST /change-node`. Exactly one action key must be set; the
/// flag-style actions count only when `true`.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "exactly_one_action"))]
pub struct ChangeNodeRequest {
    #[validate(length(min = 1))]
    pub id: String,
    pub capacity: Option<f64>,
    pub add_node: Option<bool>,
    pub delete_node: Option<bool>,
    pub change_parent_routing: Option<bool>,
    pub new_parent: Option<String>,
}

fn exactly_one_action(req: &ChangeNodeRequest) -> Result<(), ValidationError> {
    let flags = [req.add_node, req.delete_node, req.change_parent_routing]
        .into_iter()
        .filter(|flag| *flag == Some(true))
        .count();
    let count = flags + usize::from(req.capacity.is_some()) + usize::from(req.new_parent.is_some());
    if count != 1 {
        let mut error = ValidationError::new("exactly_one_action");
        error.message = Some(
            "exactly one of capacity, add_node, delete_node, change_parent_routing, new_parent is required"
                .into(),
        );
        return Err(error);
    }
    Ok(())
}

impl ChangeNodeRequest {
    fn action(self) -> NodeAction {
        if let Some(capacity) = self.capacity {
            NodeAction::SetCapacity(capacity)
        } else if let Some(parent) = self.new_parent {
            NodeAction::NewParent(parent)
        } else if self.add_node == Some(true) {
            NodeAction::AddNode
        } else if self.delete_node == Some(true) {
            NodeAction::DeleteNode
        } else {
            NodeAction::ChangeParentRouting
        }
    }
}

/// POST /change-node - Apply one mutation and return the new snapshot
pub async fn change_node(
    State(state): State<AppState>,
    payload: Result<Json<ChangeNodeRequest>, JsonRejection>,
) -> Result<Json<TreeSnapshot>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    req.validate()?;

    let id = req.id.clone();
    let action = req.action();
    info!(node_id = %id, ?action, "node mutation requested");
    let snapshot = state.backend.lock().apply(&id, action)?;
    Ok(Json(snapshot))
}
