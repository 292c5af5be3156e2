//! Device mutation endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

use super::error::ApiError;
use crate::backend::{AppState, DeviceAction};
use crate::domain::DeviceType;
use crate::snapshot::TreeSnapshot;

#[derive(Debug, Clone, Deserialize)]
pub struct AddDevice {
    pub device_type: DeviceType,
    pub name: Option<String>,
    pub avg_power: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveDevice {
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAverage {
    pub device_id: String,
    pub avg_power: f64,
    #[serde(default)]
    pub snap_to_average: bool,
}

/// Body of `POST /change-device`; exactly one of the three actions.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "exactly_one_device_action"))]
pub struct ChangeDeviceRequest {
    #[validate(length(min = 1))]
    pub node_id: String,
    pub add_device: Option<AddDevice>,
    pub remove_device: Option<RemoveDevice>,
    pub set_average: Option<SetAverage>,
}

fn exactly_one_device_action(req: &ChangeDeviceRequest) -> Result<(), ValidationError> {
    let count = usize::from(req.add_device.is_some())
        + usize::from(req.remove_device.is_some())
        + usize::from(req.set_average.is_some());
    if count != 1 {
        let mut error = ValidationError::new("exactly_one_action");
        error.message =
            Some("exactly one of add_device, remove_device, set_average is required".into());
        return Err(error);
    }
    Ok(())
}

impl ChangeDeviceRequest {
    fn action(self) -> Option<DeviceAction> {
        if let Some(add) = self.add_device {
            return Some(DeviceAction::Add {
                device_type: add.device_type,
                name: add.name,
                avg_power: add.avg_power,
            });
        }
        if let Some(remove) = self.remove_device {
            return Some(DeviceAction::Remove {
                device_id: remove.device_id,
            });
        }
        self.set_average.map(|set| DeviceAction::SetAverage {
            device_id: set.device_id,
            avg_power: set.avg_power,
            snap_to_average: set.snap_to_average,
        })
    }
}

/// POST /change-device - Add, remove or re-rate a consumer's device
pub async fn change_device(
    State(state): State<AppState>,
    payload: Result<Json<ChangeDeviceRequest>, JsonRejection>,
) -> Result<Json<TreeSnapshot>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    req.validate()?;

    let node_id = req.node_id.clone();
    let action = req
        .action()
        .ok_or_else(|| ApiError::ValidationError("missing device action".to_string()))?;
    info!(node_id = %node_id, ?action, "device mutation requested");
    let snapshot = state.backend.lock().apply_device(&node_id, action)?;
    Ok(Json(snapshot))
}
