use serde::{Deserialize, Serialize};

use crate::services::EventType;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: Option<String>,
}

/// Outcome of a single dispatch. `dispatched=false` means the trigger API
/// answered with something other than 200/204.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub event_type: EventType,
    pub cluster_name: Option<String>,
    pub dispatched: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerStatus {
    pub repository: String,
    pub reachable: bool,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            message: None,
        }
    }
}
