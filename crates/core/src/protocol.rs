//! Request/response envelopes for the subscriber operations.
//!
//! The transport that delivers these is out of scope; anything that can
//! produce the request structs (HTTP, a message bus, a test harness) can
//! drive a subscriber. Every response carries at least `success` and an
//! optional human-readable message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DataPoint, ShapeDefinition};

pub type Settings = Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitRequest {
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl InitResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConnectionRequest {
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl TestConnectionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverShapesRequest {
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverShapesResponse {
    pub success: bool,
    pub message: Option<String>,
    pub shapes: Vec<ShapeDefinition>,
}

impl DiscoverShapesResponse {
    pub fn ok(shapes: Vec<ShapeDefinition>) -> Self {
        Self {
            success: true,
            message: None,
            shapes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveDataPointRequest {
    pub data_point: DataPoint,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveDataPointResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl ReceiveDataPointResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisposeRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisposeResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl DisposeResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}
