// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/reply types for the message boundary (spec.md §6).

use serde::{Deserialize, Serialize};

use arn_core::id::CorrelationId;

/// Job type as it travels on the wire (spec.md §6: `jobtype` ∈ {GROUP, IMAGE, NONE}).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireJobType {
    Group,
    Image,
    None,
}

/// A request frame, tagged with its correlation id (spec.md §6: "first
/// frame: correlation id").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub correlation_id: CorrelationId,
    pub body: RequestBody,
}

/// Request tags and required fields (spec.md §6 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum RequestBody {
    #[serde(rename = "PIPELINE")]
    Pipeline,
    #[serde(rename = "INITIAL_MEASUREMENTS")]
    InitialMeasurements,
    #[serde(rename = "WORK")]
    Work,
    #[serde(rename = "MEASUREMENTS")]
    Measurements {
        path: String,
        image_set_numbers: String,
    },
    #[serde(rename = "INTERACTION")]
    Interaction { payload: Vec<u8> },
    #[serde(rename = "DISPLAY")]
    Display { payload: Vec<u8> },
    #[serde(rename = "EXCEPTION")]
    Exception { payload: Vec<u8> },
}

impl RequestBody {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Pipeline => "PIPELINE",
            RequestBody::InitialMeasurements => "INITIAL_MEASUREMENTS",
            RequestBody::Work => "WORK",
            RequestBody::Measurements { .. } => "MEASUREMENTS",
            RequestBody::Interaction { .. } => "INTERACTION",
            RequestBody::Display { .. } => "DISPLAY",
            RequestBody::Exception { .. } => "EXCEPTION",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub correlation_id: CorrelationId,
    pub body: ResponseBody,
}

/// Reply fields (spec.md §6 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResponseBody {
    Pipeline { pipeline_blob: String },
    InitialMeasurements { path: String },
    Work { jobtype: WireJobType, images: Option<String> },
    MeasurementsAck { message: String },
    /// Interaction/Display/Exception replies: opaque to the core, the
    /// front end decides the payload shape (spec.md §6).
    Opaque { payload: Vec<u8> },
    /// Delivered when the boundary is stopped before a reply was posted
    /// (spec.md §7 `BoundaryExited`).
    BoundaryExited,
    /// A malformed or unrecognized request (spec.md §7 `ProtocolError`).
    Error { message: String },
}

pub const MEASUREMENTS_ACK: &str = "THANKS";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json_with_its_tag() {
        let env = RequestEnvelope {
            correlation_id: CorrelationId::new(),
            body: RequestBody::Measurements {
                path: "/tmp/job.store".to_string(),
                image_set_numbers: "1,2,3".to_string(),
            },
        };
        let json = serde_json::to_string(&env).expect("serialize");
        assert!(json.contains("\"MEASUREMENTS\""));
        let back: RequestEnvelope = serde_json::from_str(&json).expect("deserialize");
        match back.body {
            RequestBody::Measurements { path, image_set_numbers } => {
                assert_eq!(path, "/tmp/job.store");
                assert_eq!(image_set_numbers, "1,2,3");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_fails_to_deserialize() {
        let raw = r#"{"correlation_id":"00000000-0000-0000-0000-000000000000","body":{"tag":"NOT_A_REAL_TAG"}}"#;
        let result: Result<RequestEnvelope, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
