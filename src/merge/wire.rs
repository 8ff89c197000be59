//! Request/response payloads exchanged with the merge service.
//!
//! ```text
//! request:  { "content": { "mei": { "detail": <base64>, "encoding": "base64" } } }
//! response: { "content": { "resolved": "true" | "false", "mei": { "detail": <base64> } } }
//! ```
//!
//! `resolved` travels as a string. It is turned into a `bool` by
//! [`MergeResponse::into_reply`] and nothing past that point sees the string.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::document::Subtree;
use crate::error::MergeServiceError;

pub const BASE64_ENCODING: &str = "base64";

/// A base64-encoded MEI fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMei {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl EncodedMei {
    pub fn encode(data: &[u8]) -> Self {
        Self {
            detail: STANDARD.encode(data),
            encoding: Some(BASE64_ENCODING.to_string()),
        }
    }

    pub fn from_subtree(subtree: &Subtree) -> Self {
        Self::encode(&subtree.serialize())
    }

    pub fn decode(&self) -> Result<Vec<u8>, MergeServiceError> {
        match self.encoding.as_deref() {
            None | Some(BASE64_ENCODING) => {}
            Some(other) => {
                return Err(MergeServiceError::Protocol(format!(
                    "unsupported encoding '{other}'"
                )))
            }
        }
        STANDARD
            .decode(self.detail.trim())
            .map_err(|e| MergeServiceError::Protocol(format!("invalid base64: {e}")))
    }

    pub fn to_subtree(&self) -> Result<Subtree, MergeServiceError> {
        let data = self.decode()?;
        Subtree::parse(&data).map_err(|e| MergeServiceError::Protocol(e.to_string()))
    }
}

// ─── Request ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub content: RequestContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContent {
    pub mei: EncodedMei,
}

impl MergeRequest {
    pub fn from_subtree(measure: &Subtree) -> Self {
        Self {
            content: RequestContent {
                mei: EncodedMei::from_subtree(measure),
            },
        }
    }

    /// The measure carried by this request.
    pub fn measure(&self) -> Result<Subtree, MergeServiceError> {
        self.content.mei.to_subtree()
    }
}

// ─── Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub content: ResponseContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContent {
    pub resolved: ResolvedFlag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mei: Option<EncodedMei>,
}

/// The `resolved` field as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedFlag {
    Text(String),
    Bool(bool),
}

impl ResolvedFlag {
    fn as_bool(&self) -> Result<bool, MergeServiceError> {
        match self {
            ResolvedFlag::Bool(b) => Ok(*b),
            ResolvedFlag::Text(s) => match s.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(MergeServiceError::Protocol(format!(
                    "resolved flag '{other}' is neither \"true\" nor \"false\""
                ))),
            },
        }
    }
}

/// A reply normalized at the service boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReply {
    pub resolved: bool,
    pub measure: Option<Subtree>,
}

impl MergeResponse {
    pub fn resolved(measure: &Subtree) -> Self {
        Self {
            content: ResponseContent {
                resolved: ResolvedFlag::Text("true".to_string()),
                mei: Some(EncodedMei::from_subtree(measure)),
            },
        }
    }

    pub fn still_conflicting(measure: Option<&Subtree>) -> Self {
        Self {
            content: ResponseContent {
                resolved: ResolvedFlag::Text("false".to_string()),
                mei: measure.map(EncodedMei::from_subtree),
            },
        }
    }

    pub fn into_reply(self) -> Result<MergeReply, MergeServiceError> {
        let resolved = self.content.resolved.as_bool()?;
        let measure = self
            .content
            .mei
            .as_ref()
            .map(EncodedMei::to_subtree)
            .transpose()?;
        if resolved && measure.is_none() {
            return Err(MergeServiceError::Protocol(
                "resolved reply carries no measure".to_string(),
            ));
        }
        Ok(MergeReply { resolved, measure })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_matches_wire_shape() {
        let measure = Subtree::parse(br#"<measure xml:id="m1"/>"#).unwrap();
        let json = serde_json::to_value(MergeRequest::from_subtree(&measure)).unwrap();
        assert_eq!(json["content"]["mei"]["encoding"], "base64");
        let detail = json["content"]["mei"]["detail"].as_str().unwrap();
        assert_eq!(STANDARD.decode(detail).unwrap(), measure.serialize());
    }

    #[test]
    fn string_flag_is_normalized() {
        let json = r#"{ "content": { "resolved": "false", "mei": { "detail": "" } } }"#;
        let response: MergeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.content.resolved, ResolvedFlag::Text("false".into()));
        // empty detail decodes to empty bytes, which is not a measure
        assert!(response.into_reply().is_err());

        let json = r#"{ "content": { "resolved": "false" } }"#;
        let reply = serde_json::from_str::<MergeResponse>(json).unwrap().into_reply().unwrap();
        assert!(!reply.resolved);
        assert!(reply.measure.is_none());
    }

    #[test]
    fn unknown_flag_is_protocol_error() {
        let json = r#"{ "content": { "resolved": "maybe" } }"#;
        let err = serde_json::from_str::<MergeResponse>(json)
            .unwrap()
            .into_reply()
            .unwrap_err();
        assert!(matches!(err, MergeServiceError::Protocol(_)));
    }

    #[test]
    fn resolved_without_measure_is_rejected() {
        let json = r#"{ "content": { "resolved": true } }"#;
        let err = serde_json::from_str::<MergeResponse>(json)
            .unwrap()
            .into_reply()
            .unwrap_err();
        assert!(matches!(err, MergeServiceError::Protocol(_)));
    }
}
