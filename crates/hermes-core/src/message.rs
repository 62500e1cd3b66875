//! Message envelope and wire encoding.
//!
//! Everything crossing the broker is JSON. Decoding ignores unknown fields so
//! instances running a newer schema can share a channel with older ones.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Encode an event into its wire representation.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the event cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(event: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(event).map_err(|e| Error::Encoding(e.to_string()))
}

/// Decode an event from its wire representation.
///
/// # Errors
///
/// Returns [`Error::Decoding`] if the bytes are not a valid encoded event.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Decoding(e.to_string()))
}

/// Repository visibility, used by consumers to decide who may see an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone
    Public,
    /// Visible to authenticated users
    Internal,
    /// Visible to repository members only
    #[default]
    Private,
}

/// Envelope broadcast to every instance of the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Repository slug, e.g. `octocat/hello-world`
    pub repository: String,
    /// Visibility of the repository
    #[serde(default)]
    pub visibility: Visibility,
    /// Event payload, opaque to the hub
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Message {
    /// Create an envelope around an already-encoded payload.
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        visibility: Visibility,
        data: serde_json::Value,
    ) -> Self {
        Self {
            repository: repository.into(),
            visibility,
            data,
        }
    }

    /// Create an envelope around a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the payload cannot be serialized.
    pub fn with_payload<T: Serialize>(
        repository: impl Into<String>,
        visibility: Visibility,
        payload: &T,
    ) -> Result<Self> {
        let data = serde_json::to_value(payload).map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(Self::new(repository, visibility, data))
    }

    /// Decode the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decoding`] if the payload does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data).map_err(|e| Error::Decoding(e.to_string()))
    }
}

/// Build status carried by pipeline events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Waiting for a runner
    Pending,
    /// Running
    Running,
    /// Finished successfully
    Success,
    /// Finished with a failing step
    Failure,
    /// Stopped by a user
    Killed,
    /// Infrastructure error
    Error,
}

impl BuildStatus {
    /// Whether the build can no longer change state.
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Killed | Self::Error
        )
    }
}

/// Standard payload for build lifecycle messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A build was created and queued
    BuildCreated {
        /// Build number within the repository
        build: u64,
        /// Commit the build runs against
        commit: String,
    },
    /// A build changed status
    BuildUpdated {
        /// Build number
        build: u64,
        /// New status
        status: BuildStatus,
    },
    /// A stage of a build changed status
    StageUpdated {
        /// Build number
        build: u64,
        /// Stage number within the build
        stage: u32,
        /// New status
        status: BuildStatus,
    },
    /// A build reached a terminal status
    BuildFinished {
        /// Build number
        build: u64,
        /// Terminal status
        status: BuildStatus,
        /// Completion time
        finished_at: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Build number from any event variant.
    #[must_use]
    pub fn build(&self) -> u64 {
        match self {
            Self::BuildCreated { build, .. }
            | Self::BuildUpdated { build, .. }
            | Self::StageUpdated { build, .. }
            | Self::BuildFinished { build, .. } => *build,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trip() {
        let event = PipelineEvent::StageUpdated {
            build: 42,
            stage: 2,
            status: BuildStatus::Running,
        };
        let msg = Message::with_payload("octocat/hello-world", Visibility::Public, &event).unwrap();

        let bytes = encode(&msg).unwrap();
        let decoded: Message = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.payload::<PipelineEvent>().unwrap(), event);
    }

    #[test]
    fn test_wire_format() {
        let event = PipelineEvent::BuildCreated {
            build: 7,
            commit: "abc123".to_string(),
        };
        let msg =
            Message::with_payload("octocat/hello-world", Visibility::Internal, &event).unwrap();
        let json = String::from_utf8(encode(&msg).unwrap()).unwrap();
        assert!(json.contains("\"visibility\":\"internal\""));
        assert!(json.contains("\"type\":\"build_created\""));
        assert!(json.contains("\"commit\":\"abc123\""));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let raw = br#"{"repository":"a/b","visibility":"public","data":null,"trace_id":"x"}"#;
        let msg: Message = decode(raw).unwrap();
        assert_eq!(msg.repository, "a/b");
        assert_eq!(msg.visibility, Visibility::Public);
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let msg: Message = decode(br#"{"repository":"a/b"}"#).unwrap();
        assert_eq!(msg.visibility, Visibility::Private);
        assert!(msg.data.is_null());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<Message>(b"not json").unwrap_err();
        assert!(matches!(err, Error::Decoding(_)));
    }

    #[test]
    fn test_encode_rejects_non_string_map_keys() {
        use std::collections::HashMap;

        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid JSON object keys");
        let err = encode(&bad).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_payload_type_mismatch() {
        let msg = Message::new("a/b", Visibility::Public, serde_json::json!({"type": "nope"}));
        let err = msg.payload::<PipelineEvent>().unwrap_err();
        assert!(matches!(err, Error::Decoding(_)));
    }

    #[test]
    fn test_build_extraction() {
        let events = vec![
            PipelineEvent::BuildCreated {
                build: 9,
                commit: "c".to_string(),
            },
            PipelineEvent::BuildUpdated {
                build: 9,
                status: BuildStatus::Pending,
            },
            PipelineEvent::StageUpdated {
                build: 9,
                stage: 1,
                status: BuildStatus::Failure,
            },
            PipelineEvent::BuildFinished {
                build: 9,
                status: BuildStatus::Failure,
                finished_at: Utc::now(),
            },
        ];

        for event in events {
            assert_eq!(event.build(), 9);
        }
        assert!(BuildStatus::Killed.is_done());
        assert!(!BuildStatus::Running.is_done());
    }
}
