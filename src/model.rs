use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A content payload, kept as a string-keyed map so unknown fields survive
/// an unmarshal/marshal round-trip unchanged. Only `uuid`, `type`,
/// `identifiers` and `lastModified` are ever read by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(pub Map<String, Value>);

impl Content {
    pub fn uuid(&self) -> &str {
        self.0.get("uuid").and_then(Value::as_str).unwrap_or("")
    }

    pub fn content_type(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or("")
    }

    pub fn last_modified(&self) -> &str {
        self.0
            .get("lastModified")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn identifiers(&self) -> Vec<Identifier> {
        self.0
            .get("identifiers")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub authority: String,
    #[serde(rename = "identifierValue")]
    pub identifier_value: String,
}

/// Inbound content-topic event. `payload` is `None` for every shape the
/// upstream uses to signal a delete: a missing field, a JSON `null`, or an
/// empty `{}` object all normalize to `None` here (see spec's delete
/// ambiguity note).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEvent {
    pub content_uri: String,
    pub payload: Option<Content>,
    pub last_modified: String,
}

impl<'de> Deserialize<'de> for ContentEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "contentUri", default)]
            content_uri: String,
            #[serde(default)]
            payload: Option<Content>,
            #[serde(rename = "lastModified", default)]
            last_modified: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        let payload = raw.payload.filter(|c| !c.is_empty());

        Ok(ContentEvent {
            content_uri: raw.content_uri,
            payload,
            last_modified: raw.last_modified,
        })
    }
}

/// Inbound metadata-topic event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotationsEvent {
    #[serde(rename = "contentUri", default)]
    pub content_uri: String,
    pub payload: AnnotationsPayload,
    #[serde(rename = "lastModified", default)]
    pub last_modified: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotationsPayload {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// The concept a piece of content is annotated with. Opaque beyond
/// round-tripping through JSON — modeled as a string-keyed map like
/// `Content` for the same reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thing(pub Map<String, Value>);

/// A single concept annotation, wrapping the annotated `Thing`. The
/// annotations service returns bare `Thing`s; this one-field envelope is
/// added back on the way into `Combined.metadata`, which the downstream
/// consumer expects as `{"thing": {...}}`, never the bare `Thing` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub thing: Thing,
}

/// `true`/`false` encoded as a JSON string, not a JSON boolean — required
/// by the downstream consumer's wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkedDeleted {
    True,
    False,
}

impl Serialize for MarkedDeleted {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(match self {
            MarkedDeleted::True => "true",
            MarkedDeleted::False => "false",
        })
    }
}

impl<'de> Deserialize<'de> for MarkedDeleted {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "true" => Ok(MarkedDeleted::True),
            "false" => Ok(MarkedDeleted::False),
            other => Err(D::Error::custom(format!(
                "invalid markedDeleted value: {other}"
            ))),
        }
    }
}

/// The joined record emitted downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combined {
    pub uuid: String,
    pub content: Option<Content>,
    pub metadata: Option<Vec<Annotation>>,
    #[serde(rename = "contentUri")]
    pub content_uri: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    #[serde(rename = "markedDeleted")]
    pub marked_deleted: MarkedDeleted,
}

/// End-to-end correlation token, carried as the `X-Request-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Synthesizes a fresh id of the form `tid_<10-char-random>_post_publication_combiner`.
    pub fn synthesize() -> Self {
        Self(format!(
            "tid_{}_post_publication_combiner",
            random_token(10)
        ))
    }

    /// Synthesizes a fresh id for the forced-publish path, preserving the
    /// original service's exact (underscore-less) literal prefix.
    pub fn synthesize_forced() -> Self {
        Self(format!(
            "tid_force_publish{}_post_publication_combiner",
            random_token(10)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
