//! Structured response envelope

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key under which the HTTP status code is merged into the envelope
pub const STATUS_CODE_KEY: &str = "statusCode";

/// Backend JSON object body with the HTTP status code merged in
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResponseEnvelope {
    fields: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Merge `status` into a parsed body
    ///
    /// A `statusCode` key sent by the backend is overwritten by the real
    /// HTTP status.
    #[must_use]
    pub fn new(mut fields: Map<String, Value>, status: u16) -> Self {
        fields.insert(STATUS_CODE_KEY.to_string(), Value::from(status));
        Self { fields }
    }

    /// HTTP status code of the response
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.fields
            .get(STATUS_CODE_KEY)
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or_default()
    }

    /// Look up one field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields, including `statusCode`
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Take ownership of the fields
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Deserialize the envelope into a typed payload
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

impl From<ResponseEnvelope> for Value {
    fn from(envelope: ResponseEnvelope) -> Self {
        Value::Object(envelope.fields)
    }
}
