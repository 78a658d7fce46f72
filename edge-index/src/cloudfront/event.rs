use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RewriteError;
use crate::rewrite::normalizer::RequestPath;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudFrontEvent {
    #[serde(rename = "Records")]
    pub records: Vec<CloudFrontRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudFrontRecord {
    pub cf: CloudFrontPayload,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `config` and anything else next to `request` stay raw JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudFrontPayload {
    pub request: CloudFrontRequest,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CloudFrontPayload {
    /// `config.eventType`, e.g. `origin-request`.
    pub fn event_type(&self) -> Option<&str> {
        self.extra.get("config")?.get("eventType")?.as_str()
    }
}

/// The request CloudFront hands to the function and expects back.
///
/// Only `uri` is ever interpreted, and only when the rewrite runs. Every field, `uri` included,
/// is held as raw JSON and serialized back verbatim, so a malformed field never fails the event.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CloudFrontRequest {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CloudFrontRequest {
    pub fn uri(&self) -> Option<&Value> {
        self.fields.get("uri")
    }

    pub fn method(&self) -> Option<&str> {
        self.fields.get("method")?.as_str()
    }

    pub fn client_ip(&self) -> Option<&str> {
        self.fields.get("clientIp")?.as_str()
    }

    /// First value of a (lowercase) header, if it is shaped the way CloudFront sends it.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.fields
            .get("headers")?
            .get(name)?
            .as_array()?
            .first()?
            .get("value")?
            .as_str()
    }
}

impl RequestPath for CloudFrontRequest {
    fn path(&self) -> Result<&str, RewriteError> {
        match self.uri() {
            None | Some(Value::Null) => Err(RewriteError::MissingPath),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(RewriteError::NotAString(json_kind(other))),
        }
    }

    fn set_path(&mut self, path: String) -> Result<(), RewriteError> {
        self.fields.insert("uri".to_string(), Value::String(path));
        Ok(())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
