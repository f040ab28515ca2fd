use crate::domain::attachment::Attachment;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single form submission as received over HTTP.
///
/// Text fields are kept as strings. The location field is kept as raw JSON because clients
/// send it either as plain text, as a JSON-encoded string, or as a structured object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionRequest {
    pub fields: BTreeMap<String, String>,
    pub location: Option<Value>,
    pub attachments: Vec<Attachment>,
}

impl SubmissionRequest {
    /// Builds a request from a JSON object body.
    ///
    /// Scalars are coerced to text, `null` counts as absent and nested values are kept as
    /// compact JSON. The location field keeps its original shape.
    #[must_use]
    pub fn from_json(body: Map<String, Value>, location_field: &str) -> Self {
        let mut request = Self::default();
        for (key, value) in body {
            if value.is_null() {
                continue;
            }
            if key == location_field {
                request.location = Some(value);
                continue;
            }
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            request.fields.insert(key, text);
        }
        request
    }

    /// Records a text field, routing the location field to its own slot.
    pub fn insert_text(&mut self, key: String, value: String, location_field: &str) {
        if key == location_field {
            self.location = Some(Value::String(value));
        } else {
            self.fields.insert(key, value);
        }
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// True when a submitted value should be treated as if it were never sent.
///
/// Browsers serialize an unset JavaScript value into `FormData` as the literal `undefined`.
#[must_use]
pub fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "undefined"
}
