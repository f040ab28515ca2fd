use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

/// Characters escaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLocation {
    pub display: String,
    pub map_url: Option<String>,
}

/// Turns whatever the client sent as a location into display text and an optional map link.
///
/// Never fails: anything that cannot be interpreted as coordinates is shown verbatim.
#[derive(Debug, Clone)]
pub struct LocationNormalizer {
    search_url: String,
}

impl LocationNormalizer {
    #[must_use]
    pub fn new(search_url: impl Into<String>) -> Self {
        Self { search_url: search_url.into() }
    }

    #[must_use]
    pub fn normalize(&self, value: &Value) -> NormalizedLocation {
        match value {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::String(inner)) => self.text_location(inner),
                Ok(parsed) => self.structured_location(&parsed),
                Err(_) => self.text_location(raw.clone()),
            },
            structured => self.structured_location(structured),
        }
    }

    fn structured_location(&self, value: &Value) -> NormalizedLocation {
        match value {
            Value::Object(obj) => {
                if let (Some(lat), Some(lng)) = (coordinate(obj, "lat"), coordinate(obj, "lng")) {
                    let map_url = Some(format!("{}?api=1&query={lat},{lng}", self.search_url));
                    return NormalizedLocation { display: format!("{lat}, {lng}"), map_url };
                }
                NormalizedLocation { display: value.to_string(), map_url: None }
            }
            Value::Array(_) => NormalizedLocation { display: value.to_string(), map_url: None },
            Value::String(s) => self.text_location(s.clone()),
            scalar => self.text_location(scalar.to_string()),
        }
    }

    fn text_location(&self, display: String) -> NormalizedLocation {
        let encoded = utf8_percent_encode(&display, URI_COMPONENT);
        let map_url = Some(format!("{}?api=1&query={encoded}", self.search_url));
        NormalizedLocation { display, map_url }
    }
}

/// Extracts a coordinate as text, accepting JSON numbers and numeric strings.
fn coordinate(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        // Shortest round-trip decimal, as JavaScript prints it, except that magnitudes below
        // 1e-6 stay in plain decimal instead of exponent form.
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|_| trimmed.to_string())
        }
        _ => None,
    }
}
