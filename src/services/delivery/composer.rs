use crate::config::FormConfig;
use crate::domain::location::NormalizedLocation;
use crate::domain::message::{DeliveryMessage, Envelope, MessageField};
use crate::domain::submission::SubmissionRequest;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Renders a validated submission into subject, text and HTML bodies.
#[derive(Clone, Debug)]
pub struct MessageComposer {
    subject: String,
    heading: String,
    field_order: Vec<String>,
    location_field: String,
    labels: HashMap<String, String>,
}

impl MessageComposer {
    #[must_use]
    pub fn from_config(form: &FormConfig) -> Self {
        Self {
            subject: form.subject.clone(),
            heading: form.heading.clone(),
            field_order: form
                .required_fields
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            location_field: form.location_field.clone(),
            labels: form.field_labels.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn label_for(&self, key: &str) -> String {
        self.labels.get(key).cloned().unwrap_or_else(|| humanize(key))
    }

    /// Builds the message. Fields follow the configured order; any extra fields follow
    /// alphabetically, and the location is placed where its key appears (or last).
    #[must_use]
    pub fn compose(
        &self,
        envelope: Envelope,
        request: SubmissionRequest,
        location: Option<&NormalizedLocation>,
    ) -> DeliveryMessage {
        let SubmissionRequest { mut fields, attachments, .. } = request;

        let mut ordered = Vec::with_capacity(fields.len() + 1);
        let mut location_placed = false;
        for key in &self.field_order {
            if *key == self.location_field {
                if let Some(loc) = location {
                    ordered.push(self.field(key, loc.display.clone()));
                }
                location_placed = true;
            } else if let Some(value) = fields.remove(key) {
                ordered.push(self.field(key, value));
            }
        }
        for (key, value) in fields {
            ordered.push(self.field(&key, value));
        }
        if !location_placed && let Some(loc) = location {
            ordered.push(self.field(&self.location_field, loc.display.clone()));
        }

        let map_url = location.and_then(|l| l.map_url.clone());
        let text_body = self.render_text(&ordered, map_url.as_deref(), attachments.len());
        let html_body = self.render_html(&ordered, map_url.as_deref(), attachments.len());

        DeliveryMessage {
            envelope,
            subject: self.subject.clone(),
            text_body,
            html_body,
            fields: ordered,
            map_url,
            attachments,
        }
    }

    fn field(&self, key: &str, value: String) -> MessageField {
        MessageField { key: key.to_string(), label: self.label_for(key), value }
    }

    fn render_text(&self, fields: &[MessageField], map_url: Option<&str>, attachments: usize) -> String {
        let mut out = format!("{}\n\n", self.heading);
        for field in fields {
            let _ = writeln!(out, "{}: {}", field.label, field.value);
            if field.key == self.location_field
                && let Some(url) = map_url
            {
                let _ = writeln!(out, "Map: {url}");
            }
        }
        if attachments > 0 {
            let _ = write!(out, "\n{attachments} image(s) attached.\n");
        }
        out
    }

    fn render_html(&self, fields: &[MessageField], map_url: Option<&str>, attachments: usize) -> String {
        let mut out = format!("<h2>{}</h2>\n<ul>\n", escape_html(&self.heading));
        for field in fields {
            let _ = writeln!(out, "  <li><b>{}:</b> {}</li>", escape_html(&field.label), escape_html(&field.value));
            if field.key == self.location_field
                && let Some(url) = map_url
            {
                let _ = writeln!(
                    out,
                    "  <li><b>Map:</b> <a href=\"{}\" target=\"_blank\">View on map</a></li>",
                    escape_html(url)
                );
            }
        }
        out.push_str("</ul>\n");
        if attachments > 0 {
            let _ = writeln!(out, "<p>{attachments} image(s) attached.</p>");
        }
        out
    }
}

/// `contactNumber` -> `Contact Number`, `waste_type` -> `Waste Type`.
#[must_use]
pub fn humanize(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
