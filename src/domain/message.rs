use crate::domain::attachment::Attachment;

/// Sender and recipient for an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
}

/// One labelled line of the rendered submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageField {
    pub key: String,
    pub label: String,
    pub value: String,
}

/// A fully rendered email, ready to hand to any mail backend.
#[derive(Debug, Clone)]
pub struct DeliveryMessage {
    pub envelope: Envelope,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub fields: Vec<MessageField>,
    pub map_url: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl DeliveryMessage {
    #[must_use]
    pub fn attachment_names(&self) -> Vec<&str> {
        self.attachments.iter().map(|a| a.filename.as_str()).collect()
    }
}
