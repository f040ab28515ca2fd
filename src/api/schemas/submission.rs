use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    pub message: String,
}

impl SendEmailResponse {
    #[must_use]
    pub fn sent() -> Self {
        Self { success: true, message: "Email sent successfully!".to_string() }
    }
}
