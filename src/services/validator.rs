use crate::config::FormConfig;
use crate::domain::attachment::{Attachment, is_image_type};
use crate::domain::submission::{SubmissionRequest, is_blank};
use crate::error::{AppError, Result};
use serde_json::Value;

/// Limits applied to uploaded images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_count: usize,
    pub max_bytes: usize,
}

impl AttachmentPolicy {
    /// # Errors
    /// Returns `AppError::TooManyAttachments` once `count` exceeds the cap.
    pub fn check_count(&self, count: usize) -> Result<()> {
        if count > self.max_count {
            return Err(AppError::TooManyAttachments { max: self.max_count });
        }
        Ok(())
    }

    /// # Errors
    /// Returns `AppError::InvalidAttachmentType` for anything that is not `image/*`.
    pub fn check_type(&self, content_type: &str) -> Result<()> {
        if !is_image_type(content_type) {
            return Err(AppError::InvalidAttachmentType(content_type.to_string()));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `AppError::AttachmentTooLarge` when `size` exceeds the per-file cap.
    pub fn check_size(&self, filename: &str, size: usize) -> Result<()> {
        if size > self.max_bytes {
            return Err(AppError::AttachmentTooLarge { filename: filename.to_string(), max_bytes: self.max_bytes });
        }
        Ok(())
    }

    /// Checks a complete set of attachments.
    ///
    /// # Errors
    /// Returns the first policy violation found.
    pub fn check(&self, attachments: &[Attachment]) -> Result<()> {
        self.check_count(attachments.len())?;
        for attachment in attachments {
            self.check_type(&attachment.content_type)?;
            self.check_size(&attachment.filename, attachment.size())?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SubmissionValidator {
    required_fields: Vec<String>,
    location_field: String,
    policy: AttachmentPolicy,
}

impl SubmissionValidator {
    #[must_use]
    pub fn new(required_fields: Vec<String>, location_field: String, policy: AttachmentPolicy) -> Self {
        let required_fields =
            required_fields.into_iter().map(|f| f.trim().to_string()).filter(|f| !f.is_empty()).collect();
        Self { required_fields, location_field, policy }
    }

    #[must_use]
    pub fn from_config(form: &FormConfig) -> Self {
        Self::new(
            form.required_fields.clone(),
            form.location_field.clone(),
            AttachmentPolicy { max_count: form.max_images, max_bytes: form.max_image_bytes },
        )
    }

    #[must_use]
    pub const fn policy(&self) -> AttachmentPolicy {
        self.policy
    }

    /// Required fields that are absent or blank, in configured order.
    #[must_use]
    pub fn missing_fields(&self, request: &SubmissionRequest) -> Vec<String> {
        self.required_fields.iter().filter(|field| !self.is_present(request, field)).cloned().collect()
    }

    /// # Errors
    /// Returns `AppError::MissingFields` naming every missing field, or the first attachment
    /// policy violation.
    pub fn validate(&self, request: &SubmissionRequest) -> Result<()> {
        let missing = self.missing_fields(request);
        if !missing.is_empty() {
            return Err(AppError::MissingFields(missing));
        }
        self.policy.check(&request.attachments)
    }

    fn is_present(&self, request: &SubmissionRequest, field: &str) -> bool {
        if field == self.location_field {
            return match &request.location {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !is_blank(s),
                Some(_) => true,
            };
        }
        request.field(field).is_some_and(|v| !is_blank(v))
    }
}
