use bytes::Bytes;

/// An uploaded image, held in memory for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Bytes,
}

impl Attachment {
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), content_type: content_type.into(), content: content.into() }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        is_image_type(&self.content_type)
    }
}

/// Accepts any `image/*` media type, ignoring case and parameters.
#[must_use]
pub fn is_image_type(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("image/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_types() {
        assert!(is_image_type("image/png"));
        assert!(is_image_type("IMAGE/JPEG"));
        assert!(!is_image_type("application/pdf"));
        assert!(!is_image_type("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_attachment_size() {
        let att = Attachment::new("a.png", "image/png", vec![0u8; 12]);
        assert_eq!(att.size(), 12);
        assert!(att.is_image());
    }
}
