#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl GeneratedImage {
    /// File extension matching the reported mime type, png when unknown.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_deref() {
            Some("image/jpeg") | Some("image/jpg") => "jpg",
            Some("image/webp") => "webp",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub images: Vec<GeneratedImage>,
    /// Predictions that carried no image and were skipped.
    pub skipped: usize,
}

impl GenerationResult {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// What a successful exchange produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Images(GenerationResult),
    /// Success status but no predictions; the raw response is kept for display.
    Empty { raw_response: serde_json::Value },
}

impl GenerationOutcome {
    pub fn images(&self) -> &[GeneratedImage] {
        match self {
            GenerationOutcome::Images(result) => &result.images,
            GenerationOutcome::Empty { .. } => &[],
        }
    }

    pub fn is_empty_warning(&self) -> bool {
        matches!(self, GenerationOutcome::Empty { .. })
    }
}
