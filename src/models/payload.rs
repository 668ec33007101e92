use serde::{Deserialize, Serialize};

use super::request::PersonGeneration;

// Field names below are the remote API's contract; do not rename.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPayload {
    pub instances: Vec<RecontextInstance>,
    pub parameters: RecontextParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecontextInstance {
    pub prompt: String,
    pub product_images: Vec<ProductImage>,
    pub product_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub image: EncodedImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedImage {
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecontextParameters {
    pub sample_count: u8,
    pub base_steps: u8,
    pub enhance_prompt: bool,
    pub person_generation: PersonGeneration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ProviderPayload {
    pub fn image_count(&self) -> usize {
        self.instances
            .first()
            .map_or(0, |instance| instance.product_images.len())
    }
}
