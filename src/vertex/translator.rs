use crate::{
    config::Endpoint,
    error::{RecontextError, Result, ValidationError},
    models::{
        EncodedImage, GeneratedImage, GenerationOutcome, GenerationRequest, GenerationResult,
        ProductImage, ProviderPayload, RecontextInstance, RecontextParameters, MAX_SUBJECT_IMAGES,
    },
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;

/// What to do when more than three subject images are supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageLimitPolicy {
    /// Keep the first three, drop the rest.
    #[default]
    Truncate,
    Reject,
}

/// What to do with predictions that carry no image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionPolicy {
    #[default]
    SkipMissing,
    RejectMissing,
}

/// Turns user input into the predict payload and the predict response into images.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    image_limit: ImageLimitPolicy,
    predictions: PredictionPolicy,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_limit(mut self, policy: ImageLimitPolicy) -> Self {
        self.image_limit = policy;
        self
    }

    pub fn with_prediction_policy(mut self, policy: PredictionPolicy) -> Self {
        self.predictions = policy;
        self
    }

    pub fn image_limit(&self) -> ImageLimitPolicy {
        self.image_limit
    }

    pub fn prediction_policy(&self) -> PredictionPolicy {
        self.predictions
    }

    pub fn validate(
        &self,
        endpoint: &Endpoint,
        mut request: GenerationRequest,
    ) -> std::result::Result<GenerationRequest, ValidationError> {
        if is_blank(&endpoint.project_id) {
            return Err(ValidationError::MissingField("project_id"));
        }
        if is_blank(&endpoint.region) {
            return Err(ValidationError::MissingField("region"));
        }
        if request.subject_images.is_empty() {
            return Err(ValidationError::MissingField("subject_images"));
        }
        if is_blank(&request.subject_description) {
            return Err(ValidationError::MissingField("subject_description"));
        }
        if is_blank(&request.prompt) {
            return Err(ValidationError::MissingField("prompt"));
        }

        check_range("sample_count", request.sample_count, 1, 4)?;
        check_range("base_steps", request.base_steps, 10, 100)?;

        let supplied = request.subject_images.len();
        if supplied > MAX_SUBJECT_IMAGES {
            match self.image_limit {
                ImageLimitPolicy::Truncate => {
                    log::warn!(
                        "⚠️  {} subject images supplied, keeping the first {}",
                        supplied,
                        MAX_SUBJECT_IMAGES
                    );
                    request.subject_images.truncate(MAX_SUBJECT_IMAGES);
                }
                ImageLimitPolicy::Reject => {
                    return Err(ValidationError::TooManyImages {
                        max: MAX_SUBJECT_IMAGES,
                        supplied,
                    });
                }
            }
        }

        Ok(request)
    }

    pub fn encode(&self, request: &GenerationRequest) -> ProviderPayload {
        let product_images = request
            .subject_images
            .iter()
            .map(|image| ProductImage {
                image: EncodedImage {
                    bytes_base64_encoded: BASE64.encode(&image.bytes),
                },
            })
            .collect();

        ProviderPayload {
            instances: vec![RecontextInstance {
                prompt: request.prompt.clone(),
                product_images,
                product_description: request.subject_description.clone(),
            }],
            parameters: RecontextParameters {
                sample_count: request.sample_count,
                base_steps: request.base_steps,
                enhance_prompt: request.enhance_prompt,
                person_generation: request.person_generation,
                seed: request.seed,
            },
        }
    }

    pub fn decode(&self, body: &str) -> Result<GenerationOutcome> {
        let response: Value = serde_json::from_str(body)
            .map_err(|e| RecontextError::Decode(format!("response is not valid JSON: {}", e)))?;

        let predictions = match response.get("predictions") {
            None | Some(Value::Null) => return Ok(GenerationOutcome::Empty { raw_response: response }),
            Some(Value::Array(rows)) if rows.is_empty() => {
                return Ok(GenerationOutcome::Empty { raw_response: response })
            }
            Some(Value::Array(rows)) => rows,
            Some(other) => {
                return Err(RecontextError::Decode(format!(
                    "predictions must be an array, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut result = GenerationResult::default();
        for (index, prediction) in predictions.iter().enumerate() {
            let Some(encoded) = prediction
                .get("bytesBase64Encoded")
                .and_then(Value::as_str)
                .filter(|encoded| !encoded.is_empty())
            else {
                match self.predictions {
                    PredictionPolicy::SkipMissing => {
                        log::debug!("Prediction {} has no image, skipping", index);
                        result.skipped += 1;
                        continue;
                    }
                    PredictionPolicy::RejectMissing => {
                        return Err(RecontextError::Decode(format!(
                            "prediction {} has no bytesBase64Encoded field",
                            index
                        )));
                    }
                }
            };

            let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                RecontextError::Decode(format!("prediction {} base64 decode failed: {}", index, e))
            })?;
            let mime_type = prediction
                .get("mimeType")
                .and_then(Value::as_str)
                .map(str::to_string);
            result.images.push(GeneratedImage { bytes, mime_type });
        }

        Ok(GenerationOutcome::Images(result))
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn check_range(
    field: &'static str,
    value: u8,
    min: u8,
    max: u8,
) -> std::result::Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: min.into(),
            max: max.into(),
            value: value.into(),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
