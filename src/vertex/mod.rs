pub mod auth;
pub mod translator;
pub mod transport;

use crate::{
    config::{Endpoint, RecontextConfig},
    error::{RecontextError, Result, ValidationError},
    logger::Timer,
    models::{GenerationOutcome, GenerationRequest, ModelInfo, Stage, MAX_SUBJECT_IMAGES},
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use auth::{
    DefaultCredentialChain, EnvTokenProvider, GcloudTokenProvider, MetadataServerTokenProvider,
    StaticTokenProvider, TokenProvider,
};
pub use translator::{ImageLimitPolicy, PredictionPolicy, Translator};
pub use transport::Transport;

/// Runs submissions against the predict endpoint. Cheap to clone; holds no
/// per-submission state.
#[derive(Clone)]
pub struct RecontextClient {
    endpoint: Endpoint,
    translator: Translator,
    transport: Transport,
    credentials: Arc<dyn TokenProvider>,
}

impl RecontextClient {
    pub fn new(config: RecontextConfig, credentials: Arc<dyn TokenProvider>) -> Result<Self> {
        config.check()?;
        let transport = Transport::new(config.timeout, config.max_retries)?;
        Ok(Self {
            endpoint: config.endpoint(),
            translator: Translator::default(),
            transport,
            credentials,
        })
    }

    /// Client using the default credential chain (env token, metadata server, gcloud).
    pub fn with_default_credentials(config: RecontextConfig) -> Result<Self> {
        Self::new(config, Arc::new(DefaultCredentialChain::default()))
    }

    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn supported_models() -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: crate::config::DEFAULT_MODEL_ID.to_string(),
            name: "Imagen Product Recontext (preview)".to_string(),
            max_subject_images: MAX_SUBJECT_IMAGES,
            max_samples: 4,
            description: "Places a subject from 1-3 reference images into a newly generated scene"
                .to_string(),
        }]
    }

    /// Runs one submission and propagates the first failure.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutcome> {
        let mut stage = Stage::Idle;
        self.run(Uuid::new_v4(), request, &mut stage).await
    }

    /// Runs one submission and never fails; errors are kept in the returned record.
    pub async fn submit(&self, request: GenerationRequest) -> Submission {
        let id = Uuid::new_v4();
        let timer = Timer::new(&format!("submission {}", id));
        let mut stage = Stage::Idle;

        let outcome = self.run(id, request, &mut stage).await;
        let failed_at = match &outcome {
            Ok(_) => None,
            Err(e) => {
                log::error!("❌ Submission {} failed while {}: {}", id, stage, e);
                Some(stage)
            }
        };

        Submission {
            id,
            state: if outcome.is_ok() {
                Stage::Done
            } else {
                Stage::Failed
            },
            failed_at,
            elapsed: timer.elapsed(),
            outcome,
        }
    }

    async fn run(
        &self,
        id: Uuid,
        request: GenerationRequest,
        stage: &mut Stage,
    ) -> Result<GenerationOutcome> {
        enter(id, stage, Stage::Validating);
        let request = self.translator.validate(&self.endpoint, request)?;

        enter(id, stage, Stage::Encoding);
        let payload = self.translator.encode(&request);
        log::debug!(
            "Payload for {}: {} image(s), sampleCount={}, baseSteps={}, seed={:?}",
            id,
            payload.image_count(),
            payload.parameters.sample_count,
            payload.parameters.base_steps,
            payload.parameters.seed
        );

        enter(id, stage, Stage::Authenticating);
        let token = self.credentials.access_token().await?;

        enter(id, stage, Stage::Sending);
        let url = self.endpoint.predict_url();
        log::info!("Calling model {} in {}", self.endpoint.model_id, self.endpoint.region);
        let body = self.transport.send(&url, &payload, &token).await?;

        enter(id, stage, Stage::Decoding);
        let outcome = self.translator.decode(&body)?;
        match &outcome {
            GenerationOutcome::Images(result) => log::info!(
                "✅ Submission {} produced {} image(s), {} skipped",
                id,
                result.len(),
                result.skipped
            ),
            GenerationOutcome::Empty { .. } => {
                log::warn!("⚠️  Submission {} returned no predictions", id)
            }
        }

        *stage = Stage::Done;
        Ok(outcome)
    }
}

fn enter(id: Uuid, stage: &mut Stage, next: Stage) {
    log::debug!("Submission {}: {} -> {}", id, stage, next);
    *stage = next;
}

/// Record of one submission as seen at the submission boundary.
#[derive(Debug)]
pub struct Submission {
    pub id: Uuid,
    pub state: Stage,
    pub failed_at: Option<Stage>,
    pub elapsed: Duration,
    pub outcome: Result<GenerationOutcome>,
}

impl Submission {
    pub fn is_done(&self) -> bool {
        self.state == Stage::Done
    }

    pub fn images(&self) -> &[crate::models::GeneratedImage] {
        match &self.outcome {
            Ok(outcome) => outcome.images(),
            Err(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&RecontextError> {
        self.outcome.as_ref().err()
    }

    /// Message suitable for showing to whoever submitted the form.
    pub fn user_message(&self) -> String {
        match &self.outcome {
            Ok(GenerationOutcome::Images(result)) if result.is_empty() => {
                "Generation complete, but none of the predictions contained an image.".to_string()
            }
            Ok(GenerationOutcome::Images(result)) => {
                format!("Generation complete: {} image(s).", result.len())
            }
            Ok(GenerationOutcome::Empty { raw_response }) => format!(
                "API returned a success status but no predictions were found. This can happen with very restrictive prompts.\n{}",
                serde_json::to_string_pretty(raw_response).unwrap_or_default()
            ),
            Err(RecontextError::Validation(ValidationError::MissingField(field))) => format!(
                "Please fill in all fields: Project ID, Region, Subject Description, Prompt, and upload at least one image. (missing {})",
                field
            ),
            Err(RecontextError::Validation(e)) => format!("Invalid input: {}", e),
            Err(RecontextError::Http {
                status,
                reason,
                body,
            }) => format!("HTTP Error: {} {}\nResponse Content: {}", status, reason, body),
            Err(RecontextError::Auth(e)) => format!(
                "Could not obtain Google Cloud credentials: {}",
                e
            ),
            Err(e) => format!("An unexpected error occurred: {}", e),
        }
    }
}
