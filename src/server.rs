use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{
    config::{RecontextConfig, DEFAULT_PORT},
    error::RecontextError,
    models::{
        parse_seed, GenerationOutcome, GenerationRequest, PersonGeneration, Stage, SubjectImage,
        DEFAULT_BASE_STEPS, DEFAULT_SAMPLE_COUNT,
    },
    vertex::{RecontextClient, Submission},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecontextBody {
    #[serde(default)]
    pub subject_images: Vec<String>,
    #[serde(default)]
    pub subject_description: String,
    #[serde(default)]
    pub prompt: String,
    pub sample_count: Option<u8>,
    pub base_steps: Option<u8>,
    pub enhance_prompt: Option<bool>,
    pub person_generation: Option<PersonGeneration>,
    /// Free text, same rules as the CLI seed.
    pub seed: Option<String>,
}

impl RecontextBody {
    fn into_request(self) -> Result<GenerationRequest, String> {
        let mut images = Vec::with_capacity(self.subject_images.len());
        for (i, encoded) in self.subject_images.iter().enumerate() {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| format!("subjectImages[{}] is not valid base64: {}", i, e))?;
            images.push(SubjectImage::new(bytes));
        }

        Ok(GenerationRequest::new(self.subject_description, self.prompt)
            .with_images(images)
            .with_sample_count(self.sample_count.unwrap_or(DEFAULT_SAMPLE_COUNT))
            .with_base_steps(self.base_steps.unwrap_or(DEFAULT_BASE_STEPS))
            .with_enhance_prompt(self.enhance_prompt.unwrap_or(true))
            .with_person_generation(self.person_generation.unwrap_or_default())
            .with_seed(self.seed.as_deref().and_then(parse_seed)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBody {
    pub bytes_base64_encoded: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionBody {
    pub submission_id: Option<String>,
    pub state: Stage,
    pub images: Vec<ImageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Submission> for SubmissionBody {
    fn from(submission: &Submission) -> Self {
        let images = submission
            .images()
            .iter()
            .map(|image| ImageBody {
                bytes_base64_encoded: BASE64.encode(&image.bytes),
                mime_type: image.mime_type.clone(),
            })
            .collect();
        let warning = match &submission.outcome {
            Ok(GenerationOutcome::Empty { .. }) => Some(submission.user_message()),
            _ => None,
        };

        SubmissionBody {
            submission_id: Some(submission.id.to_string()),
            state: submission.state,
            images,
            warning,
            error: submission.error().map(|_| submission.user_message()),
        }
    }
}

fn status_for(submission: &Submission) -> actix_web::http::StatusCode {
    use actix_web::http::StatusCode;
    match submission.error() {
        None => StatusCode::OK,
        Some(RecontextError::Validation(_)) => StatusCode::BAD_REQUEST,
        Some(RecontextError::Http { .. }) | Some(RecontextError::Request(_)) => {
            StatusCode::BAD_GATEWAY
        }
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[post("/v1/recontext")]
async fn recontext(
    client: web::Data<RecontextClient>,
    body: web::Json<RecontextBody>,
) -> HttpResponse {
    let request = match body.into_inner().into_request() {
        Ok(request) => request,
        Err(message) => {
            return HttpResponse::BadRequest().json(SubmissionBody {
                submission_id: None,
                state: Stage::Failed,
                images: Vec::new(),
                warning: None,
                error: Some(message),
            })
        }
    };

    let submission = client.submit(request).await;
    HttpResponse::build(status_for(&submission)).json(SubmissionBody::from(&submission))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(recontext);
}

pub async fn run(config: RecontextConfig) -> std::io::Result<()> {
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let client = RecontextClient::with_default_credentials(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let data = web::Data::new(client);

    log::info!("🌐 Listening on http://0.0.0.0:{}", port);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
