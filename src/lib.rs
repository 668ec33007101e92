//! Client for Vertex AI's product recontextualisation model.
//!
//! A [`GenerationRequest`] describes the subject to keep and the scene to
//! generate around it. [`RecontextClient`] validates it, builds the predict
//! payload, authenticates through an injected [`TokenProvider`] and decodes
//! the returned predictions into images.

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
#[cfg(feature = "server")]
pub mod server;
pub mod vertex;

pub use config::{Endpoint, RecontextConfig};
pub use error::{RecontextError, Result, ValidationError};
pub use models::*;
pub use vertex::{
    DefaultCredentialChain, EnvTokenProvider, GcloudTokenProvider, ImageLimitPolicy,
    MetadataServerTokenProvider, PredictionPolicy, RecontextClient, StaticTokenProvider,
    Submission, TokenProvider, Translator,
};
