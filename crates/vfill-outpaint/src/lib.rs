//! Client for the hosted outpainting service (Stable Diffusion on Replicate).
//!
//! The pipeline only sees the [`OutpaintBackend`] trait: one call takes a
//! seeded 9:16 canvas and returns a generated image. Retrying, quota handling
//! and the local fallback live in the worker, not here.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod prompt;
pub mod types;

pub use backend::{OutpaintBackend, OutpaintRequest};
pub use client::ReplicateClient;
pub use config::OutpaintConfig;
pub use error::{FailureKind, OutpaintError, OutpaintResult};
pub use prompt::{band_prompt, derive_prompt};
pub use types::{Prediction, PredictionInput, PredictionRequest, PredictionStatus};
