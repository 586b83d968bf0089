//! Generator for jewelry "model wearing product" imagery
//!
//! Refines four raw product photos through a multimodal generation API, then
//! composes a model shot from the refined views, a pose reference and an
//! optional scene, substituting models when the provider is out of capacity.

pub mod ai;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod prompts;

pub use error::{Error, ErrorResponse, Result};
pub use orchestrator::Orchestrator;
