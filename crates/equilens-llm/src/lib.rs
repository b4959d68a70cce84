//! Text-generation boundary for equilens
//!
//! This crate isolates the analysis pipeline from any concrete language
//! model service. It includes:
//!
//! - Single-turn generation request/response types
//! - The `TextGenerator` trait the pipeline programs against
//! - Concrete provider implementations (behind feature flags)

pub mod completion;
pub mod error;
pub mod provider;

// Re-export main types
pub use completion::{GenerationRequest, GenerationResponse, StopReason, TokenUsage};
pub use error::{GenerationError, Result};
pub use provider::TextGenerator;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
