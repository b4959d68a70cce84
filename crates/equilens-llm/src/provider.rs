//! Text-generator trait definition

use crate::{GenerationRequest, GenerationResponse, Result};
use async_trait::async_trait;

/// Trait for text-generation providers
///
/// Implementations of this trait turn a structured prompt into narrative
/// text. The pipeline treats them as opaque: a call either yields text,
/// yields a blank (declined) response, or fails.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the given request
    ///
    /// # Arguments
    ///
    /// * `request` - The generation request with prompts and sampling parameters
    ///
    /// # Returns
    ///
    /// The generated text plus stop reason and token usage
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;

    /// Get the provider name (e.g., "openai")
    fn name(&self) -> &str;
}
