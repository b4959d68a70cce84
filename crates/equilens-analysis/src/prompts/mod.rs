//! Prompt templates for the analysis stages
//!
//! Templates are organized into:
//! - `system`: the role each stage's generation call assumes
//! - `user`: builders for the structured per-stage context

mod system;
mod user;

pub use system::system_prompt;
pub use user::{
    depth_guidance, directive_retry_prompt, financial_metrics_prompt, industry_comparison_prompt,
    integration_prompt, valuation_prompt,
};
