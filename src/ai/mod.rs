//! Text-generation integration: the OpenRouter client, prompt assembly and
//! the story evaluator built on top of it

pub mod client;
pub mod evaluator;
pub mod prompt;

pub use client::{OpenRouterClient, OpenRouterConfig, DEFAULT_SITE_NAME, OPENROUTER_API_URL};
pub use evaluator::{build_evaluation_prompt, evaluate_story};
pub use prompt::{clean_response_text, format_prompt};
