//! Sequential prompt queue processing

pub mod runner;

pub use runner::{PromptPipeline, PromptQueueRunner};
