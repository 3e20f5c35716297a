// Database models - Re-exports all domain-specific models
//
// This module is split into focused files by domain:
// - settings.rs: User configuration record
// - project.rs: Prose projects

mod project;
mod settings;

pub use project::{NewProject, Project, UNTITLED_PROJECT};
pub use settings::{Settings, DEFAULT_EVALUATION_MODEL, DEFAULT_MODEL};
