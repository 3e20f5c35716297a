//! Cresonia AI
//!
//! Core library for an AI-assisted prose authoring app: SQLite-backed
//! projects and settings, editor surfaces with content-loss protection,
//! OpenRouter text generation and story evaluation, a sequential prompt
//! queue, and Google Docs import/export. The UI layer sits on top of
//! [`app::App`] and renders the surfaces and status messages it drives.

pub mod ai;
pub mod app;
pub mod autosave;
pub mod database;
pub mod docs;
pub mod editor;
pub mod error;
pub mod queue;
pub mod session;
pub mod status;
pub mod util;

pub use app::App;
pub use database::{DatabaseManager, NewProject, Project, Settings};
pub use error::AppError;
