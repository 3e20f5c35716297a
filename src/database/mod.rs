// Database module for Cresonia
// Provides SQLite persistence for settings, projects, and the
// current-project pointer

pub mod manager;
pub mod migrations;
pub mod models;
pub mod project_repo;
pub mod settings_repo;

pub use manager::DatabaseManager;
pub use models::*;
