// Database models - Project
use serde::{Deserialize, Serialize};

/// Name given to projects created without one
pub const UNTITLED_PROJECT: &str = "Untitled Project";

/// A named unit of persisted prose + evaluation + metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Surrogate key assigned by the store on creation; None before insertion
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    /// ISO-8601 creation timestamp
    pub created: String,
    /// ISO-8601, refreshed on every mutation
    pub last_modified: String,
    /// Prose, serialized HTML fragment or plain text (auto-detected on write)
    pub content: String,
    /// Last evaluation report, same representation as content
    pub evaluation: String,
    pub google_doc_id: Option<String>,
    pub google_doc_url: Option<String>,
}

/// Fields supplied when creating a project; missing ones get documented defaults
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: String,
    pub evaluation: String,
    pub google_doc_id: Option<String>,
    pub google_doc_url: Option<String>,
}

impl Project {
    pub fn from_new(new: NewProject) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let name = match new.name {
            Some(n) if !n.trim().is_empty() => n,
            _ => UNTITLED_PROJECT.to_string(),
        };
        Self {
            id: None,
            name,
            description: new.description.unwrap_or_default(),
            created: now.clone(),
            last_modified: now,
            content: new.content,
            evaluation: new.evaluation,
            google_doc_id: new.google_doc_id,
            google_doc_url: new.google_doc_url,
        }
    }
}
