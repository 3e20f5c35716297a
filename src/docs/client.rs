//! Google Docs/Drive client
//!
//! Document export/import over the Docs v1 and Drive v3 REST APIs. Requires
//! two credentials (API key and OAuth client id); when either is missing the
//! client degrades to a disabled state instead of erroring on first use.
//! The OAuth browser dance itself is the authorizer's concern: `authorize`
//! is an explicit awaited operation against an injected [`DocsAuthorizer`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

use crate::util::truncate_chars;

/// Drive v3 files endpoint
pub const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Docs v1 documents endpoint
pub const DOCS_API_URL: &str = "https://docs.googleapis.com/v1/documents";

/// OAuth scopes needed for document listing, reading and creation
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/documents https://www.googleapis.com/auth/drive.file";

/// Error types for document operations
#[derive(Debug, Clone)]
pub enum DocsError {
    /// API key or client id missing; integration is disabled
    NotConfigured,
    /// No access token; `authorize` has not completed
    NotAuthorized,
    /// Authorization flow failed
    Auth(String),
    /// Request failed (network, HTTP status)
    Request(String),
    /// Response missing the expected shape
    InvalidResponse(String),
}

impl fmt::Display for DocsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocsError::NotConfigured => {
                write!(f, "Google Docs integration is not configured")
            }
            DocsError::NotAuthorized => write!(f, "Not connected to Google Docs"),
            DocsError::Auth(msg) => write!(f, "Authorization failed: {}", msg),
            DocsError::Request(msg) => write!(f, "Request failed: {}", msg),
            DocsError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for DocsError {}

/// Acquires an OAuth access token for the configured client id
#[async_trait]
pub trait DocsAuthorizer: Send + Sync {
    async fn acquire_token(&self, client_id: &str, scopes: &str) -> Result<String, DocsError>;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct GoogleDocsConfig {
    pub api_key: String,
    pub client_id: String,
    pub drive_base_url: String,
    pub docs_base_url: String,
    pub timeout_secs: u64,
}

impl Default for GoogleDocsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            client_id: String::new(),
            drive_base_url: DRIVE_FILES_URL.to_string(),
            docs_base_url: DOCS_API_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl GoogleDocsConfig {
    pub fn with_credentials(api_key: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.client_id.trim().is_empty()
    }
}

/// A document as listed from Drive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub created_time: String,
    pub url: String,
}

/// A document's content as fetched from Docs
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// A newly created document
#[derive(Debug, Clone)]
pub struct CreatedDocument {
    pub id: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsDocument {
    document_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<DocsBody>,
}

#[derive(Debug, Deserialize)]
struct DocsBody {
    #[serde(default)]
    content: Vec<DocsStructuralElement>,
}

#[derive(Debug, Deserialize)]
struct DocsStructuralElement {
    #[serde(default)]
    paragraph: Option<DocsParagraph>,
}

#[derive(Debug, Deserialize)]
struct DocsParagraph {
    #[serde(default)]
    elements: Vec<DocsParagraphElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsParagraphElement {
    #[serde(default)]
    text_run: Option<DocsTextRun>,
}

#[derive(Debug, Deserialize)]
struct DocsTextRun {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct CreateDocumentBody<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody<'a> {
    requests: Vec<BatchUpdateRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest<'a> {
    insert_text: InsertTextRequest<'a>,
}

#[derive(Debug, Serialize)]
struct InsertTextRequest<'a> {
    location: InsertLocation,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertLocation {
    index: u32,
}

/// Google Docs/Drive client
pub struct GoogleDocsClient {
    config: RwLock<GoogleDocsConfig>,
    authorizer: std::sync::Arc<dyn DocsAuthorizer>,
    token: RwLock<Option<String>>,
    client: Client,
}

impl GoogleDocsClient {
    pub fn new(config: GoogleDocsConfig, authorizer: std::sync::Arc<dyn DocsAuthorizer>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            config: RwLock::new(config),
            authorizer,
            token: RwLock::new(None),
            client,
        }
    }

    /// Whether both credentials are present (integration enabled)
    pub async fn is_enabled(&self) -> bool {
        self.config.read().await.has_credentials()
    }

    /// Swap in new credentials and drop any existing session. Called when
    /// the Google credentials change on settings save.
    pub async fn reinitialize(&self, api_key: &str, client_id: &str) {
        {
            let mut config = self.config.write().await;
            config.api_key = api_key.to_string();
            config.client_id = client_id.to_string();
        }
        *self.token.write().await = None;
        log::info!("Google Docs client reinitialized");
    }

    /// Run the authorization flow and store the resulting access token
    pub async fn authorize(&self) -> Result<(), DocsError> {
        let client_id = {
            let config = self.config.read().await;
            if !config.has_credentials() {
                return Err(DocsError::NotConfigured);
            }
            config.client_id.clone()
        };

        let token = self.authorizer.acquire_token(&client_id, SCOPES).await?;
        *self.token.write().await = Some(token);
        log::info!("Google Docs authorization completed");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Drop the stored access token
    pub async fn sign_out(&self) {
        *self.token.write().await = None;
    }

    async fn authorized_token(&self) -> Result<String, DocsError> {
        if !self.is_enabled().await {
            return Err(DocsError::NotConfigured);
        }
        self.token
            .read()
            .await
            .clone()
            .ok_or(DocsError::NotAuthorized)
    }

    /// List the user's documents, most recently created first
    pub async fn list_documents(&self, limit: usize) -> Result<Vec<DocumentSummary>, DocsError> {
        let token = self.authorized_token().await?;
        let config = self.config.read().await.clone();

        let response = self
            .client
            .get(&config.drive_base_url)
            .bearer_auth(&token)
            .query(&[
                ("q", "mimeType='application/vnd.google-apps.document'"),
                ("orderBy", "createdTime desc"),
                ("pageSize", &limit.to_string()),
                ("fields", "files(id,name,createdTime,webViewLink)"),
                ("key", &config.api_key),
            ])
            .send()
            .await
            .map_err(|e| DocsError::Request(e.to_string()))?;

        let list: DriveFileList = check_and_parse(response).await?;

        Ok(list
            .files
            .into_iter()
            .map(|f| DocumentSummary {
                url: f.web_view_link.unwrap_or_else(|| document_url(&f.id)),
                id: f.id,
                name: f.name,
                created_time: f.created_time.unwrap_or_default(),
            })
            .collect())
    }

    /// Fetch a document and flatten its body to plain text
    pub async fn get_document(&self, document_id: &str) -> Result<DocumentContent, DocsError> {
        let token = self.authorized_token().await?;
        let config = self.config.read().await.clone();

        let url = format!("{}/{}", config.docs_base_url, document_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("key", &config.api_key)])
            .send()
            .await
            .map_err(|e| DocsError::Request(e.to_string()))?;

        let doc: DocsDocument = check_and_parse(response).await?;

        Ok(DocumentContent {
            content: extract_text(&doc),
            id: doc.document_id,
            title: doc.title.unwrap_or_else(|| "Untitled document".to_string()),
        })
    }

    /// Create a new document with the given title and plain-text content
    pub async fn create_document(
        &self,
        title: &str,
        content: &str,
    ) -> Result<CreatedDocument, DocsError> {
        let token = self.authorized_token().await?;
        let config = self.config.read().await.clone();

        let response = self
            .client
            .post(&config.docs_base_url)
            .bearer_auth(&token)
            .query(&[("key", &config.api_key)])
            .json(&CreateDocumentBody { title })
            .send()
            .await
            .map_err(|e| DocsError::Request(e.to_string()))?;

        let doc: DocsDocument = check_and_parse(response).await?;

        if !content.trim().is_empty() {
            let url = format!("{}/{}:batchUpdate", config.docs_base_url, doc.document_id);
            let body = BatchUpdateBody {
                requests: vec![BatchUpdateRequest {
                    insert_text: InsertTextRequest {
                        location: InsertLocation { index: 1 },
                        text: content,
                    },
                }],
            };

            let response = self
                .client
                .post(&url)
                .bearer_auth(&token)
                .query(&[("key", &config.api_key)])
                .json(&body)
                .send()
                .await
                .map_err(|e| DocsError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(DocsError::Request(format!(
                    "Failed to insert document content: HTTP {}",
                    response.status().as_u16()
                )));
            }
        }

        Ok(CreatedDocument {
            url: document_url(&doc.document_id),
            title: doc.title.unwrap_or_else(|| title.to_string()),
            id: doc.document_id,
        })
    }
}

/// Canonical edit URL for a document id
pub fn document_url(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{}/edit", document_id)
}

async fn check_and_parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DocsError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| DocsError::Request(e.to_string()))?;

    if !status.is_success() {
        return Err(DocsError::Request(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate_chars(&text, 200)
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| DocsError::InvalidResponse(format!("{}: {}", e, truncate_chars(&text, 100))))
}

/// Flatten a Docs body into plain text
fn extract_text(doc: &DocsDocument) -> String {
    let Some(body) = &doc.body else {
        return String::new();
    };

    let mut text = String::new();
    for element in &body.content {
        if let Some(paragraph) = &element.paragraph {
            for pe in &paragraph.elements {
                if let Some(run) = &pe.text_run {
                    text.push_str(&run.content);
                }
            }
        }
    }
    text
}
