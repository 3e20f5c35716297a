//! Application action boundary
//!
//! Ties the stores, editor surfaces, guard, AI clients and queue together.
//! Every user-triggered operation lives here; the UI layer calls these and
//! renders the surfaces and status messages that result.

use std::sync::{Arc, MutexGuard};

use once_cell::sync::OnceCell;

use crate::ai::{clean_response_text, evaluate_story, format_prompt, OpenRouterClient};
use crate::autosave::AutoSaver;
use crate::database::{DatabaseManager, NewProject, Project, Settings};
use crate::docs::{CreatedDocument, DocumentSummary, GoogleDocsClient};
use crate::editor::{text_to_html, ContentSyncGuard, EditorSurface, SharedSurface};
use crate::error::AppError;
use crate::queue::{PromptPipeline, PromptQueueRunner};
use crate::session::GenerationSession;
use crate::status::StatusSink;

/// Settings key holding the last prompt sent, for recall in the prompt pane
pub const LAST_PROMPT_KEY: &str = "last_sent_prompt";

/// Settings key holding the prose backup written on every edit
pub const PROSE_BACKUP_KEY: &str = "prose_content_backup";

/// Project name used for exports when no project is selected
const EXPORT_FALLBACK_TITLE: &str = "Cresonia Story";

/// The application core
pub struct App {
    db: Arc<DatabaseManager>,
    session: Arc<GenerationSession>,
    prose: SharedSurface,
    evaluation: SharedSurface,
    guard: Arc<ContentSyncGuard>,
    ai: OpenRouterClient,
    docs: Arc<GoogleDocsClient>,
    autosave: AutoSaver,
    status: Arc<dyn StatusSink>,
    queue: OnceCell<Arc<PromptQueueRunner>>,
}

impl App {
    pub fn new(
        db: Arc<DatabaseManager>,
        docs: Arc<GoogleDocsClient>,
        status: Arc<dyn StatusSink>,
    ) -> Arc<Self> {
        let prose = EditorSurface::prose();
        let evaluation = EditorSurface::evaluation();
        let guard = Arc::new(ContentSyncGuard::new(prose.clone()));

        let save_db = db.clone();
        let save_surface = prose.clone();
        let autosave = AutoSaver::new(move || {
            if let Err(e) = autosave_current(&save_db, &save_surface) {
                log::error!("Auto-save failed: {}", e);
            }
        });

        Arc::new(Self {
            db,
            session: GenerationSession::new(),
            prose,
            evaluation,
            guard,
            ai: OpenRouterClient::with_default_config(),
            docs,
            autosave,
            status,
            queue: OnceCell::new(),
        })
    }

    /// Load the current project (if any) into the surfaces and start the
    /// background content-protection loop. Called once at startup.
    pub fn startup(self: &Arc<Self>) -> Result<(), AppError> {
        if let Some(project) = self.db.get_current_project() {
            self.load_project_into_surfaces(&project)?;
        }
        self.guard.start_watch();
        Ok(())
    }

    pub fn prose_surface(&self) -> &SharedSurface {
        &self.prose
    }

    pub fn evaluation_surface(&self) -> &SharedSurface {
        &self.evaluation
    }

    pub fn sync_guard(&self) -> &Arc<ContentSyncGuard> {
        &self.guard
    }

    /// Word count of the prose pane, for the footer display
    pub fn prose_word_count(&self) -> usize {
        self.prose
            .lock()
            .map(|s| if s.has_real_content() { s.word_count() } else { 0 })
            .unwrap_or(0)
    }

    /// The lazily created queue runner driving this app as its pipeline
    pub fn queue_runner(self: &Arc<Self>) -> Arc<PromptQueueRunner> {
        self.queue
            .get_or_init(|| {
                let pipeline: Arc<dyn PromptPipeline> = self.clone();
                Arc::new(PromptQueueRunner::new(pipeline, self.status.clone()))
            })
            .clone()
    }

    // ---- Settings ----

    pub fn get_settings(&self) -> Settings {
        self.db.get_settings()
    }

    /// Persist the settings record. When the Google credentials changed, the
    /// Docs client is reinitialized in the background so an in-progress
    /// operation elsewhere is never blocked on it.
    pub fn save_settings(&self, settings: &Settings) -> Result<(), AppError> {
        let previous = self.db.get_settings();
        self.db
            .save_settings(settings)
            .map_err(AppError::persistence)?;

        if settings.google_api_key != previous.google_api_key
            || settings.google_client_id != previous.google_client_id
        {
            let docs = self.docs.clone();
            let api_key = settings.google_api_key.clone();
            let client_id = settings.google_client_id.clone();
            tokio::spawn(async move {
                docs.reinitialize(&api_key, &client_id).await;
            });
        }

        self.status.status("Settings saved");
        Ok(())
    }

    /// The last prompt sent, for restoring the prompt pane across sessions
    pub fn last_sent_prompt(&self) -> Option<String> {
        match self.db.get_setting(LAST_PROMPT_KEY) {
            Ok(prompt) => prompt,
            Err(e) => {
                log::error!("Error reading last sent prompt: {:#}", e);
                None
            }
        }
    }

    // ---- Generation ----

    /// Send one prompt through the generation pipeline and commit the
    /// response to the prose surface. Returns the cleaned response text.
    pub async fn send_prompt(
        &self,
        prompt: &str,
        include_prose: bool,
    ) -> Result<String, AppError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::Validation("Please enter a prompt".to_string()));
        }

        let settings = self.db.get_settings();
        if settings.api_key.trim().is_empty() {
            return Err(AppError::Validation(
                "Please enter your API key in settings".to_string(),
            ));
        }

        let Some(_busy) = self.session.try_begin() else {
            return Err(AppError::Validation(
                "Already generating a response".to_string(),
            ));
        };

        self.status.status("Generating response...");

        let previous = {
            let surface = lock_surface(&self.prose)?;
            if surface.has_real_content() {
                surface.plain_text()
            } else {
                String::new()
            }
        };

        let complete = format_prompt(prompt, &settings.style_guide, &previous, include_prose);

        lock_surface(&self.prose)?.begin_loading();

        if let Err(e) = self.db.set_setting(LAST_PROMPT_KEY, prompt) {
            log::error!("Error saving last sent prompt: {:#}", e);
        }

        match self.ai.generate(&complete, &settings).await {
            Ok(response) => {
                let cleaned = clean_response_text(&response);
                let committed = {
                    let mut surface = lock_surface(&self.prose)?;
                    surface.commit(&text_to_html(&cleaned));
                    surface.content().to_string()
                };

                self.guard.arm(&committed);
                self.backup_prose(&committed);
                self.autosave.note_edit();
                self.status.status("Response generated");
                Ok(cleaned)
            }
            Err(e) => {
                let rendered = format!("<div class=\"error\">Error: {}</div>", e);
                lock_surface(&self.prose)?.commit(&rendered);
                self.status.status("Error generating response");
                Err(e)
            }
        }
    }

    /// Evaluate the current prose and commit the report to the evaluation
    /// surface, persisting it onto the current project.
    pub async fn evaluate_story(&self) -> Result<String, AppError> {
        let prose = {
            let surface = lock_surface(&self.prose)?;
            if !surface.has_real_content() {
                return Err(AppError::Validation(
                    "Please generate prose content first".to_string(),
                ));
            }
            surface.plain_text()
        };

        let settings = self.db.get_settings();
        if settings.api_key.trim().is_empty() {
            return Err(AppError::Validation(
                "Please enter your API key in settings".to_string(),
            ));
        }

        let Some(_busy) = self.session.try_begin() else {
            return Err(AppError::Validation(
                "Already generating a response".to_string(),
            ));
        };

        self.status.status("Evaluating story...");
        lock_surface(&self.evaluation)?
            .set_content("<p>Evaluating story... This may take a minute.</p>");

        match evaluate_story(&self.ai, &prose, &settings).await {
            Ok(report) => {
                lock_surface(&self.evaluation)?.load(&report);

                if let Some(mut project) = self.db.get_current_project() {
                    project.evaluation = report.clone();
                    if let Err(e) = self.db.update_project(&project) {
                        log::error!("Error saving evaluation to project: {:#}", e);
                    }
                }

                self.status.status("Evaluation complete");
                Ok(report)
            }
            Err(e) => {
                let rendered = format!("<div class=\"error\">Error: {}</div>", e);
                lock_surface(&self.evaluation)?.set_content(rendered);
                Err(e)
            }
        }
    }

    // ---- Editing ----

    /// Note a user edit to the prose pane: back it up, schedule an
    /// auto-save, and let the guard reconsider its snapshot.
    pub fn note_prose_edit(&self) {
        let content = match self.prose.lock() {
            Ok(surface) if surface.has_real_content() => surface.content().to_string(),
            Ok(_) => String::new(),
            Err(_) => return,
        };

        self.backup_prose(&content);
        self.autosave.note_edit();
        self.guard.review();
    }

    /// Clear the prose pane deliberately, backing the content up first. The
    /// guard is suppressed so the clear is not mistaken for a reset.
    pub async fn clear_prose(&self) -> Result<(), AppError> {
        let content = {
            let surface = lock_surface(&self.prose)?;
            if surface.has_real_content() {
                surface.content().to_string()
            } else {
                String::new()
            }
        };
        self.backup_prose(&content);
        self.autosave.cancel();

        let surface = self.prose.clone();
        self.guard
            .suppress_during(|| async move {
                if let Ok(mut surface) = surface.lock() {
                    surface.reset();
                }
            })
            .await;

        self.status.status("Prose cleared");
        Ok(())
    }

    /// Clear the evaluation pane and the stored evaluation on the current
    /// project, if any
    pub fn clear_evaluation(&self) -> Result<(), AppError> {
        lock_surface(&self.evaluation)?.reset();

        if let Some(mut project) = self.db.get_current_project() {
            project.evaluation = String::new();
            self.db
                .update_project(&project)
                .map_err(AppError::persistence)?;
        }

        Ok(())
    }

    /// Restore the prose pane from the last backup. Returns false when no
    /// backup exists.
    pub fn recover_from_backup(&self) -> Result<bool, AppError> {
        let backup = self
            .db
            .get_setting(PROSE_BACKUP_KEY)
            .map_err(AppError::persistence)?;

        let Some(backup) = backup.filter(|b| !b.trim().is_empty()) else {
            self.status.status("No backup available");
            return Ok(false);
        };

        {
            let mut surface = lock_surface(&self.prose)?;
            surface.load(&backup);
        }
        self.guard.arm(&backup);

        self.status.status("Content recovered from backup");
        Ok(true)
    }

    // ---- Projects ----

    /// Save the prose and evaluation panes onto the current project.
    /// Returns false (with a status prompt to create one) when no project
    /// is selected.
    pub fn save_current_content(&self) -> Result<bool, AppError> {
        let Some(mut project) = self.db.get_current_project() else {
            self.status
                .status("No project selected. Create a project to save your work.");
            return Ok(false);
        };

        project.content = self.persistable_content(&self.prose)?;
        project.evaluation = self.persistable_content(&self.evaluation)?;

        self.db
            .update_project(&project)
            .map_err(AppError::persistence)?;

        self.status.status("Saved");
        Ok(true)
    }

    /// Create a new project seeded with whatever the panes currently hold,
    /// and select it
    pub fn create_project_from_current_content(
        &self,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Project, AppError> {
        let new = NewProject {
            name,
            description,
            content: self.persistable_content(&self.prose)?,
            evaluation: self.persistable_content(&self.evaluation)?,
            ..Default::default()
        };

        let project = self.db.create_project(new).map_err(AppError::persistence)?;

        self.status
            .status(&format!("Project \"{}\" created", project.name));
        Ok(project)
    }

    pub fn get_all_projects(&self) -> Result<Vec<Project>, AppError> {
        self.db.get_all_projects().map_err(AppError::persistence)
    }

    pub fn get_current_project(&self) -> Option<Project> {
        self.db.get_current_project()
    }

    /// Select a project: point the store at it and load it into the panes
    pub fn select_project(&self, id: i64) -> Result<Project, AppError> {
        let project = self
            .db
            .get_project(id)
            .map_err(AppError::persistence)?
            .ok_or_else(|| AppError::Validation(format!("Project {} not found", id)))?;

        self.db
            .set_current_project(&project)
            .map_err(AppError::persistence)?;

        self.load_project_into_surfaces(&project)?;

        self.status
            .status(&format!("Project \"{}\" loaded", project.name));
        Ok(project)
    }

    /// Delete a project. When it was the current one, the panes are reset
    /// with the guard suppressed so nothing tries to restore the content.
    pub async fn delete_project(&self, id: i64) -> Result<(), AppError> {
        let was_current = self
            .db
            .get_current_project()
            .and_then(|p| p.id)
            .map_or(false, |current| current == id);

        self.db.delete_project(id).map_err(AppError::persistence)?;

        if was_current {
            self.autosave.cancel();
            let prose = self.prose.clone();
            let evaluation = self.evaluation.clone();
            self.guard
                .suppress_during(|| async move {
                    if let Ok(mut surface) = prose.lock() {
                        surface.reset();
                    }
                    if let Ok(mut surface) = evaluation.lock() {
                        surface.reset();
                    }
                })
                .await;
        }

        self.status.status("Project deleted");
        Ok(())
    }

    // ---- Google Docs ----

    pub async fn authorize_google_docs(&self) -> Result<(), AppError> {
        self.docs
            .authorize()
            .await
            .map_err(|e| AppError::Api(e.to_string()))
    }

    pub async fn list_google_docs(&self, limit: usize) -> Result<Vec<DocumentSummary>, AppError> {
        self.docs
            .list_documents(limit)
            .await
            .map_err(|e| AppError::Api(e.to_string()))
    }

    /// Export the prose pane to a new Google Doc, recording the document on
    /// the current project when one is selected
    pub async fn export_to_google_docs(&self) -> Result<CreatedDocument, AppError> {
        let text = {
            let surface = lock_surface(&self.prose)?;
            if !surface.has_real_content() {
                return Err(AppError::Validation(
                    "Please generate prose content first".to_string(),
                ));
            }
            surface.plain_text()
        };

        let title = self
            .db
            .get_current_project()
            .map(|p| p.name)
            .unwrap_or_else(|| EXPORT_FALLBACK_TITLE.to_string());

        let created = self
            .docs
            .create_document(&title, &text)
            .await
            .map_err(|e| AppError::Api(e.to_string()))?;

        if let Some(mut project) = self.db.get_current_project() {
            project.google_doc_id = Some(created.id.clone());
            project.google_doc_url = Some(created.url.clone());
            if let Err(e) = self.db.update_project(&project) {
                log::error!("Error recording exported document on project: {:#}", e);
            }
        }

        self.status
            .status(&format!("Exported to Google Docs: {}", created.title));
        Ok(created)
    }

    /// Import a Google Doc as a new project and select it
    pub async fn import_google_doc(&self, document_id: &str) -> Result<Project, AppError> {
        let doc = self
            .docs
            .get_document(document_id)
            .await
            .map_err(|e| AppError::Api(e.to_string()))?;

        let new = NewProject {
            name: Some(doc.title.clone()),
            content: text_to_html(&doc.content),
            google_doc_id: Some(doc.id.clone()),
            google_doc_url: Some(crate::docs::client::document_url(&doc.id)),
            ..Default::default()
        };

        let project = self.db.create_project(new).map_err(AppError::persistence)?;
        self.load_project_into_surfaces(&project)?;

        self.status
            .status(&format!("Imported \"{}\" from Google Docs", project.name));
        Ok(project)
    }

    // ---- Internals ----

    fn load_project_into_surfaces(&self, project: &Project) -> Result<(), AppError> {
        {
            let mut surface = lock_surface(&self.prose)?;
            surface.load(&project.content);
        }
        {
            let mut surface = lock_surface(&self.evaluation)?;
            surface.load(&project.evaluation);
        }

        let content = lock_surface(&self.prose)?.content().to_string();
        self.guard.arm(&content);
        Ok(())
    }

    /// Pane content as stored on a project: real content verbatim,
    /// placeholder or loading states as empty
    fn persistable_content(&self, surface: &SharedSurface) -> Result<String, AppError> {
        let surface = lock_surface(surface)?;
        Ok(if surface.has_real_content() {
            surface.content().to_string()
        } else {
            String::new()
        })
    }

    /// Write the prose backup setting; failures are logged, never raised
    fn backup_prose(&self, content: &str) {
        if content.trim().is_empty() {
            return;
        }
        if let Err(e) = self.db.set_setting(PROSE_BACKUP_KEY, content) {
            log::error!("Error writing prose backup: {:#}", e);
        }
    }
}

/// Auto-save callback: persist the prose pane onto the current project.
/// Free function so the closure handed to the saver stays small.
fn autosave_current(db: &DatabaseManager, prose: &SharedSurface) -> Result<(), AppError> {
    let Some(mut project) = db.get_current_project() else {
        log::debug!("Auto-save skipped: no current project");
        return Ok(());
    };

    let content = {
        let surface = lock_surface(prose)?;
        if surface.has_real_content() {
            surface.content().to_string()
        } else {
            String::new()
        }
    };

    project.content = content;
    db.update_project(&project).map_err(AppError::persistence)?;
    log::debug!("Auto-saved project {}", project.name);
    Ok(())
}

fn lock_surface(surface: &SharedSurface) -> Result<MutexGuard<'_, EditorSurface>, AppError> {
    surface
        .lock()
        .map_err(|_| AppError::Persistence("editor surface lock poisoned".to_string()))
}

#[async_trait::async_trait]
impl PromptPipeline for App {
    async fn submit(&self, prompt: &str) {
        // Queue items always continue from the existing prose. Errors are
        // already rendered into the surface; the queue moves on.
        if let Err(e) = self.send_prompt(prompt, true).await {
            log::error!("Queued prompt failed: {}", e);
        }
    }

    fn is_generating(&self) -> bool {
        self.session.is_generating()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::{DocsAuthorizer, DocsError, GoogleDocsConfig};
    use crate::status::testing::RecordingStatus;
    use tempfile::tempdir;

    struct NoAuth;

    #[async_trait::async_trait]
    impl DocsAuthorizer for NoAuth {
        async fn acquire_token(&self, _: &str, _: &str) -> Result<String, DocsError> {
            Err(DocsError::Auth("not available in tests".to_string()))
        }
    }

    fn test_app() -> (Arc<App>, Arc<RecordingStatus>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Arc::new(DatabaseManager::new(dir.path().join("test.db")).unwrap());
        let docs = Arc::new(GoogleDocsClient::new(
            GoogleDocsConfig::default(),
            Arc::new(NoAuth),
        ));
        let status = Arc::new(RecordingStatus::default());
        let app = App::new(db, docs, status.clone());
        (app, status, dir)
    }

    #[tokio::test]
    async fn test_send_prompt_rejects_empty_prompt() {
        let (app, _, _dir) = test_app();

        let err = app.send_prompt("   ", false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Please enter a prompt");
    }

    #[tokio::test]
    async fn test_send_prompt_requires_api_key() {
        let (app, _, _dir) = test_app();

        let err = app.send_prompt("Write a scene.", false).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter your API key in settings");
    }

    #[tokio::test]
    async fn test_evaluate_requires_prose() {
        let (app, _, _dir) = test_app();

        let err = app.evaluate_story().await.unwrap_err();
        assert_eq!(err.to_string(), "Please generate prose content first");
    }

    #[tokio::test]
    async fn test_save_without_project_prompts_to_create() {
        let (app, status, _dir) = test_app();

        let saved = app.save_current_content().unwrap();
        assert!(!saved);
        assert!(status.contains("No project selected"));
    }

    #[tokio::test]
    async fn test_create_project_captures_pane_content() {
        let (app, _, _dir) = test_app();

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>Hello world</p>");

        let project = app
            .create_project_from_current_content(Some("Draft".to_string()), None)
            .unwrap();
        assert_eq!(project.content, "<p>Hello world</p>");
        // Placeholder evaluation is persisted as empty
        assert_eq!(project.evaluation, "");

        // The new project is current; saving now succeeds
        assert!(app.save_current_content().unwrap());
    }

    #[tokio::test]
    async fn test_select_project_loads_surfaces() {
        let (app, _, _dir) = test_app();

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>first project prose</p>");
        let first = app
            .create_project_from_current_content(Some("First".to_string()), None)
            .unwrap();

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>second project prose</p>");
        app.create_project_from_current_content(Some("Second".to_string()), None)
            .unwrap();

        app.select_project(first.id.unwrap()).unwrap();
        assert_eq!(
            app.prose_surface().lock().unwrap().content(),
            "<p>first project prose</p>"
        );
        assert_eq!(
            app.get_current_project().unwrap().name,
            "First"
        );
    }

    #[tokio::test]
    async fn test_select_missing_project_fails() {
        let (app, _, _dir) = test_app();

        let err = app.select_project(999).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_current_project_resets_surfaces() {
        let (app, _, _dir) = test_app();

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>doomed</p>");
        let project = app
            .create_project_from_current_content(Some("Doomed".to_string()), None)
            .unwrap();

        app.delete_project(project.id.unwrap()).await.unwrap();

        assert!(app.prose_surface().lock().unwrap().is_placeholder());
        assert!(app.evaluation_surface().lock().unwrap().is_placeholder());
        assert!(app.get_current_project().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_recover_prose() {
        let (app, _, _dir) = test_app();

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>precious words</p>");

        app.clear_prose().await.unwrap();
        assert!(app.prose_surface().lock().unwrap().is_placeholder());

        let recovered = app.recover_from_backup().unwrap();
        assert!(recovered);
        assert_eq!(
            app.prose_surface().lock().unwrap().content(),
            "<p>precious words</p>"
        );
    }

    #[tokio::test]
    async fn test_recover_without_backup() {
        let (app, status, _dir) = test_app();

        assert!(!app.recover_from_backup().unwrap());
        assert!(status.contains("No backup available"));
    }

    #[tokio::test]
    async fn test_note_prose_edit_writes_backup() {
        let (app, _, _dir) = test_app();

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>edited</p>");
        app.note_prose_edit();

        let backup = app.db.get_setting(PROSE_BACKUP_KEY).unwrap();
        assert_eq!(backup.as_deref(), Some("<p>edited</p>"));
    }

    #[tokio::test]
    async fn test_clear_evaluation_clears_project_record() {
        let (app, _, _dir) = test_app();

        app.evaluation_surface()
            .lock()
            .unwrap()
            .set_content("<p>old report</p>");
        let project = app
            .create_project_from_current_content(Some("P".to_string()), None)
            .unwrap();
        assert_eq!(project.evaluation, "<p>old report</p>");

        app.clear_evaluation().unwrap();
        assert!(app.evaluation_surface().lock().unwrap().is_placeholder());
        assert_eq!(app.get_current_project().unwrap().evaluation, "");
    }

    #[tokio::test]
    async fn test_word_count_ignores_placeholder() {
        let (app, _, _dir) = test_app();

        assert_eq!(app.prose_word_count(), 0);

        app.prose_surface()
            .lock()
            .unwrap()
            .set_content("<p>four little words here</p>");
        assert_eq!(app.prose_word_count(), 4);
    }

    #[tokio::test]
    async fn test_queue_runner_is_singleton() {
        let (app, _, _dir) = test_app();

        let a = app.queue_runner();
        let b = app.queue_runner();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
