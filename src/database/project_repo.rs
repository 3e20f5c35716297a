// Project repository for Cresonia
// Handles CRUD operations for projects and the current-project pointer

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::error::AppError;

use super::models::{NewProject, Project};
use super::DatabaseManager;

impl DatabaseManager {
    /// Create a new project, assign its id and set it as the current project
    pub fn create_project(&self, new: NewProject) -> Result<Project> {
        self.with_connection(|conn| {
            let mut project = Project::from_new(new);
            let id = insert_project_impl(conn, &project)?;
            project.id = Some(id);
            set_current_project_impl(conn, &project)?;
            Ok(project)
        })
    }

    /// Update an existing project. Requires an id; always refreshes
    /// last_modified, and refreshes the current-project cache when the
    /// updated project is the active one.
    pub fn update_project(&self, project: &Project) -> Result<Project> {
        let Some(id) = project.id else {
            return Err(anyhow::Error::new(AppError::Validation(
                "Project ID is required for update".to_string(),
            )));
        };

        self.with_connection(|conn| {
            let mut updated = project.clone();
            updated.last_modified = chrono::Utc::now().to_rfc3339();

            let rows = update_project_impl(conn, id, &updated)?;
            if rows == 0 {
                anyhow::bail!("Project {} not found", id);
            }

            if current_project_id_impl(conn)? == Some(id) {
                set_current_project_impl(conn, &updated)?;
            }

            Ok(updated)
        })
    }

    /// Delete a project; clears the current-project pointer if it was current
    pub fn delete_project(&self, id: i64) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM projects WHERE id = ?", params![id])
                .context("Failed to delete project")?;

            if current_project_id_impl(conn)? == Some(id) {
                clear_current_project_impl(conn)?;
            }

            Ok(())
        })
    }

    /// Get a single project by id
    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.with_connection(|conn| {
            get_project_impl(conn, id)
        })
    }

    /// Get all projects, most recently modified first
    pub fn get_all_projects(&self) -> Result<Vec<Project>> {
        self.with_connection(get_all_projects_impl)
    }

    /// Replace the current-project pointer with a snapshot of this project
    pub fn set_current_project(&self, project: &Project) -> Result<()> {
        self.with_connection(|conn| {
            set_current_project_impl(conn, project)
        })
    }

    /// Clear the current-project pointer
    pub fn clear_current_project(&self) -> Result<()> {
        self.with_connection(clear_current_project_impl)
    }

    /// Read the cached pointer without reconciliation. Best-effort only;
    /// never use the snapshot's fields (other than id) as authoritative.
    pub fn get_current_project_cached(&self) -> Option<Project> {
        let snapshot = match self.with_connection(current_project_snapshot_impl) {
            Ok(s) => s?,
            Err(e) => {
                log::error!("Error reading current project pointer: {:#}", e);
                return None;
            }
        };

        match serde_json::from_str(&snapshot) {
            Ok(project) => Some(project),
            Err(e) => {
                log::error!("Error parsing current project snapshot: {}", e);
                None
            }
        }
    }

    /// Get the current project, re-fetching the authoritative record by id
    /// and refreshing the cache. Falls back to the cached snapshot when the
    /// re-fetch fails.
    pub fn get_current_project(&self) -> Option<Project> {
        let cached = self.get_current_project_cached()?;

        if let Some(id) = cached.id {
            match self.get_project(id) {
                Ok(Some(latest)) => {
                    if let Err(e) = self.set_current_project(&latest) {
                        log::error!("Error refreshing current project cache: {:#}", e);
                    }
                    return Some(latest);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Error re-fetching current project: {:#}", e);
                    return Some(cached);
                }
            }
        }

        Some(cached)
    }
}

fn insert_project_impl(conn: &Connection, project: &Project) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO projects (name, description, created, last_modified,
                              content, evaluation, google_doc_id, google_doc_url)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            project.name,
            project.description,
            project.created,
            project.last_modified,
            project.content,
            project.evaluation,
            project.google_doc_id,
            project.google_doc_url,
        ],
    ).context("Failed to create project")?;

    Ok(conn.last_insert_rowid())
}

fn update_project_impl(conn: &Connection, id: i64, project: &Project) -> Result<usize> {
    conn.execute(
        r#"
        UPDATE projects
        SET name = ?1, description = ?2, last_modified = ?3,
            content = ?4, evaluation = ?5, google_doc_id = ?6, google_doc_url = ?7
        WHERE id = ?8
        "#,
        params![
            project.name,
            project.description,
            project.last_modified,
            project.content,
            project.evaluation,
            project.google_doc_id,
            project.google_doc_url,
            id,
        ],
    ).context("Failed to update project")
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        created: row.get(3)?,
        last_modified: row.get(4)?,
        content: row.get(5)?,
        evaluation: row.get(6)?,
        google_doc_id: row.get(7)?,
        google_doc_url: row.get(8)?,
    })
}

const PROJECT_COLUMNS: &str =
    "id, name, description, created, last_modified, content, evaluation, google_doc_id, google_doc_url";

fn get_project_impl(conn: &Connection, id: i64) -> Result<Option<Project>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM projects WHERE id = ?",
        PROJECT_COLUMNS
    )).context("Failed to prepare get_project query")?;

    let result = stmt.query_row(params![id], project_from_row);

    match result {
        Ok(project) => Ok(Some(project)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get project"),
    }
}

fn get_all_projects_impl(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM projects ORDER BY last_modified DESC",
        PROJECT_COLUMNS
    )).context("Failed to prepare get_all_projects query")?;

    let projects = stmt.query_map([], project_from_row)
        .context("Failed to query projects")?;

    projects.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect projects")
}

fn set_current_project_impl(conn: &Connection, project: &Project) -> Result<()> {
    let snapshot = serde_json::to_string(project)
        .context("Failed to serialize current project snapshot")?;

    conn.execute(
        r#"
        INSERT INTO current_project (slot, project_id, snapshot)
        VALUES (0, ?1, ?2)
        ON CONFLICT(slot) DO UPDATE SET
            project_id = excluded.project_id,
            snapshot = excluded.snapshot
        "#,
        params![project.id, snapshot],
    ).context("Failed to set current project")?;

    Ok(())
}

fn clear_current_project_impl(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM current_project WHERE slot = 0", [])
        .context("Failed to clear current project")?;
    Ok(())
}

fn current_project_id_impl(conn: &Connection) -> Result<Option<i64>> {
    let result = conn.query_row(
        "SELECT project_id FROM current_project WHERE slot = 0",
        [],
        |row| row.get::<_, Option<i64>>(0),
    );

    match result {
        Ok(id) => Ok(id),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to read current project id"),
    }
}

fn current_project_snapshot_impl(conn: &Connection) -> Result<Option<String>> {
    let result = conn.query_row(
        "SELECT snapshot FROM current_project WHERE slot = 0",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to read current project snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // The TempDir must outlive the manager or SQLite loses its directory
    fn create_test_db() -> (DatabaseManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = DatabaseManager::new(db_path).unwrap();
        (db, dir)
    }

    #[test]
    fn test_create_and_get_project() {
        let (db, _dir) = create_test_db();

        let project = db.create_project(NewProject {
            name: Some("Draft 1".to_string()),
            description: Some("A story".to_string()),
            content: "<p>Hello world</p>".to_string(),
            ..Default::default()
        }).unwrap();

        let id = project.id.unwrap();
        let loaded = db.get_project(id).unwrap().unwrap();
        assert_eq!(loaded, project);
        assert_eq!(loaded.name, "Draft 1");
        assert_eq!(loaded.content, "<p>Hello world</p>");
    }

    #[test]
    fn test_create_defaults_name() {
        let (db, _dir) = create_test_db();

        let project = db.create_project(NewProject::default()).unwrap();
        assert_eq!(project.name, "Untitled Project");
        assert!(!project.created.is_empty());
    }

    #[test]
    fn test_create_sets_current() {
        let (db, _dir) = create_test_db();

        let project = db.create_project(NewProject::default()).unwrap();
        let current = db.get_current_project().unwrap();
        assert_eq!(current.id, project.id);
    }

    #[test]
    fn test_update_requires_id() {
        let (db, _dir) = create_test_db();

        let project = Project::from_new(NewProject::default());
        let err = db.update_project(&project).unwrap_err();
        assert!(err.to_string().contains("ID is required"));
    }

    #[test]
    fn test_update_advances_last_modified() {
        let (db, _dir) = create_test_db();

        let project = db.create_project(NewProject::default()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = db.update_project(&project).unwrap();
        assert!(updated.last_modified > project.last_modified);

        let stored = db.get_project(project.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.last_modified, updated.last_modified);
    }

    #[test]
    fn test_update_refreshes_current_cache() {
        let (db, _dir) = create_test_db();

        let mut project = db.create_project(NewProject::default()).unwrap();
        project.content = "changed".to_string();
        db.update_project(&project).unwrap();

        let cached = db.get_current_project_cached().unwrap();
        assert_eq!(cached.content, "changed");
    }

    #[test]
    fn test_delete_current_clears_pointer() {
        let (db, _dir) = create_test_db();

        let project = db.create_project(NewProject::default()).unwrap();
        db.delete_project(project.id.unwrap()).unwrap();

        assert!(db.get_current_project().is_none());
        assert!(db.get_project(project.id.unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_delete_non_current_keeps_pointer() {
        let (db, _dir) = create_test_db();

        let first = db.create_project(NewProject {
            name: Some("First".to_string()),
            ..Default::default()
        }).unwrap();
        let second = db.create_project(NewProject {
            name: Some("Second".to_string()),
            ..Default::default()
        }).unwrap();

        // Second is current; deleting first must not touch the pointer
        db.delete_project(first.id.unwrap()).unwrap();
        let current = db.get_current_project().unwrap();
        assert_eq!(current.id, second.id);
    }

    #[test]
    fn test_get_all_ordered_by_last_modified() {
        let (db, _dir) = create_test_db();

        let a = db.create_project(NewProject {
            name: Some("A".to_string()),
            ..Default::default()
        }).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.create_project(NewProject {
            name: Some("B".to_string()),
            ..Default::default()
        }).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        // Touch A so it becomes most recent
        db.update_project(&a).unwrap();

        let all = db.get_all_projects().unwrap();
        let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_get_current_reconciles_stale_snapshot() {
        let (db, _dir) = create_test_db();

        let mut project = db.create_project(NewProject::default()).unwrap();

        // Write a stale snapshot to the pointer, then make the row diverge
        db.set_current_project(&project).unwrap();
        project.content = "authoritative".to_string();
        db.with_connection(|conn| {
            update_project_impl(conn, project.id.unwrap(), &project)?;
            Ok(())
        }).unwrap();

        let current = db.get_current_project().unwrap();
        assert_eq!(current.content, "authoritative");

        // The cache was refreshed too
        let cached = db.get_current_project_cached().unwrap();
        assert_eq!(cached.content, "authoritative");
    }
}
