use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

use crate::clock::Clock;
use crate::context::{EngineContext, UnenrollPolicy};
use crate::db;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub clock: Box<dyn Clock>,
    pub unenroll_policy: UnenrollPolicy,
}

impl AppState {
    pub fn new(clock: Box<dyn Clock>, unenroll_policy: UnenrollPolicy) -> Self {
        Self {
            workspace: None,
            db: None,
            clock,
            unenroll_policy,
        }
    }

    /// Opens (creating if needed) the workspace database and makes it current.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        tracing::info!(workspace = %path.display(), "workspace opened");
        Ok(())
    }

    pub fn engine(&self) -> Option<EngineContext<'_>> {
        let conn = self.db.as_ref()?;
        let mut ctx = EngineContext::new(conn, self.clock.as_ref());
        ctx.unenroll_policy = self.unenroll_policy;
        Some(ctx)
    }
}
