//! Durable storage for execution rows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::types::{Execution, ExecutionState};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Execution not found: {0}")]
    NotFound(String),
}

/// Partial update for an execution row; `None` leaves a field untouched.
#[derive(Debug, Default, Clone)]
pub struct ExecutionPatch {
    pub state: Option<ExecutionState>,
    pub execution_data: Option<String>,
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a fresh INPROGRESS execution.
    async fn create(
        &self,
        agentflow_id: &str,
        session_id: &str,
        initial_data: &str,
    ) -> Result<Execution, StoreError>;

    /// Apply a patch. A transition into STOPPED stamps `stopped_date`.
    async fn update(&self, id: &str, patch: ExecutionPatch) -> Result<Execution, StoreError>;

    /// Most recently created execution for `(agentflow_id, session_id)`.
    async fn latest_by_session(
        &self,
        agentflow_id: &str,
        session_id: &str,
    ) -> Result<Option<Execution>, StoreError>;
}

fn fresh_execution(agentflow_id: &str, session_id: &str, initial_data: &str) -> Execution {
    Execution {
        id: Uuid::new_v4().to_string(),
        agentflow_id: agentflow_id.to_string(),
        session_id: session_id.to_string(),
        state: ExecutionState::InProgress,
        execution_data: initial_data.to_string(),
        created_date: Utc::now(),
        stopped_date: None,
    }
}

fn apply_patch(execution: &mut Execution, patch: ExecutionPatch) {
    if let Some(state) = patch.state {
        execution.state = state;
        if state == ExecutionState::Stopped {
            execution.stopped_date = Some(Utc::now());
        }
    }
    if let Some(data) = patch.execution_data {
        execution.execution_data = data;
    }
}

#[derive(Default)]
pub struct MemoryExecutionStore {
    rows: tokio::sync::RwLock<Vec<Execution>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<Execution> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn create(
        &self,
        agentflow_id: &str,
        session_id: &str,
        initial_data: &str,
    ) -> Result<Execution, StoreError> {
        let execution = fresh_execution(agentflow_id, session_id, initial_data);
        self.rows.write().await.push(execution.clone());
        Ok(execution)
    }

    async fn update(&self, id: &str, patch: ExecutionPatch) -> Result<Execution, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        apply_patch(row, patch);
        Ok(row.clone())
    }

    async fn latest_by_session(
        &self,
        agentflow_id: &str,
        session_id: &str,
    ) -> Result<Option<Execution>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|e| e.agentflow_id == agentflow_id && e.session_id == session_id)
            .max_by_key(|e| e.created_date)
            .cloned())
    }
}

/// One JSON file per execution under a base directory.
pub struct FileExecutionStore {
    dir: PathBuf,
}

impl FileExecutionStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.execution.json", id))
    }

    async fn write_row(&self, execution: &Execution) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(execution)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(self.path_for(&execution.id), bytes)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    async fn read_all(&self) -> Result<Vec<Execution>, StoreError> {
        let mut rows = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            let execution = serde_json::from_slice::<Execution>(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            rows.push(execution);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ExecutionStore for FileExecutionStore {
    async fn create(
        &self,
        agentflow_id: &str,
        session_id: &str,
        initial_data: &str,
    ) -> Result<Execution, StoreError> {
        let execution = fresh_execution(agentflow_id, session_id, initial_data);
        self.write_row(&execution).await?;
        Ok(execution)
    }

    async fn update(&self, id: &str, patch: ExecutionPatch) -> Result<Execution, StoreError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::Storage(e.to_string())),
        };
        let mut execution = serde_json::from_slice::<Execution>(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        apply_patch(&mut execution, patch);
        self.write_row(&execution).await?;
        Ok(execution)
    }

    async fn latest_by_session(
        &self,
        agentflow_id: &str,
        session_id: &str,
    ) -> Result<Option<Execution>, StoreError> {
        let rows = self.read_all().await?;
        Ok(rows
            .into_iter()
            .filter(|e| e.agentflow_id == agentflow_id && e.session_id == session_id)
            .max_by_key(|e| e.created_date))
    }
}
