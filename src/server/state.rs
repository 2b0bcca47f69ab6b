//! Application state management

use crate::config::AppConfig;
use crate::workflow::WorkflowService;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub config: AppConfig,
    pub workflow: Arc<WorkflowService>,
}

impl AppState {
    pub fn new(config: AppConfig, workflow: Arc<WorkflowService>) -> Self {
        Self { config, workflow }
    }

    /// State with the session store `config` describes
    pub async fn from_config(config: AppConfig) -> Self {
        let workflow = WorkflowService::from_config(&config).await;
        Self::new(config, Arc::new(workflow))
    }
}
