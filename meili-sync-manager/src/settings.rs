//! Pushes declared index settings to the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::config::SyncConfig;
use crate::errors::SyncError;
use meili_sync_repository::{SearchEngineClient, SettingKind};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Published once per setting the engine applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsUpdated {
    /// Prefixed index uid.
    pub index: String,
    pub class: String,
    pub setting: String,
}

pub struct SettingsUpdater {
    client: Arc<dyn SearchEngineClient>,
    config: Arc<SyncConfig>,
    poll_interval: Duration,
    events: broadcast::Sender<SettingsUpdated>,
}

impl SettingsUpdater {
    pub fn new(client: Arc<dyn SearchEngineClient>, config: Arc<SyncConfig>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            client,
            config,
            poll_interval: DEFAULT_POLL_INTERVAL,
            events,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Receive a [`SettingsUpdated`] event for every applied setting.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsUpdated> {
        self.events.subscribe()
    }

    /// Push the settings of the index with uid `index_uid`.
    ///
    /// Every setting name is checked before anything is sent. Each update is
    /// awaited for at most `timeout`; a failed task aborts the remaining
    /// settings. Returns the names of the applied settings.
    #[instrument(skip(self), fields(index = %index_uid))]
    pub async fn update(&self, index_uid: &str, timeout: Duration) -> Result<Vec<String>, SyncError> {
        let index = self
            .config
            .index_by_prefixed_name(index_uid)
            .ok_or_else(|| SyncError::unknown_index(index_uid))?;

        if index.settings.is_empty() {
            info!("No settings configured");
            return Ok(Vec::new());
        }

        let settings = index
            .settings
            .iter()
            .map(|(name, value)| {
                name.parse::<SettingKind>()
                    .map(|kind| (name, kind, value))
                    .map_err(|_| SyncError::invalid_setting_name(index_uid, name.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut applied = Vec::with_capacity(settings.len());
        for (name, kind, value) in settings {
            let value = value.resolve()?;
            let info = self.client.update_setting(index_uid, kind, &value).await?;
            let task = self
                .client
                .wait_for_task(info.task_uid, timeout, self.poll_interval)
                .await?;

            if !task.is_success() {
                let message = task
                    .error_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("task ended with status {:?}", task.status));
                error!(setting = %name, task_uid = task.uid, error = %message, "Settings update failed");
                return Err(SyncError::task_failed(task.uid, message));
            }

            info!(setting = %name, task_uid = task.uid, "Setting updated");
            // Nobody listening is fine.
            let _ = self.events.send(SettingsUpdated {
                index: index_uid.to_string(),
                class: index.class.clone(),
                setting: name.clone(),
            });
            applied.push(name.clone());
        }

        Ok(applied)
    }

    /// Push the settings of every configured index.
    pub async fn update_all(&self, timeout: Duration) -> Result<Vec<String>, SyncError> {
        let mut applied = Vec::new();
        for index in &self.config.indices {
            applied.extend(self.update(&index.prefixed_name, timeout).await?);
        }
        Ok(applied)
    }
}
