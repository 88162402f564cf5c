//! Maintenance commands.

use std::collections::BTreeSet;
use std::time::Duration;

use clap::Args;
use tracing::{info, instrument, warn};

use crate::{CliError, Dependencies};
use meili_sync_manager::{ImportOptions, ImportReport, SyncError};
use meili_sync_repository::SearchError;
use meili_sync_shared::{Task, TaskInfo};

const INDEX_ALREADY_EXISTS: &str = "index_already_exists";
const INDEX_NOT_FOUND: &str = "index_not_found";

/// Index selection shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct IndexArgs {
    /// Comma separated index names (all configured indices when omitted)
    #[arg(long, value_delimiter = ',')]
    pub indices: Vec<String>,
}

/// Arguments of `clear` and `delete`.
#[derive(Args, Debug, Clone)]
pub struct MaintenanceArgs {
    #[command(flatten)]
    pub selection: IndexArgs,

    /// Longest wait for each engine task, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub response_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub selection: IndexArgs,

    /// Push the configured settings after creating each index
    #[arg(long)]
    pub update_settings: bool,

    /// Longest wait for each engine task, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub response_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub selection: IndexArgs,

    /// Entities per page (defaults to the configured batch size)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pages to skip at the start of each source
    #[arg(long, default_value_t = 0)]
    pub skip_batches: usize,

    /// Longest wait for each engine task, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub response_timeout: u64,

    /// Import into temporary indices and swap them with the live ones
    #[arg(long)]
    pub swap_indices: bool,

    /// Push the configured settings after importing (default)
    #[arg(long, overrides_with = "no_update_settings")]
    pub update_settings: bool,

    /// Do not push the configured settings after importing
    #[arg(long, overrides_with = "update_settings")]
    pub no_update_settings: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateSettingsArgs {
    #[command(flatten)]
    pub selection: IndexArgs,

    /// Longest wait for each engine task, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub response_timeout: u64,
}

impl ImportArgs {
    pub fn options(&self, poll_interval: Duration) -> ImportOptions {
        ImportOptions {
            indices: self.selection.indices.clone(),
            batch_size: self.batch_size,
            skip_batches: self.skip_batches,
            response_timeout: Duration::from_millis(self.response_timeout),
            update_settings: !self.no_update_settings,
            swap_indices: self.swap_indices,
            poll_interval,
        }
    }
}

/// Create the selected indices. Returns the uids of the indices that were
/// created; indices that already exist are skipped.
#[instrument(skip(deps, args), fields(indices = ?args.selection.indices))]
pub async fn create(deps: &Dependencies, args: &CreateArgs) -> Result<Vec<String>, CliError> {
    let timeout = Duration::from_millis(args.response_timeout);
    let mut created = Vec::new();

    for index in deps.config.select_indices(&args.selection.indices)? {
        let info = deps.manager.create_index(&index.name).await?;
        let task = wait(deps, &info, timeout).await?;

        match error_code(&task) {
            None => {
                info!(index = %index.prefixed_name, "Index created");
                created.push(index.prefixed_name.clone());
            }
            Some(INDEX_ALREADY_EXISTS) => {
                warn!(index = %index.prefixed_name, "Index already exists");
            }
            Some(_) => return Err(task_failed(&task).into()),
        }

        if args.update_settings {
            deps.settings.update(&index.prefixed_name, timeout).await?;
        }
    }

    Ok(created)
}

/// Remove every document from the indices of the selected classes.
#[instrument(skip(deps, args), fields(indices = ?args.selection.indices))]
pub async fn clear(deps: &Dependencies, args: &MaintenanceArgs) -> Result<Vec<String>, CliError> {
    let timeout = Duration::from_millis(args.response_timeout);
    let classes: BTreeSet<&str> = deps
        .config
        .select_indices(&args.selection.indices)?
        .into_iter()
        .map(|index| index.class.as_str())
        .collect();

    let mut cleared = Vec::new();
    for class in classes {
        for info in deps.manager.clear(class).await? {
            let task = wait(deps, &info, timeout).await?;
            if !task.is_success() {
                return Err(task_failed(&task).into());
            }
            cleared.extend(info.index_uid);
        }
    }

    info!(count = cleared.len(), "Indices cleared");
    Ok(cleared)
}

/// Delete the selected indices. Indices missing on the engine are skipped.
#[instrument(skip(deps, args), fields(indices = ?args.selection.indices))]
pub async fn delete(deps: &Dependencies, args: &MaintenanceArgs) -> Result<Vec<String>, CliError> {
    let timeout = Duration::from_millis(args.response_timeout);
    let mut deleted = Vec::new();

    for index in deps.config.select_indices(&args.selection.indices)? {
        let info = match deps.manager.delete_by_index_name(&index.prefixed_name).await {
            Ok(info) => info,
            Err(SyncError::Search(SearchError::IndexNotFound(_))) => {
                warn!(index = %index.prefixed_name, "Index not found");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let task = wait(deps, &info, timeout).await?;
        match error_code(&task) {
            None => {
                info!(index = %index.prefixed_name, "Index deleted");
                deleted.push(index.prefixed_name.clone());
            }
            Some(INDEX_NOT_FOUND) => warn!(index = %index.prefixed_name, "Index not found"),
            Some(_) => return Err(task_failed(&task).into()),
        }
    }

    Ok(deleted)
}

/// Import every entity of the selected indices from their sources.
pub async fn import(deps: &Dependencies, args: &ImportArgs) -> Result<ImportReport, CliError> {
    let report = deps.importer.import(&args.options(deps.poll_interval)).await?;

    for index in &report.indices {
        if index.documents == 0 {
            warn!(index = %index.index_uid, "No documents imported");
        } else {
            info!(
                index = %index.index_uid,
                documents = index.documents,
                batches = index.batches,
                "Index imported"
            );
        }
    }

    Ok(report)
}

/// Push the configured settings of the selected indices.
pub async fn update_settings(
    deps: &Dependencies,
    args: &UpdateSettingsArgs,
) -> Result<Vec<(String, Vec<String>)>, CliError> {
    let timeout = Duration::from_millis(args.response_timeout);
    let mut updated = Vec::new();

    for index in deps.config.select_indices(&args.selection.indices)? {
        let settings = deps.settings.update(&index.prefixed_name, timeout).await?;
        updated.push((index.prefixed_name.clone(), settings));
    }

    Ok(updated)
}

async fn wait(deps: &Dependencies, info: &TaskInfo, timeout: Duration) -> Result<Task, CliError> {
    Ok(deps
        .client
        .wait_for_task(info.task_uid, timeout, deps.poll_interval)
        .await?)
}

/// Engine error code of a task that did not succeed.
fn error_code(task: &Task) -> Option<&str> {
    if task.is_success() {
        return None;
    }
    Some(task.error.as_ref().map(|e| e.code.as_str()).unwrap_or_default())
}

fn task_failed(task: &Task) -> SyncError {
    let message = task
        .error_message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("task ended with status {:?}", task.status));
    SyncError::task_failed(task.uid, message)
}
