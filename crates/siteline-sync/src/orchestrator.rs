//! Sync orchestration
//!
//! Drives sync passes over projects, links, and modules. Concurrency is
//! controlled per (project, module): each pair has its own async mutex,
//! and a pass that finds the mutex held is skipped rather than queued, so
//! a manual trigger during a scheduled run cannot double-process items.
//! Passes over different projects or different modules run independently.
//!
//! Failure isolation, from the inside out: a bad item fails only that
//! item (recorded on the run log), a failed listing fails only that
//! (link, module) run, and a failed project pass never stops the pass
//! over the remaining projects.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use siteline_audit::HistoryRecorder;
use siteline_core::domain::{
    Actor, ExternalProjectLink, HistoryField, LinkRunStatus, ProjectId, RunLog, RunStatus,
    SyncCursor, SyncModule, SyncTrigger,
};
use siteline_core::ports::{ExternalItemPayload, IConstructionPlatform, IRecordStore};

use crate::merge::{self, MergeOutcome};

/// The sync engine entry point
pub struct SyncOrchestrator {
    platform: Arc<dyn IConstructionPlatform>,
    store: Arc<dyn IRecordStore>,
    history: HistoryRecorder,
    guards: DashMap<(ProjectId, SyncModule), Arc<Mutex<()>>>,
}

impl SyncOrchestrator {
    pub fn new(platform: Arc<dyn IConstructionPlatform>, store: Arc<dyn IRecordStore>) -> Self {
        let history = HistoryRecorder::new(store.clone());
        Self {
            platform,
            store,
            history,
            guards: DashMap::new(),
        }
    }

    /// Runs one sync pass over every sync-enabled project.
    ///
    /// Returns the run logs of all (link, module) passes that were
    /// attempted. A project whose pass fails outright is logged and
    /// skipped; the remaining projects still sync.
    #[tracing::instrument(skip(self))]
    pub async fn sync_all_projects(&self, trigger: SyncTrigger) -> anyhow::Result<Vec<RunLog>> {
        let projects = self.store.list_sync_enabled_projects().await?;
        let mut logs = Vec::new();

        for project in projects {
            match self.sync_project(&project.id, trigger).await {
                Ok(mut project_logs) => logs.append(&mut project_logs),
                Err(e) => {
                    tracing::error!(project_id = %project.id, error = %e, "Project sync pass failed");
                }
            }
        }

        Ok(logs)
    }

    /// Runs one sync pass over all enabled links of one project.
    #[tracing::instrument(skip(self))]
    pub async fn sync_project(
        &self,
        project_id: &ProjectId,
        trigger: SyncTrigger,
    ) -> anyhow::Result<Vec<RunLog>> {
        let links = self.store.list_links_for_project(project_id).await?;
        let mut logs = Vec::new();

        for module in [SyncModule::Rfi, SyncModule::Submittal] {
            let guard = self
                .guards
                .entry((*project_id, module))
                .or_default()
                .clone();
            let Ok(_lock) = guard.try_lock() else {
                tracing::info!(
                    project_id = %project_id,
                    module = %module,
                    "Sync already in progress, skipping"
                );
                continue;
            };

            let mut all_completed = true;
            let mut ran_any = false;

            for link in links.iter().filter(|l| l.enabled() && l.syncs_module(module)) {
                ran_any = true;
                let log = self.sync_link_module(link, module, trigger).await;
                if !matches!(log.status(), RunStatus::Completed) {
                    all_completed = false;
                }
                logs.push(log);
            }

            // The cursor only advances after a fully successful pass, so
            // an aborted listing is retried from the previous position.
            if ran_any && all_completed {
                let cursor = SyncCursor::at(*project_id, module, Utc::now());
                if let Err(e) = self.store.save_cursor(&cursor).await {
                    tracing::warn!(error = %e, "Failed to save sync cursor");
                }
            }
        }

        Ok(logs)
    }

    /// Syncs one module over one link, producing a run log.
    async fn sync_link_module(
        &self,
        link: &ExternalProjectLink,
        module: SyncModule,
        trigger: SyncTrigger,
    ) -> RunLog {
        let mut log = RunLog::start(*link.project_id(), *link.id(), module, trigger);
        if let Err(e) = self.store.save_run_log(&log).await {
            tracing::warn!(error = %e, "Failed to save run log");
        }

        let items = match self.platform.list_items(link, module).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(
                    link_id = %link.id(),
                    module = %module,
                    error = %e,
                    "Listing failed, aborting run"
                );
                log.fail(e.to_string());
                self.finish_run(link, &log).await;
                return log;
            }
        };

        for item in &items {
            log.item_processed();
            match self.process_item(link, module, item).await {
                Ok(ItemOutcome::Created) => log.item_created(),
                Ok(ItemOutcome::Updated { changed: true }) => log.item_updated(),
                Ok(ItemOutcome::Updated { changed: false }) => {}
                Err(e) => {
                    tracing::warn!(
                        link_id = %link.id(),
                        module = %module,
                        external_id = %item.external_id,
                        error = %e,
                        "Item failed, continuing with remaining items"
                    );
                    log.record_error(format!("item {}: {e}", item.external_id));
                }
            }
        }

        log.complete();
        self.finish_run(link, &log).await;

        tracing::info!(
            link_id = %link.id(),
            module = %module,
            processed = log.items_processed(),
            created = log.items_created(),
            updated = log.items_updated(),
            errors = log.errors().len(),
            "Sync run finished"
        );
        log
    }

    /// Persists the finished run log and the link's last-run outcome.
    async fn finish_run(&self, link: &ExternalProjectLink, log: &RunLog) {
        if let Err(e) = self.store.save_run_log(log).await {
            tracing::warn!(error = %e, "Failed to save run log");
        }

        let (status, error) = match log.status() {
            RunStatus::Failed(msg) => (LinkRunStatus::Failed, Some(msg.clone())),
            _ => (LinkRunStatus::Ok, None),
        };
        let mut link = link.clone();
        link.record_run_outcome(status, error, Utc::now());
        if let Err(e) = self.store.save_link(&link).await {
            tracing::warn!(error = %e, "Failed to save link run outcome");
        }
    }

    /// Merges one listed item into its mirror record.
    async fn process_item(
        &self,
        link: &ExternalProjectLink,
        module: SyncModule,
        item: &ExternalItemPayload,
    ) -> anyhow::Result<ItemOutcome> {
        let existing = self
            .store
            .find_record(link.id(), module, &item.external_id)
            .await?;
        let now = Utc::now();

        match (
            merge::merge(link, module, item, existing.as_ref(), now)?,
            existing,
        ) {
            (MergeOutcome::Created(record), _) => {
                self.store.insert_record(&record).await?;
                Ok(ItemOutcome::Created)
            }
            (MergeOutcome::Updated { .. }, None) => {
                anyhow::bail!("merge produced an update without an existing record")
            }
            (
                MergeOutcome::Updated {
                    patch,
                    changed,
                    summary,
                },
                Some(record),
            ) => {
                self.store.apply_patch(record.id(), module, &patch).await?;
                if let Some(delta) = summary.and_then(|s| s.status) {
                    self.history
                        .record_transition(
                            *record.id(),
                            HistoryField::ExternalStatus,
                            delta.old,
                            delta.new.unwrap_or_default(),
                            Actor::Sync,
                        )
                        .await;
                }
                Ok(ItemOutcome::Updated { changed })
            }
        }
    }
}

/// What happened to one listed item
enum ItemOutcome {
    Created,
    Updated { changed: bool },
}
