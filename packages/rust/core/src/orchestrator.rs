//! Sync orchestration.
//!
//! One entry point per lifecycle trigger:
//!
//! 1. Load the page snapshot (skip quietly when sync does not apply)
//! 2. Decide the remote action
//! 3. Make at most one help-center call
//! 4. On success, apply the outcome and append exactly one revision
//!
//! A failed or timed-out call aborts before step 4, so the stored page state
//! never runs ahead of what the help center is known to hold.

use kbsync_helpcenter::HelpCenterClient;
use kbsync_shared::{KbSyncError, KnowledgeBaseFields, Result, SyncSettings, TriggerMode};
use kbsync_storage::Storage;
use tracing::{debug, error, info, instrument};

use crate::decision::{self, RemoteEffect, SyncAction};
use crate::snapshot::PageSnapshot;

/// Result of handling one lifecycle trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Sync does not apply to this page or environment; nothing was written.
    Skipped { reason: String },
    /// The remote call (if any) succeeded and a revision was appended.
    Synced {
        action: SyncAction,
        /// Fields as persisted in the new revision.
        fields: KnowledgeBaseFields,
        revision_id: i64,
    },
}

/// Reconciles pages with their help-center articles.
pub struct SyncOrchestrator {
    storage: Storage,
    client: HelpCenterClient,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(storage: Storage, client: HelpCenterClient, settings: SyncSettings) -> Self {
        Self {
            storage,
            client,
            settings,
        }
    }

    /// The page store this orchestrator reads and appends to.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Handle a lifecycle trigger for `page_id` on behalf of `acting_user`.
    #[instrument(skip(self), fields(mode = %mode))]
    pub async fn handle(
        &self,
        mode: TriggerMode,
        page_id: i64,
        acting_user: Option<i64>,
    ) -> Result<SyncOutcome> {
        let mut snapshot = match PageSnapshot::load(&self.storage, &self.settings, page_id).await {
            Ok(snapshot) => snapshot,
            Err(KbSyncError::NotApplicable { reason }) => {
                debug!(%reason, "sync skipped");
                return Ok(SyncOutcome::Skipped { reason });
            }
            Err(e) => {
                error!(error = %e, "failed to load page state");
                return Err(e);
            }
        };

        let action = decision::decide(&snapshot.fields, mode);
        debug!(
            %action,
            active = snapshot.fields.active,
            article_id = snapshot.fields.remote_article_id,
            "sync action decided"
        );

        let effect = match self.execute(action, &snapshot.fields).await {
            Ok(effect) => effect,
            Err(e) => {
                // Reported for operators; the page keeps its current revision.
                error!(
                    action = action.name(),
                    error = %e,
                    remote = e.is_remote_failure(),
                    "help center sync failed"
                );
                return Err(e);
            }
        };

        decision::apply_effect(&mut snapshot.fields, effect);
        let revision = match snapshot.save(&self.storage, acting_user).await {
            Ok(revision) => revision,
            Err(e) => {
                // The remote call went through; this id needs reconciling by hand.
                error!(
                    action = action.name(),
                    article_id = snapshot.fields.remote_article_id,
                    error = %e,
                    "remote sync succeeded but page state was not saved"
                );
                return Err(e);
            }
        };

        info!(
            action = action.name(),
            article_id = snapshot.fields.remote_article_id,
            revision_id = revision.id,
            "page synced"
        );

        Ok(SyncOutcome::Synced {
            action,
            fields: snapshot.fields,
            revision_id: revision.id,
        })
    }

    /// Make the remote call for `action`.
    async fn execute(
        &self,
        action: SyncAction,
        fields: &KnowledgeBaseFields,
    ) -> Result<RemoteEffect> {
        match action {
            SyncAction::Create => {
                let id = self
                    .client
                    .create_article(&fields.title, &fields.body)
                    .await?;
                Ok(RemoteEffect::Created(id))
            }
            SyncAction::Update { article_id } => {
                ensure_article_id(article_id, "update")?;
                self.client
                    .update_article(article_id, &fields.title, &fields.body)
                    .await?;
                Ok(RemoteEffect::Updated)
            }
            SyncAction::Delete { article_id } => {
                ensure_article_id(article_id, "delete")?;
                self.client.delete_article(article_id).await?;
                Ok(RemoteEffect::Deleted)
            }
            SyncAction::NoOp => Ok(RemoteEffect::Nothing),
        }
    }
}

fn ensure_article_id(article_id: u64, operation: &str) -> Result<()> {
    if article_id == 0 {
        return Err(KbSyncError::inconsistent(format!(
            "refusing to {operation} help center article 0"
        )));
    }
    Ok(())
}
