//! Sync decision engine.
//!
//! A pure function of the page's knowledge-base fields and the lifecycle
//! trigger. States are keyed by `(active, remote_article_id == 0)`:
//!
//! | active | id == 0 | state                | action          |
//! |--------|---------|----------------------|-----------------|
//! | true   | true    | unpublished, new     | create          |
//! | true   | false   | unpublished, exists  | update (create on copy) |
//! | false  | true    | retired              | no-op           |
//! | false  | false   | retired, exists      | delete          |
//!
//! A delete trigger overrides `active`: the article is removed if one exists.

use kbsync_shared::{KnowledgeBaseFields, TriggerMode};

/// The remote operation a trigger calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Create a new remote article.
    Create,
    /// Push the page's title and body to an existing article.
    Update { article_id: u64 },
    /// Remove the remote article.
    Delete { article_id: u64 },
    /// Nothing to do remotely.
    NoOp,
}

impl SyncAction {
    pub fn name(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update { .. } => "update",
            SyncAction::Delete { .. } => "delete",
            SyncAction::NoOp => "noop",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Update { article_id } | SyncAction::Delete { article_id } => {
                write!(f, "{} article {article_id}", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// What a successful remote call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEffect {
    /// The help center assigned this id to a new article.
    Created(u64),
    Updated,
    Deleted,
    Nothing,
}

/// Choose the remote action for `fields` under `mode`.
///
/// Never yields `Update` or `Delete` for article id 0.
pub fn decide(fields: &KnowledgeBaseFields, mode: TriggerMode) -> SyncAction {
    let id = fields.remote_article_id;

    if mode == TriggerMode::OnDelete {
        return if id != 0 {
            SyncAction::Delete { article_id: id }
        } else {
            SyncAction::NoOp
        };
    }

    if fields.active {
        // A copy carries the source's id but must get its own article.
        if id == 0 || mode == TriggerMode::OnCopy {
            SyncAction::Create
        } else {
            SyncAction::Update { article_id: id }
        }
    } else if id != 0 {
        SyncAction::Delete { article_id: id }
    } else {
        SyncAction::NoOp
    }
}

/// Apply the outcome of a successful remote call to the page's fields.
pub fn apply_effect(fields: &mut KnowledgeBaseFields, effect: RemoteEffect) {
    match effect {
        RemoteEffect::Created(id) => fields.remote_article_id = id,
        RemoteEffect::Deleted => fields.remote_article_id = 0,
        RemoteEffect::Updated | RemoteEffect::Nothing => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(active: bool, id: u64) -> KnowledgeBaseFields {
        KnowledgeBaseFields {
            active,
            remote_article_id: id,
            title: "Exporting invoices".into(),
            body: "<p>Open Billing, then Export.</p>".into(),
            go_live_at: None,
            submitted_for_moderation: false,
        }
    }

    #[test]
    fn retired_without_article_is_noop_for_every_mode() {
        for mode in TriggerMode::ALL {
            assert_eq!(decide(&fields(false, 0), mode), SyncAction::NoOp, "{mode}");
        }
    }

    #[test]
    fn active_without_article_creates() {
        for mode in [
            TriggerMode::OnCreate,
            TriggerMode::OnEdit,
            TriggerMode::OnCopy,
        ] {
            assert_eq!(decide(&fields(true, 0), mode), SyncAction::Create, "{mode}");
        }
    }

    #[test]
    fn active_with_article_updates_unless_copied() {
        for mode in [TriggerMode::OnCreate, TriggerMode::OnEdit] {
            assert_eq!(
                decide(&fields(true, 42), mode),
                SyncAction::Update { article_id: 42 },
                "{mode}"
            );
        }
        assert_eq!(
            decide(&fields(true, 42), TriggerMode::OnCopy),
            SyncAction::Create
        );
    }

    #[test]
    fn retired_with_article_deletes() {
        for mode in TriggerMode::ALL {
            assert_eq!(
                decide(&fields(false, 42), mode),
                SyncAction::Delete { article_id: 42 },
                "{mode}"
            );
        }
    }

    #[test]
    fn delete_trigger_overrides_active() {
        assert_eq!(
            decide(&fields(true, 42), TriggerMode::OnDelete),
            SyncAction::Delete { article_id: 42 }
        );
        // Nothing to delete
        assert_eq!(
            decide(&fields(true, 0), TriggerMode::OnDelete),
            SyncAction::NoOp
        );
    }

    #[test]
    fn never_targets_article_zero() {
        for active in [true, false] {
            for mode in TriggerMode::ALL {
                match decide(&fields(active, 0), mode) {
                    SyncAction::Update { .. } | SyncAction::Delete { .. } => {
                        panic!("targeted id 0 with active={active} mode={mode}")
                    }
                    SyncAction::Create | SyncAction::NoOp => {}
                }
            }
        }
    }

    #[test]
    fn effects_mutate_article_id() {
        let mut f = fields(true, 0);
        apply_effect(&mut f, RemoteEffect::Created(99));
        assert_eq!(f.remote_article_id, 99);

        apply_effect(&mut f, RemoteEffect::Updated);
        assert_eq!(f.remote_article_id, 99);

        apply_effect(&mut f, RemoteEffect::Deleted);
        assert_eq!(f.remote_article_id, 0);

        let before = f.clone();
        apply_effect(&mut f, RemoteEffect::Nothing);
        assert_eq!(f, before);
    }

    #[test]
    fn action_display() {
        assert_eq!(SyncAction::Create.to_string(), "create");
        assert_eq!(
            SyncAction::Delete { article_id: 7 }.to_string(),
            "delete article 7"
        );
    }
}
