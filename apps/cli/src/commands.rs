//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use kbsync_core::{SyncOrchestrator, SyncOutcome};
use kbsync_helpcenter::HelpCenterClient;
use kbsync_shared::{
    AppConfig, HelpCenterConfig, NewRevision, SyncSettings, TriggerMode, expand_home, init_config,
    load_config, load_config_from,
};
use kbsync_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// kbsync: mirror knowledge-base pages to help-center articles.
#[derive(Parser)]
#[command(
    name = "kbsync",
    version,
    about = "Mirror knowledge-base pages to help-center articles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.kbsync/kbsync.toml).
    #[arg(long, global = true, env = "KBSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path, overriding `[storage] db_path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create, edit, copy, or delete pages; each fires its sync trigger.
    Page {
        #[command(subcommand)]
        action: PageAction,
    },

    /// Fire a sync trigger for a page directly.
    Sync {
        /// Page ID.
        #[arg(long)]
        page: i64,

        /// Trigger: create, edit, copy, or delete.
        #[arg(long, default_value = "edit")]
        mode: TriggerMode,

        /// Acting user ID recorded on the new revision.
        #[arg(long)]
        user: Option<i64>,
    },

    /// Show a page's revision history.
    History {
        /// Page ID.
        #[arg(long)]
        page: i64,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Page subcommands.
#[derive(Subcommand)]
pub(crate) enum PageAction {
    /// Create a page with its first revision, then sync.
    Create {
        #[arg(long)]
        id: i64,
        /// Page kind; only the configured KB kind is synchronized.
        #[arg(long)]
        kind: String,
        #[arg(long)]
        title: String,
        /// JSON file holding the page content object.
        #[arg(long)]
        content: PathBuf,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Append a revision to a page, then sync.
    Edit {
        #[arg(long)]
        id: i64,
        /// JSON file holding the new page content object.
        #[arg(long)]
        content: PathBuf,
        #[arg(long)]
        user: Option<i64>,
        /// Mark the revision as submitted for moderation.
        #[arg(long)]
        submit: bool,
        /// Scheduled publish time (RFC 3339).
        #[arg(long)]
        go_live_at: Option<DateTime<Utc>>,
    },
    /// Copy a page, then sync the copy.
    Copy {
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
        /// Title of the copy (defaults to the source title).
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Sync the deletion, then delete the page.
    Delete {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        user: Option<i64>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "kbsync=info",
        1 => "kbsync=debug",
        _ => "kbsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::load(cli.config.as_deref(), cli.db)?;

    match cli.command {
        Command::Page { action } => match action {
            PageAction::Create {
                id,
                kind,
                title,
                content,
                user,
            } => cmd_page_create(&ctx, id, &kind, &title, &content, user).await,
            PageAction::Edit {
                id,
                content,
                user,
                submit,
                go_live_at,
            } => cmd_page_edit(&ctx, id, &content, user, submit, go_live_at).await,
            PageAction::Copy {
                from,
                to,
                title,
                user,
            } => cmd_page_copy(&ctx, from, to, title.as_deref(), user).await,
            PageAction::Delete { id, user } => cmd_page_delete(&ctx, id, user).await,
        },
        Command::Sync { page, mode, user } => cmd_sync(&ctx, page, mode, user).await,
        Command::History { page } => cmd_history(&ctx, page).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&ctx),
        },
    }
}

/// Resolved config shared by all commands.
struct Context {
    config: AppConfig,
    db_path: PathBuf,
}

impl Context {
    fn load(config_path: Option<&Path>, db_override: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        let db_path = match db_override {
            Some(path) => path,
            None => expand_home(&config.storage.db_path)?,
        };
        Ok(Self { config, db_path })
    }

    /// Open storage and wire up the orchestrator.
    async fn orchestrator(&self) -> Result<SyncOrchestrator> {
        let settings = SyncSettings::from(&self.config);

        // Outside production nothing is sent, so a missing token is fine.
        let helpcenter = if settings.production {
            HelpCenterConfig::resolve(&self.config)?
        } else {
            let token = std::env::var(&self.config.helpcenter.token_env).unwrap_or_default();
            HelpCenterConfig::from_section(&self.config.helpcenter, token)?
        };

        let client = HelpCenterClient::new(helpcenter)?;
        let storage = Storage::open(&self.db_path).await?;
        Ok(SyncOrchestrator::new(storage, client, settings))
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_page_create(
    ctx: &Context,
    id: i64,
    kind: &str,
    title: &str,
    content_path: &Path,
    user: Option<i64>,
) -> Result<()> {
    let content = read_content(content_path)?;
    let sync = ctx.orchestrator().await?;

    sync.storage().insert_page(id, kind, title).await?;
    sync.storage()
        .create_revision(
            id,
            &NewRevision {
                content,
                user_id: user,
                submitted_for_moderation: false,
                go_live_at: None,
            },
        )
        .await?;
    info!(page_id = id, kind, "page created");
    println!("Page {id} created.");

    fire(&sync, TriggerMode::OnCreate, id, user).await
}

async fn cmd_page_edit(
    ctx: &Context,
    id: i64,
    content_path: &Path,
    user: Option<i64>,
    submit: bool,
    go_live_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let content = read_content(content_path)?;
    let sync = ctx.orchestrator().await?;

    if sync.storage().get_page(id).await?.is_none() {
        return Err(eyre!("page {id} does not exist"));
    }
    let revision = sync
        .storage()
        .create_revision(
            id,
            &NewRevision {
                content,
                user_id: user,
                submitted_for_moderation: submit,
                go_live_at,
            },
        )
        .await?;
    info!(page_id = id, revision_id = revision.id, "page edited");
    println!("Page {id} saved as revision {}.", revision.id);

    fire(&sync, TriggerMode::OnEdit, id, user).await
}

async fn cmd_page_copy(
    ctx: &Context,
    from: i64,
    to: i64,
    title: Option<&str>,
    user: Option<i64>,
) -> Result<()> {
    let sync = ctx.orchestrator().await?;
    sync.storage().copy_page(from, to, title, user).await?;
    info!(source_id = from, dest_id = to, "page copied");
    println!("Page {from} copied to {to}.");

    fire(&sync, TriggerMode::OnCopy, to, user).await
}

async fn cmd_page_delete(ctx: &Context, id: i64, user: Option<i64>) -> Result<()> {
    let sync = ctx.orchestrator().await?;
    if sync.storage().get_page(id).await?.is_none() {
        return Err(eyre!("page {id} does not exist"));
    }

    // The trigger runs before deletion; its failure does not block the delete.
    let synced = fire(&sync, TriggerMode::OnDelete, id, user).await;

    sync.storage().delete_page(id).await?;
    info!(page_id = id, "page deleted");
    println!("Page {id} deleted.");

    synced
}

async fn cmd_sync(ctx: &Context, page: i64, mode: TriggerMode, user: Option<i64>) -> Result<()> {
    let sync = ctx.orchestrator().await?;
    fire(&sync, mode, page, user).await
}

async fn cmd_history(ctx: &Context, page: i64) -> Result<()> {
    let storage = Storage::open_readonly(&ctx.db_path).await?;
    let page_record = storage
        .get_page(page)
        .await?
        .ok_or_else(|| eyre!("page {page} does not exist"))?;
    let revisions = storage.list_revisions(page).await?;

    println!();
    println!("  Page {} ({}): {}", page_record.id, page_record.kind, page_record.title);
    println!();
    println!(
        "  {:>6}  {:<25}  {:>6}  {:>12}  {:<6}  {:<9}",
        "REV", "CREATED", "USER", "ARTICLE", "ACTIVE", "SUBMITTED"
    );
    for rev in &revisions {
        let user = rev
            .user_id
            .map_or_else(|| "-".to_string(), |u| u.to_string());
        let article = rev
            .content
            .get("knowledge_base_id")
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        let active = rev
            .content
            .get("kb_active")
            .and_then(serde_json::Value::as_bool)
            .map_or("-", |a| if a { "yes" } else { "no" });
        println!(
            "  {:>6}  {:<25}  {:>6}  {:>12}  {:<6}  {:<9}",
            rev.id,
            rev.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            user,
            article,
            active,
            if rev.submitted_for_moderation { "yes" } else { "no" },
        );
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(ctx: &Context) -> Result<()> {
    let toml_str = toml::to_string_pretty(&ctx.config)?;
    println!("{toml_str}");
    println!("# database: {}", ctx.db_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fire a trigger and print what happened. A sync failure is returned
/// after the page action it followed has already been persisted.
async fn fire(
    sync: &SyncOrchestrator,
    mode: TriggerMode,
    page_id: i64,
    user: Option<i64>,
) -> Result<()> {
    let outcome = sync
        .handle(mode, page_id, user)
        .await
        .wrap_err_with(|| format!("help center sync ({mode}) failed for page {page_id}"))?;

    match outcome {
        SyncOutcome::Skipped { reason } => println!("  Sync skipped: {reason}"),
        SyncOutcome::Synced {
            action,
            fields,
            revision_id,
        } => {
            println!("  Sync:     {action}");
            println!("  Article:  {}", fields.remote_article_id);
            println!("  Revision: {revision_id}");
        }
    }
    Ok(())
}

/// Read a page content object from a JSON file.
fn read_content(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read content file '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("'{}' is not valid JSON", path.display()))?;
    if !value.is_object() {
        return Err(eyre!(
            "'{}' must contain a JSON object, not {value}",
            path.display()
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_sync_command() {
        let cli = Cli::try_parse_from(["kbsync", "sync", "--page", "12", "--mode", "copy"])
            .expect("parse");
        match cli.command {
            Command::Sync { page, mode, user } => {
                assert_eq!(page, 12);
                assert_eq!(mode, TriggerMode::OnCopy);
                assert_eq!(user, None);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let result = Cli::try_parse_from(["kbsync", "sync", "--page", "1", "--mode", "publish"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_edit_with_go_live() {
        let cli = Cli::try_parse_from([
            "kbsync",
            "page",
            "edit",
            "--id",
            "3",
            "--content",
            "page.json",
            "--submit",
            "--go-live-at",
            "2026-11-01T08:00:00Z",
        ])
        .expect("parse");
        match cli.command {
            Command::Page {
                action:
                    PageAction::Edit {
                        submit, go_live_at, ..
                    },
            } => {
                assert!(submit);
                assert_eq!(
                    go_live_at.map(|t| t.to_rfc3339()),
                    Some("2026-11-01T08:00:00+00:00".to_string())
                );
            }
            _ => panic!("expected page edit"),
        }
    }

    #[test]
    fn content_must_be_an_object() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("kbsync_cli_{}.json", Uuid::now_v7()));
        std::fs::write(&good, r#"{"knowledge_base_id": 0}"#).unwrap();
        assert!(read_content(&good).is_ok());

        let bad = dir.join(format!("kbsync_cli_{}.json", Uuid::now_v7()));
        std::fs::write(&bad, "[1, 2]").unwrap();
        assert!(read_content(&bad).is_err());

        assert!(read_content(&dir.join("kbsync_missing_file.json")).is_err());
    }
}
