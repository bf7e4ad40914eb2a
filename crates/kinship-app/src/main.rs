//! Kinship application binary - composition root.
//!
//! 1. Parse CLI arguments and install the tracing subscriber
//! 2. Load configuration from TOML
//! 3. Open the SQLite database
//! 4. Run the requested subcommand, or the interactive dialogue

mod cli;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kinship_action::{FamilyService, InviteService, MergeCoordinator};
use kinship_chat::{DialogueOrchestrator, InMemoryDialogueStore};
use kinship_core::config::KinshipConfig;
use kinship_core::error::KinshipError;
use kinship_core::types::UserId;
use kinship_render::{generate_text_tree, TreeExporter};
use kinship_storage::Database;

use cli::{expand_home, CliArgs, Command, InviteCommand, MergeCommand};

struct App {
    config: KinshipConfig,
    data_dir: PathBuf,
    family: Arc<FamilyService>,
    merges: MergeCoordinator,
    invites: InviteService,
    exporter: TreeExporter,
}

impl App {
    fn open(config: KinshipConfig) -> Result<Self, KinshipError> {
        let data_dir = expand_home(&config.general.data_dir);
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("kinship.db");
        let db = Arc::new(Database::new(&db_path)?);
        tracing::info!(path = %db_path.display(), "SQLite database opened");

        let family = Arc::new(FamilyService::new(db.clone(), config.family.clone()));
        Ok(Self {
            merges: MergeCoordinator::new(db.clone()),
            invites: InviteService::new(db, config.invites.clone()),
            exporter: TreeExporter::new(family.clone(), config.render.clone()),
            family,
            data_dir,
            config,
        })
    }

    /// The given tree, or the user's first one. The user must have access.
    fn pick_tree(&self, user: UserId, tree: Option<Uuid>) -> Result<Uuid, KinshipError> {
        let trees = self.family.trees_for_user(user)?;
        match tree {
            Some(id) if trees.iter().any(|(t, _)| t.id == id) => Ok(id),
            Some(id) => Err(KinshipError::Unauthorized(format!(
                "user {} has no access to tree {}",
                user, id
            ))),
            None => trees
                .first()
                .map(|(t, _)| t.id)
                .ok_or_else(|| KinshipError::not_found("tree", format!("for user {}", user))),
        }
    }

    async fn run(&self, command: Command) -> Result<(), Box<dyn Error>> {
        match command {
            Command::Chat { user, name } => self.chat(UserId(user), &name).await?,
            Command::Tree(target) => {
                let user = UserId(target.user);
                let tree_id = self.pick_tree(user, target.tree)?;
                let members = self.family.tree_members(user, tree_id)?;
                print!("{}", generate_text_tree(&members));
            }
            Command::Trees { user } => {
                for (tree, role) in self.family.trees_for_user(UserId(user))? {
                    println!("{}  {:<7} {}", tree.id, role.to_string(), tree.name);
                }
            }
            Command::Export { target, output } => {
                let user = UserId(target.user);
                let tree_id = self.pick_tree(user, target.tree)?;
                let output = output.unwrap_or_else(|| {
                    self.data_dir.join("exports").join(format!("{}.pdf", tree_id))
                });
                let path = self.exporter.generate_tree_pdf(user, tree_id, &output)?;
                println!("{}", path.display());
            }
            Command::Merge(cmd) => self.merge(cmd)?,
            Command::Invite(cmd) => self.invite(cmd)?,
        }
        Ok(())
    }

    fn merge(&self, cmd: MergeCommand) -> Result<(), Box<dyn Error>> {
        let approver = cmd.approver();
        match cmd {
            MergeCommand::Request {
                user,
                source,
                target,
                ..
            } => {
                let approver = UserId(approver.unwrap_or(user));
                let merge = self
                    .merges
                    .request_merge(source, target, UserId(user), approver)?;
                println!("{}", serde_json::to_string_pretty(&merge)?);
            }
            MergeCommand::Approve { user, merge_id } => {
                let outcome = self.merges.approve_merge(merge_id, UserId(user))?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            MergeCommand::Reject { user, merge_id } => {
                let merge = self.merges.reject_merge(merge_id, UserId(user))?;
                println!("{}", serde_json::to_string_pretty(&merge)?);
            }
            MergeCommand::Pending { user } => {
                let pending = self.merges.pending_for(UserId(user))?;
                println!("{}", serde_json::to_string_pretty(&pending)?);
            }
            MergeCommand::Shared { source, target } => {
                for (s, t) in self.merges.shared_ancestors(source, target)? {
                    println!("{} ({:?}): {} <-> {}", s.full_name, s.birth_year, s.id, t.id);
                }
            }
        }
        Ok(())
    }

    fn invite(&self, cmd: InviteCommand) -> Result<(), Box<dyn Error>> {
        match cmd {
            InviteCommand::Create { user, tree, role } => {
                let invite = self.invites.create_invite(tree, role, UserId(user))?;
                println!("{}", serde_json::to_string_pretty(&invite)?);
            }
            InviteCommand::Redeem { user, token } => {
                let grant = self.invites.redeem(&token, UserId(user))?;
                println!("{}", serde_json::to_string_pretty(&grant)?);
            }
            InviteCommand::Purge => {
                let removed = self.invites.purge_expired()?;
                println!("{} expired invites removed", removed);
            }
        }
        Ok(())
    }

    /// Read dialogue messages from stdin until EOF.
    async fn chat(&self, user: UserId, name: &str) -> Result<(), Box<dyn Error>> {
        let store = Arc::new(InMemoryDialogueStore::new(
            self.config.chat.session_timeout_minutes,
        ));
        let orchestrator = DialogueOrchestrator::new(self.family.clone(), store, &self.config.family);

        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let greeting = orchestrator.handle_message(user, name, "/start")?;
        stdout.write_all(format!("{}\n> ", greeting).as_bytes()).await?;
        stdout.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let text = match orchestrator.handle_message(user, name, &line) {
                Ok(reply) => reply.to_string(),
                Err(e) => {
                    tracing::debug!(%user, error = %e, "Message rejected");
                    e.to_string()
                }
            };
            stdout.write_all(format!("{}\n> ", text).as_bytes()).await?;
            stdout.flush().await?;
        }
        stdout.write_all(b"\n").await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();

    // Peek at the file for its log level; the logged load happens below.
    let configured_level = KinshipConfig::load(&config_file)
        .ok()
        .map(|c| c.general.log_level);
    let level = args
        .resolve_log_level()
        .or(configured_level)
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Kinship v{}", env!("CARGO_PKG_VERSION"));

    let mut config = if config_file.exists() {
        KinshipConfig::load_or_default(&config_file)
    } else {
        tracing::info!(path = %config_file.display(), "No config file, using defaults");
        KinshipConfig::default()
    };
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    let app = match App::open(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open data directory");
            return Err(e.into());
        }
    };

    app.run(args.command).await
}
