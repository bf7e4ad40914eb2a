//! CLI argument definitions for the Kinship application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use kinship_core::types::AccessRole;

/// Kinship: build family trees, export them, and merge trees that share
/// ancestors.
#[derive(Parser, Debug)]
#[command(name = "kinship", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the SQLite database and exports.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive add-member dialogue over stdin.
    Chat {
        #[arg(short, long)]
        user: i64,
        /// Display name recorded on /start.
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Print a tree as text.
    Tree(TreeArgs),
    /// List the trees a user can access.
    Trees {
        #[arg(short, long)]
        user: i64,
    },
    /// Export a tree to PDF.
    Export {
        #[command(flatten)]
        target: TreeArgs,
        /// Output file. Defaults to `<data-dir>/exports/<tree>.pdf`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    #[command(subcommand)]
    Merge(MergeCommand),
    #[command(subcommand)]
    Invite(InviteCommand),
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[arg(short, long)]
    pub user: i64,
    /// Tree id. Defaults to the user's first tree.
    #[arg(short, long)]
    pub tree: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
pub enum MergeCommand {
    /// Ask to fold SOURCE into TARGET.
    Request {
        #[arg(short, long)]
        user: i64,
        #[arg(long)]
        source: Uuid,
        #[arg(long)]
        target: Uuid,
        /// Who must approve. Defaults to the requester.
        #[arg(long)]
        approver: Option<i64>,
    },
    Approve {
        #[arg(short, long)]
        user: i64,
        #[arg(short, long = "merge")]
        merge_id: Uuid,
    },
    Reject {
        #[arg(short, long)]
        user: i64,
        #[arg(short, long = "merge")]
        merge_id: Uuid,
    },
    /// Merges waiting for the user's decision.
    Pending {
        #[arg(short, long)]
        user: i64,
    },
    /// People two trees have in common.
    Shared {
        #[arg(long)]
        source: Uuid,
        #[arg(long)]
        target: Uuid,
    },
}

impl MergeCommand {
    /// The approver for a request: the explicit one, or the requester.
    pub fn approver(&self) -> Option<i64> {
        match self {
            MergeCommand::Request { user, approver, .. } => Some(approver.unwrap_or(*user)),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum InviteCommand {
    Create {
        #[arg(short, long)]
        user: i64,
        #[arg(short, long)]
        tree: Uuid,
        /// Role granted on redemption: viewer, editor or admin.
        #[arg(short, long, default_value = "viewer")]
        role: AccessRole,
    },
    Redeem {
        #[arg(short, long)]
        user: i64,
        token: String,
    },
    /// Delete expired invites.
    Purge,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > KINSHIP_CONFIG env var > ~/.kinship/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("KINSHIP_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --data-dir flag > config file value. `None` if not overridden.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".kinship").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".kinship").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}
