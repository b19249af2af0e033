use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "dirsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of directory objects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ~/.config/dirsync/dirsync.toml)
    #[arg(short, long, global = true, env = "DIRSYNC_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Preview what apply would change
    Plan(PlanArgs),

    /// Make the directory match the configuration
    Apply(ApplyArgs),

    /// Delete every configured object that has an id
    Destroy(ApplyArgs),

    /// Print a remote object and its relations as JSON
    Show {
        /// Resource type (group, application, service_principal, user,
        /// conditional_access_policy, domain)
        kind: String,

        /// Object ID
        id: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Only plan a resource type or a single resource (e.g. "group" or "group.admins")
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only apply a resource type or a single resource (e.g. "group" or "group.admins")
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show what would change without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of objects reconciled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from(["dirsync", "-vv", "apply", "--yes", "-j", "2", "-t", "group.admins"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.yes);
                assert!(!args.dry_run);
                assert_eq!(args.jobs, 2);
                assert_eq!(args.target.as_deref(), Some("group.admins"));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["dirsync", "plan", "--config", "~/dirs.toml"]);
        assert_eq!(cli.config.as_deref(), Some("~/dirs.toml"));
        assert!(matches!(cli.command, Command::Plan(PlanArgs { target: None })));
    }
}
