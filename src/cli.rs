use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dscrun")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Apply package manifests through a PowerShell DSC resource", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge every package in a manifest (DSC Set)
    Apply(ApplyArgs),

    /// Check whether every package is in the desired state (DSC Test)
    Test(RunArgs),

    /// Read the current state of every package (DSC Get)
    Get(RunArgs),

    /// Load and validate a manifest without touching the engine
    Validate(ValidateArgs),

    /// Check the engine, module directory and search path
    Doctor,

    /// Show or initialize the dscrun config file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommand>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Path to the package manifest (JSON)
    pub manifest: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Keep invoking after a package reports errors
    #[arg(long)]
    pub continue_on_error: bool,

    /// Print the invocations without starting the engine
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Hand the manifest file to the helper module's Start-WinDSC
    #[arg(long, conflicts_with_all = ["dry_run", "continue_on_error"])]
    pub delegate: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the package manifest (JSON)
    pub manifest: PathBuf,

    /// Keep invoking after a package reports errors
    #[arg(long)]
    pub continue_on_error: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the package manifest (JSON)
    pub manifest: PathBuf,

    /// Print the normalized manifest JSON
    #[arg(short, long)]
    pub print: bool,

    /// Write the normalized manifest to a file
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy)]
pub enum ConfigCommand {
    /// Show the effective config and where it came from
    Show,

    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::parse_from([
            "dscrun",
            "-vv",
            "apply",
            "packages.json",
            "--yes",
            "--continue-on-error",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.manifest, PathBuf::from("packages.json"));
                assert!(args.yes);
                assert!(args.continue_on_error);
                assert!(!args.dry_run);
                assert!(!args.delegate);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_delegate_conflicts_with_dry_run() {
        let result = Cli::try_parse_from(["dscrun", "apply", "p.json", "--delegate", "--dry-run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_without_subcommand() {
        let cli = Cli::parse_from(["dscrun", "config"]);
        assert!(matches!(cli.command, Command::Config { command: None }));
    }
}
