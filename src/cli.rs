//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use sheaf::{config, site::DEFAULT_SRC};
use std::path::PathBuf;

/// sheaf static site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Source directory holding pages, layouts, `_data/` and `_site.yml`
    #[arg(short, long, global = true, default_value = DEFAULT_SRC)]
    pub src: PathBuf,

    /// Output directory (overrides `dest` in `_site.yml`)
    #[arg(short, long, global = true)]
    pub dest: Option<PathBuf>,

    /// Environment block of `_site.yml` to merge (default: `SHEAF_ENV`,
    /// then `production` for build and `development` for watch)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Watch commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Also render pages marked `draft: true`
    #[arg(long)]
    pub drafts: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site once
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, then rebuild on every change until Ctrl-C
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

impl Commands {
    pub const fn build_args(&self) -> &BuildArgs {
        match self {
            Self::Build { build_args } | Self::Watch { build_args } => build_args,
        }
    }

    const fn default_env(&self) -> &'static str {
        match self {
            Self::Build { .. } => "production",
            Self::Watch { .. } => config::defaults::ENV,
        }
    }
}

impl Cli {
    /// Active environment: `--env`, then `SHEAF_ENV`, then the command's
    /// default.
    pub fn env(&self) -> String {
        self.env
            .clone()
            .or_else(|| std::env::var(config::ENV_VAR).ok().filter(|env| !env.is_empty()))
            .unwrap_or_else(|| self.command.default_env().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sheaf").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_build_defaults() {
        let cli = parse(&["build"]);
        assert_eq!(cli.src, PathBuf::from("src"));
        assert!(cli.dest.is_none());
        assert!(!cli.command.build_args().drafts);
        assert!(matches!(cli.command, Commands::Build { .. }));
        assert_eq!(cli.command.default_env(), "production");
    }

    #[test]
    fn test_watch_with_options() {
        let cli = parse(&["watch", "--drafts", "--src", "site", "--dest", "out", "--env", "staging"]);
        assert!(matches!(cli.command, Commands::Watch { .. }));
        assert!(cli.command.build_args().drafts);
        assert_eq!(cli.src, PathBuf::from("site"));
        assert_eq!(cli.dest, Some(PathBuf::from("out")));
        assert_eq!(cli.env(), "staging");
        assert_eq!(cli.command.default_env(), "development");
    }

    #[test]
    fn test_global_args_before_subcommand() {
        let cli = parse(&["-s", "docs", "build", "--drafts"]);
        assert_eq!(cli.src, PathBuf::from("docs"));
        assert!(cli.command.build_args().drafts);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["sheaf", "serve"]).is_err());
    }
}
