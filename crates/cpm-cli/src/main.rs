//! cpm-migrate - move MSBuild package versions into Directory.Packages.props

use anyhow::Context;
use clap::Parser;
use cpm_pkg::MissingVersionPolicy;
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod logging;
mod persist;
mod run;

use config::Config;
use run::{RunError, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "cpm-migrate")]
#[command(version = cpm_core::VERSION)]
#[command(
    about = "Migrate an MSBuild solution to central package management",
    long_about = None
)]
struct Cli {
    /// Solution file (.sln) or solution directory
    #[arg(short, long, value_name = "SOLUTION")]
    solution: PathBuf,

    /// Additional descriptor glob, relative to the solution root (repeatable)
    #[arg(short = 'p', long = "pattern", value_name = "GLOB")]
    patterns: Vec<String>,

    /// Additional exclude glob, relative to the solution root (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,

    /// Leave nuget.config untouched
    #[arg(long)]
    no_restrict_sources: bool,

    /// How references without a version are treated: distinct, ignore or fail
    #[arg(long, value_name = "POLICY")]
    missing_version: Option<MissingVersionPolicy>,

    /// Configuration file (defaults to cpm-migrate.toml at the solution root)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Plan and report without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Print the migration report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Increase log detail (-v debug, -vv trace); CPM_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self, config: Config) -> RunOptions {
        RunOptions {
            patterns: self.patterns.clone(),
            excludes: self.excludes.clone(),
            dry_run: self.dry_run,
            ..RunOptions::new(&self.solution)
        }
        .with_config(config, self.missing_version, self.no_restrict_sources)
    }
}

fn execute(cli: &Cli) -> Result<(), RunError> {
    let root = config::solution_root(&cli.solution);
    let config = Config::locate(cli.config.as_deref(), &root)?;
    let result = run::run(&cli.options(config))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result.report)
            .context("Failed to serialize the migration report")?;
        println!("{json}");
    } else {
        result.print_summary();
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(exit_code = err.exit_code(), "migration failed");
            eprintln!("error: {err:#}");
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_all_flags() {
        let cli = Cli::try_parse_from([
            "cpm-migrate",
            "-s",
            "App.sln",
            "-p",
            "**/*.fsproj",
            "--pattern",
            "**/*.vbproj",
            "-x",
            "legacy/**",
            "--no-restrict-sources",
            "--missing-version",
            "fail",
            "--config",
            "ci.toml",
            "--dry-run",
            "--json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.solution, PathBuf::from("App.sln"));
        assert_eq!(cli.patterns, vec!["**/*.fsproj", "**/*.vbproj"]);
        assert_eq!(cli.excludes, vec!["legacy/**"]);
        assert!(cli.no_restrict_sources);
        assert_eq!(cli.missing_version, Some(MissingVersionPolicy::Fail));
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));
        assert!(cli.dry_run);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["cpm-migrate", "--solution", "."]).unwrap();
        let options = cli.options(Config::default());
        assert!(options.restrict_sources);
        assert!(!options.dry_run);
        assert_eq!(options.missing_version, MissingVersionPolicy::Distinct);
        assert!(options.patterns.is_empty());
    }

    #[test]
    fn solution_is_required() {
        let err = Cli::try_parse_from(["cpm-migrate", "--dry-run"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["cpm-migrate", "-s", ".", "--missing-version", "maybe"]).is_err());
    }
}
