use crate::auth::CredentialResolver;
use crate::config::{Config, DEFAULT_CONFIG_FILE, ENV_CONFIG_PATH, RunOptions};
use crate::error::GitMirrorError;
use crate::git::Git2Transport;
use crate::logging;
use crate::mirror::MirrorExecutor;
use crate::runner::{self, BatchRunner};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "git-mirror", author, version, about)]
#[command(
    long_about = "Git Mirror mirrors a target repository to a source repository.\nIt supports token, basic, ssh and anonymous authentication and is configured via a YAML file."
)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Config file path
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        env = ENV_CONFIG_PATH,
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror repositories according to configuration
    Mirror(MirrorArgs),
    /// Validate configuration file
    Validate,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MirrorArgs {
    /// Exit with a non-zero status when any mirror job fails
    #[arg(long)]
    pub fail_on_error: bool,
}

pub fn run() -> Result<()> {
    run_with(Cli::parse())
}

pub fn run_with(cli: Cli) -> Result<()> {
    logging::init(cli.verbose);

    match &cli.command {
        Commands::Mirror(args) => handle_mirror(&cli.config, cli.verbose, args),
        Commands::Validate => handle_validate(&cli.config),
    }
}

fn handle_mirror(config_path: &Path, verbose: bool, args: &MirrorArgs) -> Result<()> {
    let config = Config::load(config_path).map_err(GitMirrorError::from)?;
    let options = RunOptions {
        verbose,
        fail_on_error: args.fail_on_error,
    };

    if options.verbose {
        println!(
            "{}",
            t!(
                "mirror.loaded",
                count = config.mirrors().len().to_string()
            )
        );
    }

    let executor = MirrorExecutor::new(
        Git2Transport::new(options.verbose),
        CredentialResolver::new(),
        options,
    );
    let summary = BatchRunner::new(executor, options).run(config.mirrors());
    runner::print_summary(&summary);

    if options.fail_on_error && !summary.is_success() {
        return Err(GitMirrorError::JobsFailed {
            failed: summary.failed(),
            total: summary.total(),
        }
        .into());
    }
    Ok(())
}

fn handle_validate(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path).map_err(GitMirrorError::from)?;

    println!(
        "{}",
        t!(
            "validate.valid",
            path = config_path.display().to_string()
        )
    );
    println!(
        "{}",
        t!(
            "validate.found",
            count = config.mirrors().len().to_string()
        )
    );
    for mirror in config.mirrors() {
        println!(
            "{}",
            t!("validate.mirror", index = mirror.index.to_string())
        );
        println!(
            "{}",
            t!(
                "validate.target",
                url = mirror.target.url.as_str(),
                method = mirror.target.auth.method().as_str()
            )
        );
        println!(
            "{}",
            t!(
                "validate.source",
                url = mirror.source.url.as_str(),
                method = mirror.source.auth.method().as_str()
            )
        );
    }
    Ok(())
}
