use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use covreport::config::{Options, ReportArgs};
use covreport::github::{self, PullRequestApi};
use covreport::{cli, logging};

/// covreport: coverage summaries rendered as a pull request comment.
#[derive(Parser)]
#[command(name = "covreport", version, about)]
struct Cli {
    /// Log level: error, warn, info, debug or trace (default: info).
    #[arg(long, global = true, env = "COVREPORT_LOG_LEVEL")]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the coverage report and print it to stdout.
    Report {
        #[command(flatten)]
        args: ReportArgs,

        /// Also write the markup to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Render the coverage report and publish it as a pull request or
    /// commit comment.
    Comment {
        #[command(flatten)]
        args: ReportArgs,

        /// Where to comment: pr, commit, both ("pr,commit") or none.
        #[arg(long)]
        comment_on: Option<String>,

        /// Token for the GitHub API.
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },

    /// Show uncovered line ranges from a coverage-final document.
    Uncovered {
        /// Restrict output to this file (relative to the working directory).
        source_file: Option<String>,

        #[command(flatten)]
        args: ReportArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.unwrap_or(LevelFilter::Info));

    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    let context = github::Context::from_env();

    match cli.command {
        Commands::Report { args, output } => {
            let options = Options::resolve(&args, None, context.as_ref(), &cwd)?;
            apply_log_level(cli.log_level, &options);

            let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
            let client = client_for(context.as_ref(), token);
            let pulls = client.as_ref().map(|c| c as &dyn PullRequestApi);
            let changes = cli::change_source(&options.changes, pulls);

            let markup = cli::cmd_report(&options, changes.as_ref())?;
            if let Some(path) = output {
                std::fs::write(&path, &markup)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            print!("{markup}");
            write_job_summary(&markup);
        }
        Commands::Comment {
            args,
            comment_on,
            github_token,
        } => {
            let options = Options::resolve(&args, comment_on.as_deref(), context.as_ref(), &cwd)?;
            apply_log_level(cli.log_level, &options);

            let token = github_token.filter(|t| !t.is_empty());
            let client = client_for(context.as_ref(), token);
            let markup = {
                let pulls = client.as_ref().map(|c| c as &dyn PullRequestApi);
                let changes = cli::change_source(&options.changes, pulls);
                cli::cmd_report(&options, changes.as_ref())?
            };
            print!("{markup}");
            write_job_summary(&markup);

            if options.comment_on.is_empty() {
                log::info!("Commenting disabled.");
                return Ok(());
            }
            let client = client
                .context("Commenting needs GITHUB_TOKEN and GITHUB_REPOSITORY to be set")?;
            eprint!("{}", cli::cmd_comment(&options, &client, &markup)?);
        }
        Commands::Uncovered { source_file, args } => {
            let options = Options::resolve(&args, None, context.as_ref(), &cwd)?;
            apply_log_level(cli.log_level, &options);
            print!(
                "{}",
                cli::cmd_uncovered(
                    &options.json_final,
                    &options.workspace_root,
                    source_file.as_deref(),
                )?
            );
        }
    }
    Ok(())
}

/// The config file's level applies only when none was given on the command
/// line.
fn apply_log_level(from_cli: Option<LevelFilter>, options: &Options) {
    if from_cli.is_none() {
        if let Some(level) = options.log_level {
            logging::set_level(level);
        }
    }
}

/// Inside GitHub Actions the report also goes to the job summary. A failed
/// write does not stop the run.
fn write_job_summary(markup: &str) {
    if let Some(path) = std::env::var_os("GITHUB_STEP_SUMMARY").filter(|p| !p.is_empty()) {
        if let Err(e) = cli::append_job_summary(Path::new(&path), markup) {
            log::warn!("{e:#}");
        }
    }
}

fn client_for(context: Option<&github::Context>, token: Option<String>) -> Option<github::Client> {
    let context = context?;
    Some(github::Client::new(
        token?,
        context.repo.clone(),
        context.api_url.clone(),
    ))
}
