use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

#[derive(Debug, Default, Clone, Copy)]
pub struct CliSources {
    pub keywords_from_cli: bool,
    pub confirm_frames_from_cli: bool,
    pub poll_interval_from_cli: bool,
    pub grace_iterations_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            keywords_from_cli: value_from_cli(matches, "keywords"),
            confirm_frames_from_cli: value_from_cli(matches, "confirm_frames"),
            poll_interval_from_cli: value_from_cli(matches, "poll_interval_ms"),
            grace_iterations_from_cli: value_from_cli(matches, "grace_iterations"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let matches = CliArgs::command().get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "feedscout",
    about = "Watch a two-column feed and open posts that match keywords",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Directory of screenshots to replay as the captured window
    #[arg(long = "replay-dir", value_name = "DIR")]
    pub replay_dir: PathBuf,

    /// Keyword to look for (repeatable)
    #[arg(long = "keyword", id = "keywords", value_name = "TEXT")]
    pub keywords: Vec<String>,

    /// Processed-signature store file
    #[arg(long = "store", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Directory receiving one JSON record per opened post
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Consecutive analysis passes a candidate must survive before opening
    #[arg(
        long = "confirm-frames",
        id = "confirm_frames",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub confirm_frames: u32,

    /// Delay between captures in milliseconds
    #[arg(
        long = "poll-interval-ms",
        id = "poll_interval_ms",
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    /// Stop after this many loop iterations
    #[arg(long = "max-iterations", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_iterations: Option<u64>,

    /// Analysis passes at startup during which nothing is opened
    #[arg(long = "grace-iterations", id = "grace_iterations", default_value_t = 3)]
    pub grace_iterations: u32,
}
