use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "pipescope")]
#[command(about = "A terminal dashboard for browsing and driving pipelines, builds and their logs")]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write debug logs to the log file
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Where logs go when --debug or RUST_LOG is set
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Record every fetched resource into DIR
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "replay")]
    pub record: Option<PathBuf>,

    /// Serve a session previously recorded into DIR
    #[arg(long, global = true, value_name = "DIR")]
    pub replay: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Show pipelines, optionally filtered by name and tags
    Run {
        /// Only pipelines whose name contains this
        name_filter: Option<String>,

        /// Only pipelines carrying every tag, e.g. --tags team=platform,env=prod
        #[arg(short, long, value_delimiter = ',', value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Use the filters of a configured profile
    Load {
        profile: String,

        /// Additional filter applied to the listing
        extra_filter: Option<String>,
    },
    /// List configured profiles
    Profiles,
}

pub fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}
