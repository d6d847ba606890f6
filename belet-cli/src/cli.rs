use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "belet",
    author,
    version,
    about = "Browse the belet catalog and download its videos",
    long_about = None
)]
pub struct Args {
    /// Configuration file (TOML). Defaults to <config dir>/belet/config.toml
    #[arg(short, long, global = true, env = "BELET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Credential file, overrides the configured one
    #[arg(long, global = true, env = "BELET_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format for listings
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with a phone number
    Login {
        /// +993xxxxxxxx, 993xxxxxxxx, 8xxxxxxxx or xxxxxxxx
        phone: String,

        /// Verification code; prompted for when omitted
        #[arg(long)]
        code: Option<String>,
    },

    /// Sign out and delete stored credentials
    Logout,

    /// Show session and tooling status
    Status,

    /// Show a movie or series
    Item {
        /// Numeric id or player URL
        id: String,

        /// Also list the episodes of this season
        #[arg(short, long)]
        season: Option<u64>,
    },

    /// List homepage sections
    Home {
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Number of sections
        #[arg(long, default_value_t = 3)]
        limit: u32,

        /// Items per section
        #[arg(long, default_value_t = 12)]
        home_limit: u32,

        #[arg(long, default_value_t = 0)]
        type_id: u32,
    },

    /// Search the catalog
    Search {
        text: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        order: Option<String>,

        /// Filter as <query_name>=<id>, repeatable (see `belet filters`)
        #[arg(short, long = "filter", value_name = "NAME=ID")]
        filters: Vec<String>,

        /// Sort as <name_param>=<id>
        #[arg(long, value_name = "PARAM=ID")]
        sort: Option<String>,
    },

    /// Show the available search filters
    Filters,

    /// Download a manifest URL, catalog id or player URL
    Download {
        source: String,

        /// Output file; derived from the source URL when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record watch progress for an item
    Watch {
        /// Numeric id or player URL
        item: String,

        /// Seconds watched
        seconds: u64,

        #[arg(short, long)]
        season: Option<u64>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_download() {
        let args = Args::parse_from([
            "belet",
            "--verbose",
            "download",
            "https://cdn/v/master.m3u8",
            "-o",
            "movie.mp4",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Download { source, output } => {
                assert_eq!(source, "https://cdn/v/master.m3u8");
                assert_eq!(output, Some(PathBuf::from("movie.mp4")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repeated_filters() {
        let args = Args::parse_from(["belet", "search", "war", "-f", "genres=4", "-f", "years=2020"]);
        match args.command {
            Commands::Search { filters, page, .. } => {
                assert_eq!(filters, vec!["genres=4", "years=2020"]);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
