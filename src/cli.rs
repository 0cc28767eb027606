// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Layout:
// - Cli: the whole command line
// - GlobalOptions: flags every subcommand accepts (output dir, timeouts...)
// - Commands: extract / batch / crawl / subdomains
//
// GlobalOptions::to_config() turns the parsed flags into a MirrorConfig, so
// nothing past this file ever sees clap types.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{
    default_user_agent, CrawlBudget, MirrorConfig, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_DIR,
    DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS,
};

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version,
    about = "Mirror websites into browsable local directory trees",
    long_about = "site-mirror downloads pages and their assets, rewrites every link to point at \
                  the local copy, and writes one self-contained directory per site. \
                  It can grab a single page, a list of pages, a whole site, or a domain and its subdomains."
)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    // The #[command(subcommand)] attribute tells clap that this field
    // will hold one of the subcommands defined in the Commands enum
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Directory the mirrored sites are written into
    #[arg(short, long, global = true, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Maximum number of requests in flight across the whole run
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Stop crawling after this many seconds; whatever was fetched is still written
    #[arg(long, global = true)]
    pub session_timeout: Option<u64>,

    /// Extra attempts for timeouts, network errors and 5xx answers
    #[arg(long, global = true, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// User-Agent header, also used to pick the robots.txt group
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Fetch paths even when robots.txt disallows them
    #[arg(long, global = true)]
    pub ignore_robots: bool,

    /// Directory file:// reads are confined to (default: the seed's directory)
    #[arg(long, global = true)]
    pub local_root: Option<PathBuf>,

    /// Crawl and print the planned layout without downloading assets or writing files
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output results in JSON format instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalOptions {
    pub fn to_config(&self, budget: CrawlBudget) -> MirrorConfig {
        MirrorConfig {
            output_dir: self.output_dir.clone(),
            budget,
            concurrency: self.concurrency,
            request_timeout: Duration::from_secs(self.timeout),
            session_timeout: self.session_timeout.map(Duration::from_secs),
            retries: self.retries,
            user_agent: self.user_agent.clone().unwrap_or_else(default_user_agent),
            respect_robots: !self.ignore_robots,
            local_root: self.local_root.clone(),
            dry_run: self.dry_run,
            ..MirrorConfig::default()
        }
    }
}

// This enum defines our subcommands
//
// Each variant represents a different subcommand the user can run
// The fields inside each variant become the arguments for that subcommand
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror a single page and its assets
    ///
    /// Example: site-mirror extract https://example.com/docs/intro
    Extract {
        /// Page URL, or a path to a local HTML file
        target: String,

        /// Directory name to use instead of one derived from the URL
        #[arg(long)]
        name: Option<String>,
    },

    /// Mirror many single pages at once
    ///
    /// Example: site-mirror batch https://a.example https://b.example --url-file more.txt
    Batch {
        /// Page URLs
        urls: Vec<String>,

        /// File with one URL per line (blank lines and # comments are skipped)
        #[arg(long)]
        url_file: Option<PathBuf>,

        /// Base directory name; sites are written as NAME_1, NAME_2, ... in input order
        #[arg(long)]
        name: Option<String>,
    },

    /// Crawl a site breadth-first and mirror every page found
    ///
    /// Example: site-mirror crawl https://example.com --max-pages 50 --max-depth 2
    Crawl {
        /// Site URL, or a path to a local HTML file
        target: String,

        /// Stop after this many pages (default: unlimited)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Do not follow links more than this many hops from the start (default: unlimited)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Treat links to this host as part of the site (repeatable)
        #[arg(long = "allow-host")]
        allow_hosts: Vec<String>,

        /// Directory name to use instead of one derived from the URL
        #[arg(long)]
        name: Option<String>,
    },

    /// Crawl a domain, find its subdomains, and mirror each one
    ///
    /// Example: site-mirror subdomains example.com --max-pages 20
    Subdomains {
        /// Root domain, e.g. example.com
        domain: String,

        /// Page limit for each site (default: unlimited)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Depth limit for each site (default: unlimited)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Scheme used to probe candidate subdomains
        #[arg(long, value_enum, default_value_t = ProbeScheme::Https)]
        probe_scheme: ProbeScheme,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScheme {
    Https,
    Http,
}

impl ProbeScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeScheme::Https => "https",
            ProbeScheme::Http => "http",
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does global = true do?
//    - The flag may appear before or after the subcommand:
//      site-mirror --json crawl URL  and  site-mirror crawl URL --json
//      mean the same thing
//
// 2. Why Option<usize> for the limits?
//    - None means "no limit". A sentinel like 0 would be ambiguous
//
// 3. What is ArgAction::Count?
//    - Counts how often a flag was given, so -vvv becomes verbose = 3
// -----------------------------------------------------------------------------
