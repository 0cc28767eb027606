// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (stderr, so --json output on stdout stays clean)
// 3. Wire Ctrl-C and --session-timeout to one cancellation token
// 4. Dispatch to the mirror for the chosen mode
// 5. Print a summary per site and exit with the proper code
//
// Exit codes:
//   0 = every site written without failures
//   1 = some page, asset, or site write failed
//   2 = the run could not start (bad arguments, bad seed, unreadable file)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - defaults and run configuration
mod crawl; // src/crawl/ - frontier, scheduler, subdomain probing
mod error; // src/error.rs - error types
mod extract; // src/extract/ - finding links and assets in HTML
mod fetch; // src/fetch/ - HTTP, robots.txt, local files
mod mirror; // src/mirror.rs - one site end to end
mod site; // src/site/ - site model and writer

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser; // Parser trait enables the parse() method
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::CrawlBudget;
use crawl::ProbeTarget;
use mirror::{read_url_file, Mirror, Seed};
use site::SiteSummary;

// The #[tokio::main] attribute transforms our async main into a real main function
// It creates a tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.options.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins when set. Otherwise -v picks our level and everything else
// stays at warn.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,site_mirror={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// This is the main application logic
// Returns:
//   Ok(0) = all sites clean
//   Ok(1) = failures recorded
//   Err   = could not start (mapped to exit code 2)
async fn run(cli: Cli) -> Result<i32> {
    let options = cli.options;
    let json = options.json;

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let summaries = match cli.command {
        Commands::Extract { target, name } => {
            let seed = Seed::parse(&target)?;
            let config = options.to_config(CrawlBudget::single_page());
            spawn_deadline(config.session_timeout, cancel.clone());
            announce(json, &format!("🔍 Extracting {}", seed.url));

            let mirror = Mirror::new(config, cancel)?;
            vec![mirror.extract(&seed, name).await]
        }
        Commands::Batch {
            urls,
            url_file,
            name,
        } => {
            let mut inputs = urls;
            if let Some(path) = url_file {
                inputs.extend(read_url_file(&path)?);
            }
            if inputs.is_empty() {
                bail!("no URLs given (pass them as arguments or with --url-file)");
            }
            let config = options.to_config(CrawlBudget::single_page());
            spawn_deadline(config.session_timeout, cancel.clone());
            announce(json, &format!("🔍 Extracting {} page(s)", inputs.len()));

            // Each entry is parsed on its own; a bad one is reported with
            // the others instead of stopping the run.
            let mirror = Mirror::new(config, cancel)?;
            mirror.batch(&inputs, name.as_deref()).await
        }
        Commands::Crawl {
            target,
            max_pages,
            max_depth,
            allow_hosts,
            name,
        } => {
            let seed = Seed::parse(&target)?;
            let config = options.to_config(CrawlBudget::new(max_pages, max_depth));
            spawn_deadline(config.session_timeout, cancel.clone());
            announce(json, &format!("🔍 Crawling {}", seed.url));

            let mirror = Mirror::new(config, cancel)?;
            vec![mirror.crawl(&seed, &allow_hosts, name).await]
        }
        Commands::Subdomains {
            domain,
            max_pages,
            max_depth,
            probe_scheme,
        } => {
            let config = options.to_config(CrawlBudget::new(max_pages, max_depth));
            spawn_deadline(config.session_timeout, cancel.clone());
            announce(json, &format!("🔍 Mirroring {} and its subdomains", domain));

            let mirror = Mirror::new(config, cancel)?;
            mirror
                .subdomains(&domain, &ProbeTarget::new(probe_scheme.as_str()))
                .await?
        }
    };

    print_results(&summaries, json)?;

    if summaries.iter().all(SiteSummary::is_clean) {
        Ok(0)
    } else {
        Ok(1)
    }
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing up");
            cancel.cancel();
        }
    });
}

fn spawn_deadline(limit: Option<Duration>, cancel: CancellationToken) {
    let Some(limit) = limit else {
        return;
    };
    tokio::spawn(async move {
        tokio::time::sleep(limit).await;
        warn!(seconds = limit.as_secs(), "session timeout reached");
        cancel.cancel();
    });
}

fn announce(json: bool, message: &str) {
    if !json {
        println!("{}\n", message);
    }
}

// Prints the results either as a table or JSON
fn print_results(summaries: &[SiteSummary], json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summaries)?;
        println!("{}", json_output);
    } else {
        print_table(summaries);
    }
    Ok(())
}

// Prints results as a human-readable table in the terminal
fn print_table(summaries: &[SiteSummary]) {
    println!(
        "{:<50} {:<18} {:>6} {:>7} {:>9}",
        "SITE", "STATE", "PAGES", "ASSETS", "FAILURES"
    );
    println!("{}", "=".repeat(94));

    for summary in summaries {
        println!(
            "{:<50} {:<18} {:>6} {:>7} {:>9}",
            truncate(&summary.root_url, 50),
            summary.state.label(),
            summary.pages_fetched,
            summary.assets_fetched,
            summary.failures.len()
        );
        match (&summary.output_path, &summary.write_error) {
            (_, Some(error)) => println!("   ❌ not written: {}", error),
            (Some(path), None) => println!("   📁 {}", path.display()),
            (None, None) => {}
        }
        for file in &summary.planned_files {
            println!("      {}", file);
        }
    }

    let failures: Vec<_> = summaries.iter().flat_map(|s| &s.failures).collect();
    if !failures.is_empty() {
        println!();
        println!("{:<60} {:<6} {:<18} {}", "FAILED URL", "TYPE", "KIND", "MESSAGE");
        println!("{}", "=".repeat(105));
        for failure in failures {
            let resource = match failure.resource {
                site::ResourceType::Page => "page",
                site::ResourceType::Asset => "asset",
            };
            println!(
                "{:<60} {:<6} {:<18} {}",
                truncate(&failure.url, 60),
                resource,
                failure.kind.label(),
                failure.message
            );
        }
    }

    println!();
    let pages: usize = summaries.iter().map(|s| s.pages_fetched).sum();
    let assets: usize = summaries.iter().map(|s| s.assets_fetched).sum();
    let failed: usize = summaries.iter().map(|s| s.failures.len()).sum();

    println!("📊 Summary:");
    println!("   🌐 Sites: {}", summaries.len());
    println!("   📄 Pages: {}", pages);
    println!("   🖼️  Assets: {}", assets);
    println!("   ❌ Failures: {}", failed);
}

// Truncate if too long for display, on a char boundary
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
