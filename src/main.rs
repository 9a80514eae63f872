use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use url::Url;

use gpmsync::{
    Credentials, DayFilter, EarthdataSession, FileLogReporter, Reporter, RunSummary,
    SharedReporter, SyncEvent, SyncOptions, TeeReporter, sync_year,
};

// Emoji with fallback for terminals without Unicode support
static SATELLITE: Emoji<'_, '_> = Emoji("🛰️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

const DEFAULT_BASE_URL: &str =
    "https://gpm1.gesdisc.eosdis.nasa.gov/opendap/hyrax/GPM_L3/GPM_3IMERGHH.06";

/// Mirror and update the GPM-IMERG half-hourly archive
#[derive(Parser, Debug)]
#[command(name = "gpmsync")]
#[command(about = "Mirror and update the GPM-IMERG half-hourly archive from its OPeNDAP listing")]
#[command(version)]
struct Args {
    /// Year to check/download/update
    #[arg(short, long)]
    year: i32,

    /// Earthdata account user name
    #[arg(short, long)]
    user: Option<String>,

    /// Account password; falls back to the GPMPWD environment variable
    #[arg(short, long)]
    pwd: Option<String>,

    /// File with username and password on the first two lines
    #[arg(long)]
    cred_file: Option<PathBuf>,

    /// Range of days to download from the selected year, as "123/125"
    #[arg(short = 'r', long, default_value = "/")]
    day_range: String,

    /// Local archive root; files land under <DATA_DIR>/<year>/
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Base URL of the remote year/day listing tree
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: Url,

    /// Run log, appended to on every run
    #[arg(long, default_value = "update_log.txt")]
    log_file: PathBuf,

    /// Print out debug information
    #[arg(short, long)]
    debug: bool,
}

/// Terminal reporter; debug-level events only show with --debug
struct ConsoleReporter {
    debug: bool,
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: SyncEvent) {
        match event {
            SyncEvent::ListingYear { url } => {
                println!("{SEARCH}Listing {}", url.cyan());
            }

            SyncEvent::DaySkipped { day } => {
                if self.debug {
                    println!("{}", format!("skipping {day}").dimmed());
                }
            }

            SyncEvent::DayListed { day, entries } => {
                println!(
                    "{SEARCH}Day {}: {} entries",
                    day.bold(),
                    entries.to_string().cyan()
                );
            }

            SyncEvent::DayFailed { day, error } => {
                println!("{FAILURE}Day {} skipped - {}", day.red(), error.red());
            }

            SyncEvent::EntrySeen {
                name,
                last_modified,
                size_bytes,
            } => {
                if self.debug {
                    println!("{}", format!("{name}: {last_modified}, {size_bytes}").dimmed());
                }
            }

            SyncEvent::FetchStarting { name, url, update } => {
                let verb = if update { "Updating" } else { "Downloading" };
                println!("{DOWNLOAD}{verb} {}", name.cyan());
                if self.debug {
                    println!("{}", url.dimmed());
                }
            }

            SyncEvent::FetchCompleted {
                path,
                bytes,
                update,
            } => {
                let verb = if update { "updated" } else { "new" };
                println!(
                    "{SUCCESS}{} ({verb}, {bytes} bytes)",
                    path.display().to_string().green()
                );
            }

            SyncEvent::FetchFailed { path, error } => {
                println!(
                    "{FAILURE}{} - {}",
                    path.display().to_string().red(),
                    error.red()
                );
            }

            SyncEvent::DecisionError { path, reason } => {
                println!(
                    "{FAILURE}{} - {}",
                    path.display().to_string().red(),
                    reason.red()
                );
            }

            SyncEvent::YearCompleted { year } => {
                println!(
                    "\n{PARTY}{}",
                    format!("Download for year {year} is complete").bold().green()
                );
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} {} new, {} updated, {} errors",
        "Summary:".bold(),
        summary.new.len().to_string().green().bold(),
        summary.updated.len().to_string().yellow(),
        if summary.error.is_empty() {
            summary.error.len().to_string().green()
        } else {
            summary.error.len().to_string().red().bold()
        }
    );

    if !summary.error.is_empty() {
        println!("\n{}", "Files with problems:".red().bold());
        for path in &summary.error {
            println!("  {}{}", CROSS, path.display().to_string().yellow());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!(
        "\n{}{} {}\n",
        SATELLITE,
        "gpmsync".bold().magenta(),
        "- GPM-IMERG archive mirror".dimmed()
    );

    let days = DayFilter::parse(&args.day_range)?;

    let credentials = Credentials::resolve(args.user, args.pwd, args.cred_file.as_deref())
        .context("Failed to resolve Earthdata credentials")?;

    // Login failure is fatal here, before any listing is attempted.
    let session = EarthdataSession::login(&credentials.user, &credentials.password)
        .await
        .context("Earthdata login failed")?;

    let log = Arc::new(
        FileLogReporter::open(&args.log_file)
            .with_context(|| format!("Failed to open run log {}", args.log_file.display()))?,
    );
    let reporter: SharedReporter = TeeReporter::shared(vec![
        Arc::new(ConsoleReporter { debug: args.debug }),
        log.clone(),
    ]);

    let options = SyncOptions {
        base_url: args.base_url,
        year: args.year,
        days,
        data_dir: args.data_dir.clone(),
    };

    let summary = sync_year(&session, &options, &reporter)
        .await
        .with_context(|| format!("Sync run for year {} failed", args.year))?;

    log.write_summary(&summary, args.year);
    print_summary(&summary);

    println!(
        "\n{FOLDER}Archive: {}\n",
        args.data_dir.display().to_string().cyan()
    );

    // Per-file errors are reported through the summary; they do not fail
    // the process.
    Ok(())
}
