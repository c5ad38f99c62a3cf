use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};

use tree_dups::{
    Cli, ErrorPolicy, Settings, build_report, format_human_elapsed, logging, print_results,
    write_json,
};

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    logging::init_logging(
        logging::level_for(cli.verbose, cli.quiet),
        cli.log_file.as_deref(),
    )?;

    info!("Starting tree-dups v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_cli(&cli);
    debug!("Effective settings: {:?}", settings);

    if let Some(threads) = settings.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build hashing thread pool")?;
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            if interrupted.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            eprintln!("Interrupted, finishing with partial results (press Ctrl+C again to quit)");
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let roots = resolve_roots(&cli.roots, settings.on_error)?;

    let mut scanner = settings
        .scanner()
        .with_interrupt_flag(interrupted)
        .with_progress(!cli.no_progress && !cli.quiet);
    if let Err(err) = scanner.scan(&roots) {
        error!("{}", err);
        return Err(err).context("Scan aborted, no report produced");
    }

    let (index, summary) = scanner.into_parts();
    let groups = build_report(index, settings.order);

    if cli.json {
        write_json(io::stdout().lock(), &groups, &summary)?;
    } else {
        print_results(&groups, &summary);
    }

    if !summary.failures.is_empty() {
        warn!("{} entries could not be read", summary.failures.len());
    }
    info!(
        "Program completed in {}",
        format_human_elapsed(start_time.elapsed())
    );
    Ok(())
}

/// Canonicalizes each root.
///
/// A root that is missing or not a directory ends the run under
/// [`ErrorPolicy::Abort`]. Otherwise it is passed through unchanged so the
/// scanner records it as a failure and moves on to the next root.
fn resolve_roots(roots: &[PathBuf], policy: ErrorPolicy) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(roots.len());
    for root in roots {
        match check_root(root) {
            Ok(absolute) => {
                info!("Target directory: '{}'", absolute.display());
                resolved.push(absolute);
            }
            Err(err) if policy == ErrorPolicy::Abort => return Err(err),
            Err(err) => {
                warn!("{:#}", err);
                resolved.push(root.clone());
            }
        }
    }
    Ok(resolved)
}

fn check_root(root: &Path) -> Result<PathBuf> {
    let absolute = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: '{}'", root.display()))?;
    if !absolute.is_dir() {
        anyhow::bail!("Path is not a directory: '{}'", absolute.display());
    }
    Ok(absolute)
}
