//! Option handling, tracing setup and pipeline dispatch.

use std::cell::RefCell;
use std::io::Write;
use std::process::ExitCode;

use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use meshmaker_core::{NativeCollaborators, ProgressReporter, RunReport, SilentProgress, Stage};
use meshmaker_shared::{
    BuildOutcome, ConfigBuilder, Configuration, LogFormat, USAGE, load_config, requests_help,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the configuration from `tokens` and run the pipeline.
///
/// Configuration errors are all printed before returning a failure code;
/// no stage runs in that case. Help is answered before the defaults file is
/// read, so a broken file never hides the usage text.
pub(crate) fn run(tokens: Vec<String>) -> Result<ExitCode> {
    if requests_help(&tokens) {
        eprint!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let app_config = load_config()?;

    let (config, warnings) = match ConfigBuilder::new(app_config.defaults).build(tokens) {
        Ok(BuildOutcome::Help) => {
            eprint!("{USAGE}");
            return Ok(ExitCode::SUCCESS);
        }
        Ok(BuildOutcome::Ready { config, warnings }) => (config, warnings),
        Err(error) => {
            for issue in &error.issues {
                eprintln!("{issue}");
            }
            eprintln!("Aborting...");
            return Ok(ExitCode::FAILURE);
        }
    };

    init_tracing(config.verbose(), app_config.logging.format);
    for warning in &warnings {
        warn!("{warning}");
    }

    generate(&config)?;
    Ok(ExitCode::SUCCESS)
}

fn generate(config: &Configuration) -> Result<()> {
    let plan = meshmaker_core::assemble(config);
    info!(
        input = %config.input_path().display(),
        output = %config.output_path().display(),
        stages = plan.len(),
        "generating mesh"
    );

    if !config.verbose() {
        meshmaker_core::run(&plan, &NativeCollaborators, &SilentProgress)?;
        return Ok(());
    }

    let reporter = CliProgress::new(std::io::stderr());
    let result = meshmaker_core::run(&plan, &NativeCollaborators, &reporter);
    if result.is_err() {
        reporter.abandon();
    }
    let report = result?;

    println!();
    println!("  Mesh written successfully!");
    println!("  Path:   {}", report.write.path.display());
    println!("  Points: {}", report.points);
    println!("  Cells:  {}", report.cells);
    println!("  Size:   {} bytes", report.write.size_bytes);
    println!("  SHA256: {}", report.write.sha256);
    println!("  Time:   {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing on stderr. `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        "meshmaker=debug"
    } else {
        "meshmaker=warn"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Verbose-mode reporter: prints each stage message and spins while it runs.
///
/// Lines go straight to `out` with the spinner suspended, so they still
/// appear when the spinner is hidden because stderr is not a terminal.
struct CliProgress<W: Write> {
    spinner: ProgressBar,
    out: RefCell<W>,
}

impl<W: Write> CliProgress<W> {
    fn new(out: W) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self::with_spinner(spinner, out)
    }

    fn with_spinner(spinner: ProgressBar, out: W) -> Self {
        Self {
            spinner,
            out: RefCell::new(out),
        }
    }

    fn line(&self, message: &str) {
        self.spinner.suspend(|| {
            let mut out = self.out.borrow_mut();
            // A closed stderr is not worth failing the run over.
            let _ = writeln!(out, "{message}");
            let _ = out.flush();
        });
    }

    fn abandon(&self) {
        self.spinner.abandon();
    }
}

impl<W: Write> ProgressReporter for CliProgress<W> {
    fn stage(&self, stage: &Stage, index: usize, total: usize) {
        let message = stage.to_string();
        self.spinner.set_length(total as u64);
        self.spinner.set_position(index as u64);
        self.line(&message);
        self.spinner.set_message(message);
    }

    fn note(&self, message: &str) {
        self.line(message);
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
