mod cli;
mod shutdown;

use std::io::{self, Write};
use std::process::ExitCode;

use callsweep::config::Config;
use callsweep::disk_info::StatvfsProbe;
use callsweep::executor::FsRemover;
use callsweep::lock::RunLock;
use callsweep::logging;
use callsweep::report::{self, EXIT_ABORTED};
use callsweep::sweep::{RunRequest, Sweeper};
use chrono::Utc;
use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_ABORTED);
        }
    };
    cli.apply(&mut config);

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("warning: could not initialise logging: {e}");
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    let _lock = match RunLock::acquire(&config.lock_path()) {
        Ok(lock) => lock,
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            return ExitCode::from(EXIT_ABORTED);
        }
    };
    let cancel = shutdown::install();

    let request = RunRequest {
        mode: cli.mode(),
        dry_run: cli.dry_run(),
    };
    let sweeper = Sweeper::new(&config, &StatvfsProbe, &FsRemover);
    let report = match sweeper.run(&request, Utc::now(), cancel) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            return ExitCode::from(EXIT_ABORTED);
        }
    };

    let mut stdout = io::stdout().lock();
    let rendered = if cli.json {
        report::render_json(&report, &mut stdout)
    } else {
        report::render_human(&report, &mut stdout)
    };
    if let Err(e) = rendered.and_then(|()| stdout.flush()) {
        tracing::error!(error = %e, "failed to write report");
    }

    ExitCode::from(report.status().exit_code())
}
