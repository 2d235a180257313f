//! Upload command implementation.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use mavparam::{
    Locator, Negotiator, Session, SessionOptions, SessionReport, UploadEvent, Uploader,
};
use std::path::Path;
use std::time::Duration;

use crate::Cli;
use crate::config::Config;

/// Build session options from config, with command-line flags taking priority.
pub(crate) fn session_options(config: &Config, no_reboot: bool, bauds: &[u32]) -> SessionOptions {
    let mut negotiator = config.negotiator_config();
    if !bauds.is_empty() {
        negotiator.baud_rates = bauds.to_vec();
    }

    SessionOptions {
        locator: Locator::new().with_extra_patterns(config.port.patterns.iter().cloned()),
        negotiator: Negotiator::with_config(negotiator),
        uploader: Uploader::with_config(config.uploader_config()),
        reboot: config.reboot() && !no_reboot,
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet || !crate::use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(template);
    }
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Upload command implementation. Returns the process exit code.
pub(crate) fn cmd_upload(
    cli: &Cli,
    config: &Config,
    file: &Path,
    no_reboot: bool,
    bauds: &[u32],
) -> i32 {
    let options = session_options(config, no_reboot, bauds);
    let endpoint = cli.port.as_deref().or(config.port.serial.as_deref());

    if !cli.quiet {
        eprintln!(
            "{} Uploading {}",
            style("📦").cyan(),
            style(file.display()).bold()
        );
    }

    let pb = spinner(cli.quiet);
    let mut session = Session::native(options);
    let report = session.run_with_observer(endpoint, file, &mut |event| match event {
        UploadEvent::Started(record) => {
            pb.set_message(format!("Setting {} = {}", record.name, record.raw));
        },
        UploadEvent::Finished(outcome) => {
            if !outcome.success {
                pb.println(format!(
                    "{} {} not confirmed",
                    style("✗").red(),
                    outcome.name
                ));
            }
        },
    });
    pb.finish_and_clear();

    // The result line is shown even with --quiet.
    if let Some(line) = summary_line(&report, !cli.quiet && crate::use_fancy_output()) {
        eprintln!("\n{line}");
    }
    report.exit_code()
}

/// One-line result; `None` if the report carries neither success nor error.
fn summary_line(report: &SessionReport, fancy: bool) -> Option<String> {
    let total = report.upload.as_ref().map_or(0, |u| u.outcomes.len());
    let succeeded = report.upload.as_ref().map_or(0, mavparam::UploadReport::succeeded);

    if report.succeeded() {
        let mark = if fancy { "🎉" } else { "✓" };
        Some(format!(
            "{} {succeeded}/{total} parameter(s) set",
            style(mark).green().bold()
        ))
    } else {
        let e = report.error.as_ref()?;
        Some(format!(
            "{} {succeeded}/{total} parameter(s) set ({}): {e}",
            style("✗").red().bold(),
            report.state()
        ))
    }
}
