//! Line oriented terminal output

use std::io::{self, BufRead, IsTerminal, Write};

use colored::Colorize;
use tracing::debug;

use crate::deploy::messages::Report;
use crate::logstream::{LogEntry, LogSource};
use crate::ui::format::{format_bytes, progress_bar};
use crate::ui::Reporter;
use crate::upload::ProgressSnapshot;

/// Empty input, `y` and `yes` confirm. Anything else declines.
pub fn parse_confirmation(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

/// One line per step, colored when stdout is a terminal
pub struct TerminalReporter {
    app_name: String,
}

impl TerminalReporter {
    pub fn new(app_name: impl Into<String>) -> Self {
        if !io::stdout().is_terminal() {
            colored::control::set_override(false);
        }
        Self {
            app_name: app_name.into(),
        }
    }

    /// Text for `report`, without a trailing newline
    pub fn render(&self, report: &Report) -> String {
        match report {
            Report::FilesLoaded { count } => done(&format!("Loaded {count} files")),
            Report::DevFolders(folders) => warning(&format!(
                "Development folders will be uploaded: {}. Add them to `exclude` to skip them.",
                folders.join(", ")
            )),
            Report::Archived { size } => done(&format!("Zipped files ({})", format_bytes(*size))),
            Report::Warning(message) => warning(message),
            Report::AppCreated { build_id } => done(&format!("Created app (Build ID: {build_id})")),
            Report::UploadStarted { size } => format!("Uploading {}...", format_bytes(*size)),
            Report::UploadProgress(snapshot) => progress_line(snapshot),
            Report::Uploaded(snapshot) => {
                format!("{}\n{}\nBuilding app...", progress_line(snapshot), done("Uploaded"))
            }
            Report::BuildStatus(status) => format!("Build status: {status}").dimmed().to_string(),
            Report::LogLines(entries) => entries
                .iter()
                .map(log_line)
                .collect::<Vec<_>>()
                .join("\n"),
            Report::Draining => "Build finished, collecting remaining logs..."
                .dimmed()
                .to_string(),
            Report::Cancelling { build_id } => format!("Cancelling build {build_id}..."),
            Report::Success {
                build_id,
                dashboard_url,
                endpoint,
                detached,
            } => {
                let mut lines = if *detached {
                    vec![done(&format!(
                        "Build {build_id} is running, no longer following it"
                    ))]
                } else {
                    vec![
                        done("Build complete!"),
                        String::new(),
                        format!("{} is now live!", self.app_name).green().bold().to_string(),
                    ]
                };
                if !dashboard_url.is_empty() {
                    lines.push(String::new());
                    lines.push(format!("App Dashboard: {dashboard_url}"));
                }
                if !endpoint.is_empty() && !*detached {
                    lines.push(String::new());
                    lines.push("Endpoint:".to_string());
                    lines.push(format!("POST {endpoint}/{{function_name}}"));
                }
                lines.join("\n")
            }
            Report::Failed { message, hint } => {
                let mut text = format!("{} {}", "✗".red(), message.red());
                if let Some(hint) = hint {
                    text.push('\n');
                    text.push_str(&hint.yellow().to_string());
                }
                text
            }
            Report::Cancelled { warning: None } => done("Deployment cancelled"),
            Report::Cancelled {
                warning: Some(message),
            } => format!("{}\n{}", warning(message), done("Deployment cancelled")),
        }
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, report: &Report) {
        let text = self.render(report);
        if text.is_empty() {
            return;
        }
        match report {
            Report::Failed { .. } | Report::Warning(_) => eprintln!("{text}"),
            _ => println!("{text}"),
        }
    }

    fn confirm(&self, summary: &str) -> bool {
        println!("{summary}");
        print!("Do you want to deploy? (Y/n) ");
        if let Err(e) = io::stdout().flush() {
            debug!("failed to flush prompt: {}", e);
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            // closed stdin cannot say yes
            Ok(0) => false,
            Ok(_) => parse_confirmation(&answer),
            Err(e) => {
                debug!("failed to read confirmation: {}", e);
                false
            }
        }
    }
}

fn done(text: &str) -> String {
    format!("{} {}", "✓".green(), text)
}

fn warning(text: &str) -> String {
    format!("Warning: {text}").yellow().to_string()
}

fn progress_line(snapshot: &ProgressSnapshot) -> String {
    let percent = snapshot.percent();
    let mut line = format!(
        "{} {}% ({} / {})",
        progress_bar(percent),
        percent,
        format_bytes(snapshot.bytes_sent),
        format_bytes(snapshot.total)
    );
    if snapshot.bytes_per_second > 0.0 {
        line.push_str(&format!(
            " • {}/s",
            format_bytes(snapshot.bytes_per_second as u64)
        ));
    }
    line
}

fn log_line(entry: &LogEntry) -> String {
    match entry.source {
        LogSource::Stderr => entry.text.red().to_string(),
        LogSource::Stdout | LogSource::Build => entry.text.clone(),
    }
}
