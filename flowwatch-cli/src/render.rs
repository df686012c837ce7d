//! Terminal rendering
//!
//! Workflow summaries, live log output and notification toasts.

use std::io::{self, Write};

use colored::*;
use flowwatch_core::domain::notification::{Notification, NotificationId, NotificationKind};
use flowwatch_core::domain::workflow::{JobStatus, WorkflowSnapshot};

/// Fields shown in workflow details, in display order
const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("pipeline", "Pipeline:"),
    ("revision", "Revision:"),
    ("profiles", "Profiles:"),
    ("input_dir", "Input:"),
    ("output_dir", "Output:"),
];

pub fn colorize_status(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Nascent => status.as_str().green(),
        JobStatus::Running => status.as_str().yellow(),
        JobStatus::Completed => status.as_str().green().bold(),
        JobStatus::Failed => status.as_str().red().bold(),
    }
}

fn display_name(workflow: &WorkflowSnapshot) -> &str {
    match workflow.field_str("name") {
        Some(name) if !name.is_empty() => name,
        _ => "(unnamed)",
    }
}

/// Print a workflow summary line block
pub fn print_workflow_summary(workflow: &WorkflowSnapshot) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        display_name(workflow).bold(),
        workflow.id.to_string().dimmed()
    );
    if let Some(pipeline) = workflow.field_str("pipeline") {
        println!("    Pipeline: {}", pipeline.dimmed());
    }
    println!("    Status:   {}", colorize_status(workflow.status));
    println!();
}

/// Print detailed workflow information
pub fn print_workflow_details(workflow: &WorkflowSnapshot) {
    println!("{}", "Workflow Details:".bold());
    println!("  ID:        {}", workflow.id.to_string().cyan());
    println!("  Name:      {}", display_name(workflow));
    println!("  Status:    {}", colorize_status(workflow.status));

    for (key, label) in DETAIL_FIELDS {
        if let Some(value) = workflow.field_str(key) {
            println!("  {:<10} {}", label, value);
        }
    }

    print_file_list("Input files:", workflow.field_list("input_files"));
    print_file_list("Output files:", workflow.field_list("output_files"));
    if let Some(available) = workflow.field_bool("output_data") {
        println!("  {:<10} {}", "Archive:", archive_label(available));
    }
}

fn print_file_list(label: &str, files: Option<Vec<&str>>) {
    let Some(files) = files else {
        return;
    };

    if files.is_empty() {
        println!("  {} {}", label, "none".dimmed());
        return;
    }
    println!("  {}", label);
    for file in files {
        println!("    {}", file);
    }
}

fn archive_label(available: bool) -> ColoredString {
    if available {
        "available (workflow download)".green()
    } else {
        "not packed yet".dimmed()
    }
}

/// Prints a growing log incrementally and reports status changes
#[derive(Default)]
pub struct LogPrinter {
    printed: String,
    status: Option<JobStatus>,
}

impl LogPrinter {
    pub fn print(&mut self, workflow: &WorkflowSnapshot) {
        let log = workflow.log_text();

        match log.strip_prefix(self.printed.as_str()) {
            Some(rest) => print!("{}", rest),
            None => {
                // the server rewrote the log (e.g. a resumed run); show it again
                println!("{}", "─".repeat(80).dimmed());
                print!("{}", log);
            }
        }
        self.printed = log.to_string();
        let _ = io::stdout().flush();

        if let Some(previous) = self.status {
            if previous != workflow.status {
                println!(
                    "{} {} → {}",
                    "Status:".bold(),
                    colorize_status(previous),
                    colorize_status(workflow.status)
                );
            }
        }
        self.status = Some(workflow.status);
    }
}

/// Prints each notification once, as it appears
#[derive(Default)]
pub struct Toasts {
    last_shown: Option<NotificationId>,
}

impl Toasts {
    pub fn render(&mut self, active: &[Notification]) {
        for notification in active {
            if self.last_shown.is_some_and(|last| notification.id <= last) {
                continue;
            }
            eprintln!("{}", format_toast(notification));
            self.last_shown = Some(notification.id);
        }
    }
}

fn format_toast(notification: &Notification) -> ColoredString {
    let line = format!("[{}] {}", notification.kind, notification.text());
    match notification.kind {
        NotificationKind::Success => line.green(),
        NotificationKind::Info => line.cyan(),
        NotificationKind::Warning => line.yellow(),
        NotificationKind::Error => line.red(),
    }
}
