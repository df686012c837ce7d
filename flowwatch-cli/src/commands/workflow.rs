//! Workflow command handlers
//!
//! Handles listing, editing and running workflows, and following a running
//! workflow's log until it finishes.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use colored::*;
use flowwatch_client::{InputFile, WorkflowClient};
use flowwatch_core::domain::workflow::WorkflowId;
use flowwatch_core::dto::workflow::{
    ApiMessage, NEW_WORKFLOW_ID, PageQuery, WorkflowDraft, output_archive_name,
};
use flowwatch_monitor::{JobService, NotificationQueue, WorkflowView};
use tracing::debug;

use crate::config::Config;
use crate::id_resolver::resolve_workflow_id;
use crate::render::{LogPrinter, Toasts, print_workflow_details, print_workflow_summary};

/// How long to wait for the final notification of a finished workflow
const FINAL_TOAST_GRACE: Duration = Duration::from_millis(200);

/// Workflow subcommands
#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// List workflows, newest first
    List {
        /// Page number, starting at 0
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Workflows per page
        #[arg(long, default_value_t = 100)]
        page_size: u32,

        /// Print raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Show workflow details and its current log
    Get {
        /// Workflow ID or unambiguous prefix
        id: String,

        /// Print raw JSON instead of formatted details
        #[arg(long)]
        json: bool,
    },
    /// Follow a workflow's log until it finishes
    Watch {
        /// Workflow ID or unambiguous prefix
        id: String,
    },
    /// Create a new workflow
    Create {
        /// Pipeline to run (e.g. nf-core/rnaseq)
        #[arg(long)]
        pipeline: String,

        /// Display name
        #[arg(long, default_value = "")]
        name: String,

        /// Pipeline revision
        #[arg(long)]
        revision: Option<String>,

        /// Configuration profiles
        #[arg(long)]
        profiles: Option<String>,
    },
    /// Upload input files for a workflow
    Upload {
        /// Workflow ID or unambiguous prefix
        id: String,

        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Download a workflow's output archive, or a single output file
    Download {
        /// Workflow ID or unambiguous prefix
        id: String,

        /// Output file to fetch, as listed by `workflow get`
        #[arg(long)]
        path: Option<String>,

        /// Where to save it (default: the file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Launch a workflow
    Launch {
        /// Workflow ID or unambiguous prefix
        id: String,

        /// Follow the log after launching
        #[arg(short, long)]
        follow: bool,
    },
    /// Resume a workflow, reusing results of the previous run
    Resume {
        /// Workflow ID or unambiguous prefix
        id: String,

        /// Follow the log after resuming
        #[arg(short, long)]
        follow: bool,
    },
    /// Cancel a running workflow
    Cancel {
        /// Workflow ID or unambiguous prefix
        id: String,
    },
    /// Delete a workflow
    Delete {
        /// Workflow ID or unambiguous prefix
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Shared state of one command invocation
struct Session {
    client: Arc<WorkflowClient>,
    notifications: Arc<NotificationQueue>,
    toasts: Toasts,
}

impl Session {
    fn new(config: &Config) -> Self {
        Self {
            client: Arc::new(WorkflowClient::new(config.server_url.as_str())),
            notifications: Arc::new(NotificationQueue::new(config.monitor.notification_lifetime)),
            toasts: Toasts::default(),
        }
    }

    fn flush_toasts(&mut self) {
        self.toasts.render(&self.notifications.active());
    }

    /// Reports the outcome of an action as a notification
    fn report(&mut self, action: &str, result: flowwatch_client::Result<ApiMessage>) -> Result<()> {
        let outcome = match result {
            Ok(msg) => {
                self.notifications.success(msg.message);
                Ok(())
            }
            Err(e) => {
                self.notifications.error(e.to_string());
                Err(anyhow!("{} failed", action))
            }
        };
        self.flush_toasts();
        outcome
    }
}

/// Handle workflow commands
///
/// Routes workflow subcommands to their respective handlers.
pub async fn handle_workflow_command(command: WorkflowCommands, config: &Config) -> Result<()> {
    let mut session = Session::new(config);

    match command {
        WorkflowCommands::List {
            page,
            page_size,
            json,
        } => list_workflows(&session, PageQuery { page, page_size }, json).await,
        WorkflowCommands::Get { id, json } => get_workflow(&session, &id, json).await,
        WorkflowCommands::Watch { id } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            watch_workflow(&mut session, config, &id).await
        }
        WorkflowCommands::Create {
            pipeline,
            name,
            revision,
            profiles,
        } => {
            let mut draft = WorkflowDraft::new(pipeline).with_name(name);
            if let Some(revision) = revision {
                draft.revision = revision;
            }
            if let Some(profiles) = profiles {
                draft.profiles = profiles;
            }
            create_workflow(&mut session, &draft).await
        }
        WorkflowCommands::Upload { id, files } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            upload_inputs(&mut session, &id, &files).await
        }
        WorkflowCommands::Download { id, path, output } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            download_output(&mut session, &id, path.as_deref(), output).await
        }
        WorkflowCommands::Launch { id, follow } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            let result = session.client.launch_workflow(&id).await;
            session.report("launch", result)?;
            if follow {
                watch_workflow(&mut session, config, &id).await?;
            }
            Ok(())
        }
        WorkflowCommands::Resume { id, follow } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            let result = session.client.resume_workflow(&id).await;
            session.report("resume", result)?;
            if follow {
                watch_workflow(&mut session, config, &id).await?;
            }
            Ok(())
        }
        WorkflowCommands::Cancel { id } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            let result = session.client.cancel_workflow(&id).await;
            session.report("cancel", result)
        }
        WorkflowCommands::Delete { id, yes } => {
            let id = resolve_workflow_id(&session.client, &id).await?;
            delete_workflow(&mut session, &id, yes).await
        }
    }
}

/// List one page of workflows
async fn list_workflows(session: &Session, page: PageQuery, json: bool) -> Result<()> {
    let workflows = session
        .client
        .list_workflows(page)
        .await
        .context("Failed to list workflows")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!("{}", "No workflows found.".yellow());
    } else {
        println!("{}", format!("Found {} workflow(s):", workflows.len()).bold());
        println!();
        for workflow in &workflows {
            print_workflow_summary(workflow);
        }
    }

    Ok(())
}

/// Get and display a single workflow with its log
async fn get_workflow(session: &Session, id: &str, json: bool) -> Result<()> {
    let id = resolve_workflow_id(&session.client, id).await?;

    let mut workflow = session
        .client
        .get_workflow(&id)
        .await
        .context("Failed to fetch workflow")?;
    let log = session
        .client
        .get_workflow_log(&id)
        .await
        .context("Failed to fetch workflow log")?;
    workflow.merge(log);

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    print_workflow_details(&workflow);

    let log = workflow.log_text();
    if log.is_empty() {
        println!("\n{}", "No log yet.".yellow());
    } else {
        println!("\n{}", "Log:".bold());
        println!("{}", "─".repeat(80).dimmed());
        print!("{}", log);
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

/// Create a workflow and print its id
async fn create_workflow(session: &mut Session, draft: &WorkflowDraft) -> Result<()> {
    let saved = session
        .client
        .save_workflow(&WorkflowId::new(NEW_WORKFLOW_ID), draft)
        .await
        .context("Failed to create workflow")?;

    session
        .notifications
        .success(format!("Workflow {} was created", saved.id));
    session.flush_toasts();
    println!("{}", saved.id);

    Ok(())
}

/// Upload local files into a workflow's input directory
async fn upload_inputs(session: &mut Session, id: &WorkflowId, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(workflow = %id, file = file_name, bytes = contents.len(), "Uploading input");
        files.push(InputFile::new(file_name, contents));
    }

    let result = session.client.upload_inputs(id, files).await;
    session.report("upload", result)
}

/// Save workflow output to disk
async fn download_output(
    session: &mut Session,
    id: &WorkflowId,
    path: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let target = output.unwrap_or_else(|| default_download_target(id, path));

    let contents = match session.client.download_output(id, path).await {
        Ok(contents) => contents,
        Err(e) => {
            session.notifications.error(e.to_string());
            session.flush_toasts();
            return Err(anyhow!("download failed"));
        }
    };
    tokio::fs::write(&target, &contents)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    session.notifications.success(format!(
        "Saved {} ({} bytes)",
        target.display(),
        contents.len()
    ));
    session.flush_toasts();
    Ok(())
}

/// File name of the requested output, or of the output archive
fn default_download_target(id: &WorkflowId, path: Option<&str>) -> PathBuf {
    path.and_then(|p| Path::new(p).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(output_archive_name(id)))
}

/// Delete a workflow after confirmation
async fn delete_workflow(session: &mut Session, id: &WorkflowId, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Are you sure you want to delete \"{}\"?", id))? {
        println!("{}", "Aborted.".dimmed());
        return Ok(());
    }

    match session.client.delete_workflow(id).await {
        Ok(()) => {
            session
                .notifications
                .success(format!("Workflow {} was deleted", id));
            session.flush_toasts();
            Ok(())
        }
        Err(e) => {
            session.notifications.error(e.to_string());
            session.flush_toasts();
            Err(anyhow!("delete failed"))
        }
    }
}

/// Show a workflow and stream its log while it runs
///
/// Polling is owned by a [`WorkflowView`] that lives for the duration of this
/// function; leaving (job finished or Ctrl-C) tears it down.
async fn watch_workflow(session: &mut Session, config: &Config, id: &WorkflowId) -> Result<()> {
    let service: Arc<dyn JobService> = session.client.clone();
    let view = WorkflowView::new(service, Arc::clone(&session.notifications), &config.monitor)?;
    let mut notifications = session.notifications.subscribe();
    debug!(workflow = %id, "Following workflow");

    let mut workflow = match view.open(id).await {
        Ok(receiver) => receiver,
        Err(e) => {
            session.flush_toasts();
            return Err(e).context("Failed to open workflow");
        }
    };

    let mut printer = LogPrinter::default();
    {
        let snapshot = workflow.borrow_and_update().clone();
        print_workflow_details(&snapshot);
        println!("{}", "─".repeat(80).dimmed());
        printer.print(&snapshot);
    }
    session.toasts.render(&notifications.borrow_and_update());

    if !view.sessions().is_polling(id) {
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = workflow.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = workflow.borrow_and_update().clone();
                printer.print(&snapshot);
            }
            changed = notifications.changed() => {
                if changed.is_err() {
                    break;
                }
                let active = notifications.borrow_and_update().clone();
                session.toasts.render(&active);
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Stopped following.".dimmed());
                break;
            }
        }

        if !view.sessions().is_polling(id) {
            // the finish notification is pushed right after the last update
            let _ = tokio::time::timeout(FINAL_TOAST_GRACE, notifications.changed()).await;
            session.toasts.render(&notifications.borrow_and_update());
            break;
        }
    }

    view.close();
    debug!(workflow = %id, "Stopped following workflow");
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
