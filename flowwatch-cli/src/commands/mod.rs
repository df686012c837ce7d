//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod workflow;

pub use workflow::WorkflowCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Workflow management
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// Follow a workflow until it finishes (shortcut for `workflow watch`)
    Watch {
        /// Workflow ID or unambiguous prefix
        id: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Workflow { command } => workflow::handle_workflow_command(command, config).await,
        Commands::Watch { id } => {
            workflow::handle_workflow_command(WorkflowCommands::Watch { id }, config).await
        }
    }
}
