//! ID resolver module
//!
//! Resolves workflow id prefixes to full ids by querying the listing, so
//! users can type a short, unambiguous prefix instead of the whole id.

use anyhow::{Context, Result, anyhow};
use flowwatch_client::WorkflowClient;
use flowwatch_core::domain::workflow::WorkflowId;
use flowwatch_core::dto::workflow::PageQuery;

/// Resolve a workflow ID or prefix to a full ID
///
/// An exact match wins over prefix matches.
///
/// # Errors
/// Returns an error if:
/// - No workflow matches the prefix
/// - Multiple workflows match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_workflow_id(client: &WorkflowClient, input: &str) -> Result<WorkflowId> {
    let ids = list_all_ids(client)
        .await
        .context("Failed to fetch workflows for ID resolution")?;

    match_prefix(&ids, input)
}

async fn list_all_ids(client: &WorkflowClient) -> Result<Vec<WorkflowId>> {
    let mut ids = Vec::new();
    let mut page = PageQuery::default();

    loop {
        let workflows = client.list_workflows(page).await?;
        let full_page = workflows.len() as u32 == page.page_size;
        ids.extend(workflows.into_iter().map(|w| w.id));

        if !full_page {
            return Ok(ids);
        }
        page.page += 1;
    }
}

fn match_prefix(ids: &[WorkflowId], input: &str) -> Result<WorkflowId> {
    if let Some(exact) = ids.iter().find(|id| id.as_str() == input) {
        return Ok(exact.clone());
    }

    let prefix = input.to_lowercase();
    let matches: Vec<_> = ids
        .iter()
        .filter(|id| id.as_str().to_lowercase().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!(
            "No workflow found with ID starting with '{}'",
            input
        )),
        1 => Ok(matches[0].clone()),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple workflows: {}",
                input,
                ids.join(", ")
            ))
        }
    }
}
