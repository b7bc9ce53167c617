//! Workflow document loading.
//!
//! Step sequences can be authored on disk as YAML or JSON, either as a
//! single workflow or as a bundle of several workflows keyed by name. The
//! loader normalizes both forms into a [`WorkflowBundle`] for the engine.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use gearbox_types::WorkflowStep;

/// A named, ordered step sequence as authored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow identifier used for lookups and logging.
    #[serde(default)]
    pub workflow: Option<String>,
    /// Optional descriptive copy.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered execution steps.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

/// Parsed workflows keyed by name, preserving document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowBundle {
    /// Workflows keyed by identifier.
    pub workflows: IndexMap<String, WorkflowDocument>,
}

impl WorkflowBundle {
    /// Looks up a workflow by name.
    pub fn get(&self, name: &str) -> Option<&WorkflowDocument> {
        self.workflows.get(name)
    }
}

/// Loads a workflow file with automatic format detection.
///
/// YAML is attempted first (JSON documents parse as YAML as well). A
/// multi-workflow document is tried before the single-workflow form so a
/// bundle is never silently accepted as a single workflow with ignored
/// fields.
pub fn parse_workflow_file(file_path: impl AsRef<Path>) -> Result<WorkflowBundle> {
    let file_path = file_path.as_ref();
    let file_content =
        fs::read(file_path).with_context(|| format!("Failed to read workflow file: {}", file_path.display()))?;
    let content_string = String::from_utf8_lossy(&file_content);

    #[derive(Deserialize)]
    struct MultiWorkflowDocument {
        workflows: IndexMap<String, WorkflowDocument>,
    }

    if let Ok(multi_workflow_document) = serde_yaml_ng::from_str::<MultiWorkflowDocument>(&content_string) {
        return Ok(WorkflowBundle {
            workflows: multi_workflow_document.workflows,
        });
    }

    if let Ok(workflow_document) = serde_yaml_ng::from_str::<WorkflowDocument>(&content_string) {
        let workflow_name = workflow_document.workflow.clone().unwrap_or_else(|| "default".to_string());

        let mut workflows = IndexMap::new();
        workflows.insert(workflow_name, workflow_document);

        return Ok(WorkflowBundle { workflows });
    }

    bail!(
        "Unsupported workflow document format. Expected one of:\n\
         - Single workflow with 'workflow' and 'steps' fields\n\
         - Multi-workflow document with workflows under a 'workflows' key\n\
         "
    );
}
