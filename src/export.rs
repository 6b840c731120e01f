//! Export and import of the element collection
//!
//! Provides the pretty JSON export, JSON import (wrapped or bare array) and
//! Graphviz DOT rendering of a flow subgraph.

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::Direction;
use crate::model::{ElementType, ElementsData};
use crate::store::{ElementStore, StoreError};
use crate::subgraph::{EdgeKind, Subgraph};

/// File name used when no export path is given
pub const EXPORT_FILE_NAME: &str = "troubleshooting-data.json";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not serialize elements: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// JSON
// =============================================================================

/// The whole collection as pretty JSON (2-space indent)
pub fn export_json(store: &ElementStore) -> Result<String, ExportError> {
    Ok(store.data().to_pretty_json()?)
}

/// Write the pretty export to `path`, or to [`EXPORT_FILE_NAME`] in the
/// current directory. Returns the path written.
pub fn write_export(store: &ElementStore, path: Option<&Path>) -> Result<PathBuf, ExportError> {
    let target = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME));
    let json = export_json(store)?;

    if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::write(&target, json + "\n").map_err(|source| ExportError::Io {
        path: target.clone(),
        source,
    })?;

    log::info!("exported {} element(s) to {}", store.len(), target.display());
    Ok(target)
}

/// Parse an import file in either the wrapped or bare-array form
pub fn read_import(path: &Path) -> Result<ElementsData, ExportError> {
    let content = fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ElementsData::from_json(&content).map_err(|source| ExportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the store's collection with the contents of `path`.
/// Nothing changes if the file is invalid.
pub fn import_file(store: &mut ElementStore, path: &Path) -> Result<usize, ExportError> {
    let data = read_import(path)?;
    Ok(store.replace_all(data)?)
}

// =============================================================================
// DOT
// =============================================================================

/// Configuration for DOT export
#[derive(Debug, Clone)]
pub struct DotConfig {
    pub title: Option<String>,
    /// Include element ids in labels
    pub show_ids: bool,
    pub direction: Direction,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            title: None,
            show_ids: true,
            direction: Direction::TopBottom,
        }
    }
}

fn node_shape(kind: ElementType) -> &'static str {
    match kind {
        ElementType::Category => "folder",
        ElementType::Problem => "octagon",
        ElementType::State => "ellipse",
        ElementType::Verification => "diamond",
        ElementType::Action => "box",
    }
}

fn node_color(kind: ElementType) -> &'static str {
    match kind {
        ElementType::Category => "#E6E6FA",
        ElementType::Problem => "#FFE4B5",
        ElementType::State => "#87CEEB",
        ElementType::Verification => "#FFFACD",
        ElementType::Action => "#90EE90",
    }
}

fn edge_color(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Next => "#333333",
        EdgeKind::Ok => "#228B22",
        EdgeKind::Ko => "#DC143C",
    }
}

/// Escape a string for DOT labels and quoted ids
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Render a flow subgraph as Graphviz DOT. OK edges are green, KO edges red.
pub fn subgraph_to_dot(graph: &Subgraph, config: &DotConfig) -> String {
    let rankdir = match config.direction {
        Direction::TopBottom => "TB",
        Direction::LeftRight => "LR",
    };

    let mut dot = String::new();
    let _ = writeln!(dot, "digraph TroubleshootingFlow {{");
    let _ = writeln!(dot, "  rankdir={};", rankdir);
    let _ = writeln!(dot, "  node [fontname=\"Arial\" fontsize=10];");
    let _ = writeln!(dot, "  edge [fontname=\"Arial\" fontsize=9];");
    if let Some(title) = &config.title {
        let _ = writeln!(dot, "  label=\"{}\";", escape_dot(title));
        let _ = writeln!(dot, "  labelloc=t;");
    }
    let _ = writeln!(dot);

    for node in &graph.nodes {
        let mut label = String::new();
        if config.show_ids {
            let _ = write!(label, "[{}] ", node.id);
        }
        label.push_str(&truncate(&node.title, 40));

        let _ = writeln!(
            dot,
            "  \"{}\" [label=\"{}\" shape=\"{}\" fillcolor=\"{}\" style=\"filled\"];",
            escape_dot(&node.id),
            escape_dot(&label),
            node_shape(node.kind),
            node_color(node.kind)
        );
    }

    let _ = writeln!(dot);

    for edge in &graph.edges {
        let mut attrs = vec![format!("color=\"{}\"", edge_color(edge.kind))];
        if let Some(label) = edge.label() {
            attrs.push(format!("label=\"{}\"", label));
            attrs.push(format!("fontcolor=\"{}\"", edge_color(edge.kind)));
        }
        let _ = writeln!(
            dot,
            "  \"{}\" -> \"{}\" [{}];",
            escape_dot(&edge.source),
            escape_dot(&edge.target),
            attrs.join(" ")
        );
    }

    let _ = writeln!(dot, "}}");
    dot
}
