//! diagtree - Troubleshooting decision tree editor
//!
//! Build, browse and reorganize diagnostic guides made of typed nodes.
//!
//! # Overview
//!
//! Every element sits in two relations at once. The **hierarchy** (`parent`)
//! organizes elements into a forest for browsing. The **flow** (`next`,
//! `next_ok`, `next_ko`) links them into a directed graph describing how a
//! diagnosis proceeds, loops included.
//!
//! # Element Types
//!
//! | Type | Purpose | Flow fields |
//! |------|---------|-------------|
//! | `category` | Groups related problems | none |
//! | `problem` | A reported symptom | none |
//! | `state` | Observed machine state | `next` |
//! | `verification` | A check with two outcomes | `next_ok`, `next_ko` |
//! | `action` | Something to do | `next` |
//!
//! # Quick Start
//!
//! ```no_run
//! use diagtree::{ElementStore, Element, ElementType, MemorySlot};
//! use diagtree::subgraph::extract;
//! use diagtree::layout::{LayeredLayout, LayoutConfig, LayoutEngine};
//!
//! let mut store = ElementStore::open(Box::new(MemorySlot::new()));
//!
//! let check = store
//!     .add(Element::new(ElementType::Verification, "Is the inlet filter clean?"))
//!     .unwrap();
//! let fix = store
//!     .add(Element::new(ElementType::Action, "Clean the inlet filter").with_parent(&check))
//!     .unwrap();
//!
//! let mut updated = store.get(&check).unwrap().clone();
//! updated.next_ko = Some(fix);
//! store.update(updated).unwrap();
//!
//! let graph = extract(&store, &check);
//! let layout = LayeredLayout.layout(&graph, &LayoutConfig::default());
//! println!("{} nodes, {} x {}", graph.nodes.len(), layout.width, layout.height);
//! ```

pub mod config;
pub mod db;
pub mod export;
pub mod layout;
pub mod model;
pub mod notice;
pub mod sample;
pub mod schema;
pub mod serve;
pub mod storage;
pub mod store;
pub mod subgraph;
pub mod tree;
pub mod tui;

pub use config::Config;
pub use db::SqliteSlot;
pub use export::{subgraph_to_dot, write_export, DotConfig, ExportError, EXPORT_FILE_NAME};
pub use layout::{Direction, LayeredLayout, Layout, LayoutConfig, LayoutEngine};
pub use model::{Element, ElementType, ElementsData, TreeNode, ELEMENT_TYPES};
pub use notice::{Notice, NoticeLevel};
pub use storage::{open_slot, JsonFileSlot, MemorySlot, StorageError, StorageSlot, DEFAULT_SLOT};
pub use store::{ElementStore, LoadSource, StoreError};
pub use subgraph::{EdgeKind, FlowEdge, Subgraph};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let store = ElementStore::in_memory(ElementsData::default());
        assert!(store.is_empty());
        assert_eq!(DEFAULT_SLOT, "elementsData");
        assert_eq!(ELEMENT_TYPES.len(), 5);
    }
}
