//! Panes of the main screen

pub mod detail;
pub mod diagram;
pub mod tree;
