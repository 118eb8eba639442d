//! Terminal output: package tables and download progress.

pub mod progress;
pub mod table;
