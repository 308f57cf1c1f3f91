//! Data model for crawl targets, work items and catalogs
//!
//! # Components
//!
//! - `Target`: a remote node listed in the target directory
//! - `WorkItem`: the per-cycle retry ledger for one target
//! - `Catalog`: the recursive catalog tree published by a node
//! - `algebra`: pure copy/merge/flatten operations on catalogs

pub mod algebra;
mod catalog;
mod target;

// Re-export main types
pub use catalog::{
    Catalog, DataService, Dataset, DatasetNode, Distribution, PROPERTY_ORIGINATOR,
};
pub use target::{Target, UpdateRequest, UpdateResponse, WorkItem};
