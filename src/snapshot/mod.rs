// src/snapshot/mod.rs
//! Accessibility snapshots: the captured tree, its text outline, and the
//! transport envelope both capture strategies write to disk.
//!
//! ```text
//! capture strategy → AccessibilityNode → outline::serialize → Vec<String>
//!                                       ↘ transport::SnapshotEnvelope (json + txt mirror)
//! ```
//!
//! The outline is the contract with the extraction step: it is parsed line
//! by line by indentation, so its shape must never drift between runs.

pub mod node;
pub mod outline;
pub mod transport;

pub use node::{AccessibilityNode, Property, Role};
pub use outline::{serialize, to_text};
pub use transport::SnapshotEnvelope;
