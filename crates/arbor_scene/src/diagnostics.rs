//! Per-node failures collected while updating or querying a scene.
//!
//! A failing node never aborts the traversal of its siblings: the error is
//! logged, recorded here against the node's handle, and the pass continues.

use arbor_core::ArborError;

use crate::NodeHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub node: NodeHandle,
    pub error: ArborError,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: NodeHandle, error: ArborError) {
        log::warn!("Node {node:?} skipped: {error}");
        self.entries.push(Diagnostic { node, error });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Errors recorded against `node`.
    pub fn for_node(&self, node: NodeHandle) -> impl Iterator<Item = &ArborError> {
        self.entries
            .iter()
            .filter(move |d| d.node == node)
            .map(|d| &d.error)
    }

    /// Moves every entry out, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}
