//! Error Types
//!
//! This module defines the error type shared by every Arbor crate.
//!
//! # Overview
//!
//! [`ArborError`] groups failures into three families:
//! - Degenerate input (singular matrices, zero-length vectors). These are only
//!   surfaced when the caller opted into [`InversionPolicy::Error`](crate::math::InversionPolicy);
//!   otherwise the math kernel warns and substitutes a safe value.
//! - Structural errors (unknown handles, hierarchy cycles, index ranges). These are
//!   programmer errors and are returned immediately.
//! - Data-quality problems (non-finite bounds, missing attributes). These are usually
//!   logged and the dependent feature is skipped; the variants exist so that hosts
//!   can collect them as diagnostics.
//!
//! # Usage
//!
//! ```rust,ignore
//! use arbor_core::errors::{ArborError, Result};
//!
//! fn bind() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Arbor scene core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArborError {
    // ========================================================================
    // Degenerate Input
    // ========================================================================
    /// Matrix inversion was requested on a matrix with a zero (or non-finite) determinant.
    #[error("Cannot invert matrix: determinant is {determinant}")]
    SingularMatrix {
        /// The offending determinant
        determinant: f32,
    },

    /// A vector with zero length was normalized.
    #[error("Cannot normalize zero-length vector ({context})")]
    ZeroLengthVector {
        /// What was being normalized
        context: &'static str,
    },

    // ========================================================================
    // Structural Errors
    // ========================================================================
    /// The node handle does not refer to a live node.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The geometry key does not refer to a live geometry.
    #[error("Geometry not found: {0}")]
    GeometryNotFound(String),

    /// The material key does not refer to a live material.
    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    /// The skeleton key does not refer to a live skeleton.
    #[error("Skeleton not found: {0}")]
    SkeletonNotFound(String),

    /// Attaching would make a node its own ancestor.
    #[error("Hierarchy cycle: cannot attach {child} under {parent}")]
    HierarchyCycle {
        /// The node being attached
        child: String,
        /// The requested parent
        parent: String,
    },

    /// An index referenced data outside of its container.
    #[error("Index out of range: {context} (index: {index}, len: {len})")]
    IndexOutOfRange {
        /// Description of what was being accessed
        context: String,
        /// The invalid index
        index: usize,
        /// Length of the container
        len: usize,
    },

    /// Bone and inverse-bind matrix lists have different lengths.
    #[error("Skeleton has {bones} bones but {inverses} inverse bind matrices")]
    BoneInverseMismatch {
        /// Number of bones
        bones: usize,
        /// Number of inverse bind matrices
        inverses: usize,
    },

    /// Attributes drawn together do not share the same element count.
    #[error("Attribute '{name}' has {found} elements, expected {expected}")]
    AttributeCountMismatch {
        /// Attribute name
        name: String,
        /// Count of the reference attribute
        expected: usize,
        /// Count of this attribute
        found: usize,
    },

    /// The operation requires a skinned mesh node.
    #[error("Node is not a skinned mesh: {0}")]
    NotASkinnedMesh(String),

    // ========================================================================
    // Data Quality
    // ========================================================================
    /// A computed bounding volume contains NaN or infinite values.
    #[error("Computed bounding volume is not finite ({0})")]
    NonFiniteBounds(String),

    /// An attribute required by an operation is absent.
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),
}

impl ArborError {
    /// Returns `true` for errors caused by degenerate numeric input.
    #[must_use]
    pub fn is_degenerate_input(&self) -> bool {
        matches!(
            self,
            Self::SingularMatrix { .. } | Self::ZeroLengthVector { .. }
        )
    }

    /// Returns `true` for data-quality problems that callers usually log and skip.
    #[must_use]
    pub fn is_data_quality(&self) -> bool {
        matches!(self, Self::NonFiniteBounds(_) | Self::MissingAttribute(_))
    }
}

/// Alias for `Result<T, ArborError>`.
pub type Result<T> = std::result::Result<T, ArborError>;
