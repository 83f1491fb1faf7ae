//! Error types shared by the render core and its renderers.

use thiserror::Error;

use crate::node::NodeId;

/// Errors produced by the render core.
///
/// None of these reach the application through the coordinator: structural
/// anomalies are logged and the offending unit of work is skipped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A patch referenced a node the renderer has not registered.
    #[error("node {0} is not registered with the renderer")]
    MissingNode(NodeId),
    /// A patch referenced a parent the renderer has not registered.
    #[error("parent node {0} is not registered with the renderer")]
    MissingParent(NodeId),
    /// A child index fell outside the parent's children.
    #[error("index {index} is out of bounds for {parent} with {len} children")]
    IndexOutOfBounds {
        /// Parent whose children were addressed.
        parent: NodeId,
        /// Requested index.
        index: usize,
        /// Number of children at the time.
        len: usize,
    },
    /// The host platform rejected an operation.
    #[error("host renderer error: {0}")]
    Host(String),
    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result alias used across the core.
pub type Result<T, E = Error> = core::result::Result<T, E>;
