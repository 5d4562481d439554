//! Error types for the renderer and the graph boundary
//!
//! Configuration errors are returned synchronously and never retried: a
//! missing program, a bad node position or an invalid settings value aborts
//! the operation and leaves the previous state in place.

use std::fmt;

use thiserror::Error;

/// Which kind of graph entity a value refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Node,
    Edge,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => f.write_str("node"),
            EntityKind::Edge => f.write_str("edge"),
        }
    }
}

/// Errors raised by graph mutations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A node or edge with this key already exists
    #[error("{kind} \"{key}\" already exists")]
    Duplicate { kind: EntityKind, key: String },

    /// No node or edge with this key
    #[error("{kind} \"{key}\" not found")]
    NotFound { kind: EntityKind, key: String },
}

/// Errors raised by the renderer, its settings and its GPU backend
#[derive(Error, Debug)]
pub enum RendererError {
    /// An entity declares a type with no registered program
    #[error("could not find a suitable program for {kind} type \"{program_type}\"")]
    MissingProgram {
        kind: EntityKind,
        program_type: String,
    },

    /// A node lacks finite `x`/`y` coordinates
    #[error(
        "could not find a valid position (x, y) for node \"{node}\": all nodes must have finite numeric x and y"
    )]
    InvalidNodePosition { node: String },

    /// The viewport has no area and `allowInvalidContainer` is not set
    #[error(
        "container has no usable size ({width}x{height}); set allowInvalidContainer to accept it"
    )]
    InvalidContainer { width: f64, height: f64 },

    /// A settings value or combination of values is invalid
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A shader failed to compile or a pipeline failed to link
    #[error("shader compilation failed for {program}: {message}")]
    ShaderCompilation { program: String, message: String },

    /// A partial refresh asked to repaint an entity that has no GPU slot yet
    #[error("{kind} \"{key}\" can't be repainted before it has been indexed")]
    NotIndexed { kind: EntityKind, key: String },

    /// The entity does not exist in the graph
    #[error("{kind} \"{key}\" does not exist in the graph")]
    UnknownEntity { kind: EntityKind, key: String },

    /// The graph is mutably borrowed elsewhere while the renderer needs it
    #[error("the graph is borrowed elsewhere and cannot be read")]
    GraphBusy,

    /// GPU device or readback failure
    #[error("GPU error: {0}")]
    Gpu(String),

    /// The renderer has been killed and can no longer be used
    #[error("the renderer has been killed")]
    Killed,

    /// An I/O error occurred while loading settings
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings file could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for renderer operations
pub type RendererResult<T> = Result<T, RendererError>;
