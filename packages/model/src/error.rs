use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Positions belong to different roots: '{left}' and '{right}'")]
    DisjointRoots { left: String, right: String },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Path {path:?} does not address a container in root '{root}'")]
    InvalidPath { root: String, path: Vec<usize> },

    #[error("Root not found: {0}")]
    RootNotFound(String),

    #[error("Node at {path:?} in root '{root}' is not an element")]
    NotAnElement { root: String, path: Vec<usize> },

    #[error("Offset {offset} is out of bounds (max offset {max})")]
    OffsetOutOfBounds { offset: usize, max: usize },
}

impl ModelError {
    pub fn disjoint_roots(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::DisjointRoots {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange(message.into())
    }

    pub fn invalid_path(root: impl Into<String>, path: &[usize]) -> Self {
        Self::InvalidPath {
            root: root.into(),
            path: path.to_vec(),
        }
    }
}
