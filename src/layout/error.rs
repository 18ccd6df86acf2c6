pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("unknown boundary: {id}")]
    UnknownBoundary { id: String },

    #[error("node {id} is not a boundary")]
    NotABoundary { id: String },

    #[error("layout algorithm failed for boundary {boundary}: {message}")]
    AlgorithmFailed { boundary: String, message: String },

    #[error("layout algorithm returned {returned} nodes for {expected} children of {boundary}")]
    ChildCountMismatch {
        boundary: String,
        expected: usize,
        returned: usize,
    },
}
