use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Singular intrinsic matrix (fx = {fx}, fy = {fy})")]
    SingularIntrinsics { fx: f64, fy: f64 },

    #[error("Invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Reference transform is not invertible")]
    SingularTransform,

    #[error("Expected {expected} values, found {found}")]
    ArrayLength { expected: usize, found: usize },

    #[error("Vertex index {index} out of bounds for {len} vertices")]
    VertexIndex { index: usize, len: usize },

    #[error("Unknown part {0}")]
    UnknownPart(u32),

    #[error("No {0} selected")]
    NothingSelected(&'static str),

    #[error("{what} index {index} out of range for {len} entries")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Dataset JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
