use thiserror::Error;

/// Result type alias for imsvd operations
pub type Result<T> = std::result::Result<T, ImsvdError>;

/// Errors raised while compressing, decoding or decomposing images
#[derive(Error, Debug)]
pub enum ImsvdError {
    /// Bad magic, truncated payload or malformed dimensions
    #[error("invalid IMSVD container: {0}")]
    Format(String),

    /// The byte budget cannot hold even a rank-1 factorization
    #[error(
        "desired size of {desired} bytes is impossible for a {height}x{width} image without losing all data"
    )]
    Size { desired: u64, height: usize, width: usize },

    /// Degenerate input or a decomposition that failed to converge
    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
