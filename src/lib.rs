//! Image compression through per-channel truncated SVD.
//!
//! Each color channel is factored as `U · diag(S) · Vh`, truncated to the
//! largest rank that fits a requested byte budget, and stored in the IMSVD
//! container. See [`compress_to_container`] and [`decompress_container`].

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod codec;
pub mod compressor;
pub mod config;
pub mod error;
pub mod linalg;
pub mod metrics;
pub mod rank;
pub mod raw;
pub mod svd;

pub use compressor::{CompressedImage, compress, reconstruct};
pub use config::{EngineConfig, Method};
pub use error::{ImsvdError, Result};
pub use rank::{container_size, select_rank};
pub use raw::RawImage;
pub use svd::{BlockPowerIteration, Engine, PowerIteration, ReferenceSvd, SvdEngine, SvdResult, Tolerance};

/// Working-precision vector used inside the solvers.
pub type Vector = Array1<f64>;
/// Working-precision matrix used inside the solvers.
pub type Matrix = Array2<f64>;
/// One 8-bit color plane, `height x width`.
pub type Channel = Array2<u8>;
/// Stored factor matrix.
pub type Factor = Array2<f32>;
/// Stored singular values.
pub type FactorVector = Array1<f32>;

/// Compresses `image` into an IMSVD container no larger than `target_bytes`.
pub fn compress_to_container<E: SvdEngine + ?Sized>(
    image: &RawImage,
    target_bytes: u64,
    engine: &E,
) -> Result<Vec<u8>> {
    let compressed = compress(image, target_bytes, engine)?;
    Ok(codec::encode(&compressed))
}

/// Decodes an IMSVD container and reconstructs the approximate image.
pub fn decompress_container(bytes: &[u8]) -> Result<RawImage> {
    let compressed = codec::decode(bytes)?;
    Ok(compressed.to_raw())
}
