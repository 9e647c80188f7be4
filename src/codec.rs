//! The IMSVD container.
//!
//! Binary format (little-endian):
//! - Header (17 bytes):
//!   [0..5]   magic "IMSVD"
//!   [5..9]   height (u32)
//!   [9..13]  width (u32)
//!   [13..17] k (u32)
//! - Per channel, R then G then B:
//!   U   height x k f32, row-major
//!   S   k f32
//!   Vh  k x width f32, row-major
//!
//! Total length is `17 + 12·(height·k + k + k·width)`, see [`crate::container_size`].

use crate::compressor::CompressedImage;
use crate::svd::SvdResult;
use crate::{Factor, FactorVector, ImsvdError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const MAGIC: &[u8; 5] = b"IMSVD";
pub const HEADER_BYTES: usize = 17;
pub const FLOAT_BYTES: usize = 4;
pub const CHANNELS: usize = 3;

pub fn encode(image: &CompressedImage) -> Vec<u8> {
    let (height, width, k) = (image.height(), image.width(), image.k());
    let mut buf = Vec::with_capacity(crate::container_size(height, width, k));

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(height as u32).to_le_bytes());
    buf.extend_from_slice(&(width as u32).to_le_bytes());
    buf.extend_from_slice(&(k as u32).to_le_bytes());

    for channel in image.channels() {
        for &x in channel.u.iter().chain(channel.s.iter()).chain(channel.vh.iter()) {
            buf.extend_from_slice(&x.to_le_bytes());
        }
    }
    buf
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len()).ok_or_else(|| {
            ImsvdError::Format(format!(
                "truncated container: need {} bytes at offset {}, only {} available",
                len,
                self.pos,
                self.data.len() - self.pos
            ))
        })?;
        let data = self.data;
        let bytes = &data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn floats(&mut self, count: usize) -> Result<Vec<f32>> {
        let len = count
            .checked_mul(FLOAT_BYTES)
            .ok_or_else(|| ImsvdError::Format("factor size overflows".to_string()))?;
        let bytes = self.take(len)?;
        Ok(bytes
            .chunks_exact(FLOAT_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn factor(&mut self, rows: usize, cols: usize) -> Result<Factor> {
        let values = self.floats(rows * cols)?;
        Factor::from_shape_vec((rows, cols), values).map_err(|e| ImsvdError::Format(e.to_string()))
    }

    fn channel(&mut self, height: usize, width: usize, k: usize) -> Result<SvdResult> {
        let u = self.factor(height, k)?;
        let s = FactorVector::from(self.floats(k)?);
        let vh = self.factor(k, width)?;
        Ok(SvdResult { u, s, vh })
    }
}

pub fn decode(data: &[u8]) -> Result<CompressedImage> {
    let mut reader = Reader { data, pos: 0 };

    let magic = reader.take(MAGIC.len())?;
    if magic != MAGIC {
        return Err(ImsvdError::Format("not an IMSVD container (bad magic)".to_string()));
    }
    let height = reader.u32()? as usize;
    let width = reader.u32()? as usize;
    let k = reader.u32()? as usize;

    if height == 0 || width == 0 {
        return Err(ImsvdError::Format(format!("empty image dimensions {}x{}", height, width)));
    }
    if k == 0 || k > height.min(width) {
        return Err(ImsvdError::Format(format!(
            "rank {} out of range for a {}x{} image",
            k, height, width
        )));
    }

    let expected = (height as u128 * k as u128 + k as u128 + k as u128 * width as u128)
        * (CHANNELS * FLOAT_BYTES) as u128
        + HEADER_BYTES as u128;
    if (data.len() as u128) < expected {
        return Err(ImsvdError::Format(format!(
            "truncated container: header declares {} bytes, got {}",
            expected,
            data.len()
        )));
    }
    if data.len() as u128 > expected {
        return Err(ImsvdError::Format(format!(
            "{} trailing bytes after the declared payload",
            data.len() as u128 - expected
        )));
    }

    let r = reader.channel(height, width, k)?;
    let g = reader.channel(height, width, k)?;
    let b = reader.channel(height, width, k)?;
    debug!(height, width, k, bytes = data.len(), "decoded container");

    CompressedImage::new(height, width, k, r, g, b)
}

/// Writes the container next to `path` under a temporary name, then renames it
/// into place so a failed write never leaves a partial file at `path`.
pub fn write_file(path: &Path, image: &CompressedImage) -> Result<()> {
    let bytes = encode(image);
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, &bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "wrote container");
    Ok(())
}

pub fn read_file(path: &Path) -> Result<CompressedImage> {
    let data = fs::read(path)?;
    decode(&data)
}
