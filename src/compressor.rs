use crate::raw::RawImage;
use crate::svd::{SvdEngine, SvdResult};
use crate::{Channel, ImsvdError, Result, select_rank};
use tracing::{debug, info, warn};

/// Rank-k factors of the three channels of a `height x width` image.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedImage {
    height: usize,
    width: usize,
    k: usize,
    r: SvdResult,
    g: SvdResult,
    b: SvdResult,
}

impl CompressedImage {
    /// Checks that every channel holds exactly `k` triplets shaped for `height x width`.
    pub fn new(height: usize, width: usize, k: usize, r: SvdResult, g: SvdResult, b: SvdResult) -> Result<Self> {
        if height > u32::MAX as usize || width > u32::MAX as usize || k > u32::MAX as usize {
            return Err(ImsvdError::Format(format!(
                "dimensions {}x{} at rank {} exceed the container's 32-bit fields",
                height, width, k
            )));
        }
        for (name, channel) in [("R", &r), ("G", &g), ("B", &b)] {
            let shapes_match = channel.u.dim() == (height, k)
                && channel.s.len() == k
                && channel.vh.dim() == (k, width);
            if !shapes_match {
                return Err(ImsvdError::Format(format!(
                    "{} factors have shapes {:?}, {}, {:?}; expected ({}, {}), {}, ({}, {})",
                    name,
                    channel.u.dim(),
                    channel.s.len(),
                    channel.vh.dim(),
                    height,
                    k,
                    k,
                    k,
                    width
                )));
            }
        }
        Ok(Self { height, width, k, r, g, b })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn r(&self) -> &SvdResult {
        &self.r
    }

    pub fn g(&self) -> &SvdResult {
        &self.g
    }

    pub fn b(&self) -> &SvdResult {
        &self.b
    }

    /// Channels in storage order.
    pub fn channels(&self) -> [&SvdResult; 3] {
        [&self.r, &self.g, &self.b]
    }

    /// Reconstructs all three channels in parallel.
    pub fn to_raw(&self) -> RawImage {
        let (r, (g, b)) = rayon::join(
            || reconstruct(&self.r),
            || rayon::join(|| reconstruct(&self.g), || reconstruct(&self.b)),
        );
        RawImage::from_channels(self.height, self.width, r, g, b)
    }
}

/// Factors each channel of `image` at the largest rank whose container fits
/// `desired_bytes`.
///
/// The rank is clamped to `min(height, width)`; channels whose numerical rank
/// is lower are padded with zero triplets so all three hold exactly `k`.
pub fn compress<E: SvdEngine + ?Sized>(image: &RawImage, desired_bytes: u64, engine: &E) -> Result<CompressedImage> {
    let (height, width) = (image.height(), image.width());
    let selected = select_rank(desired_bytes, height, width)?;
    let full_rank = height.min(width);
    let k = if selected > full_rank {
        warn!(selected, full_rank, "requested size exceeds the full-rank container; clamping rank");
        full_rank
    } else {
        selected
    };
    info!(height, width, k, method = engine.name(), "compressing image");

    let factor = |name: &str, channel: &Channel| -> Result<SvdResult> {
        let svd = engine.compute_truncated(channel, k)?;
        debug!(channel = name, found = svd.rank(), k, "channel factored");
        Ok(svd.truncate(k).pad(k))
    };

    let (r, (g, b)) = rayon::join(
        || factor("R", image.r()),
        || rayon::join(|| factor("G", image.g()), || factor("B", image.b())),
    );
    CompressedImage::new(height, width, k, r?, g?, b?)
}

/// `U · diag(S) · Vh`, clipped to `[0, 255]` and rounded to the nearest intensity.
pub fn reconstruct(channel: &SvdResult) -> Channel {
    let u = channel.u.mapv(f64::from);
    let s = channel.s.mapv(f64::from);
    let vh = channel.vh.mapv(f64::from);
    (&u * &s).dot(&vh).mapv(|x| x.clamp(0.0, 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::{PowerIteration, ReferenceSvd};
    use crate::{Engine, EngineConfig, Method, container_size};
    use ndarray::{Array2, array};

    fn gradient_image(height: usize, width: usize) -> RawImage {
        let r = Array2::from_shape_fn((height, width), |(i, _)| ((i * 255) / height.max(1)) as u8);
        let g = Array2::from_shape_fn((height, width), |(i, j)| ((i * 7 + j * 11) % 256) as u8);
        let b = Array2::from_shape_fn((height, width), |(i, j)| ((j * 255) / width.max(1)) as u8 ^ (i as u8));
        RawImage::new(r, g, b).unwrap()
    }

    #[test]
    fn test_full_rank_round_trip_reference() {
        let image = gradient_image(8, 12);
        let size = container_size(8, 12, 8) as u64;
        let compressed = compress(&image, size, &ReferenceSvd::new()).unwrap();
        assert_eq!(compressed.k(), 8);

        let restored = compressed.to_raw();
        for (original, rebuilt) in image.channels().iter().zip(restored.channels().iter()) {
            for (a, b) in original.iter().zip(rebuilt.iter()) {
                assert!((*a as i16 - *b as i16).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_rank_follows_budget() {
        let image = gradient_image(10, 10);
        let size = container_size(10, 10, 3) as u64 + 5;
        let compressed = compress(&image, size, &ReferenceSvd::new()).unwrap();
        assert_eq!(compressed.k(), 3);
        for channel in compressed.channels() {
            assert_eq!(channel.u.shape(), &[10, 3]);
            assert_eq!(channel.vh.shape(), &[3, 10]);
        }
    }

    #[test]
    fn test_oversized_budget_clamps_rank() {
        let image = gradient_image(4, 6);
        let compressed = compress(&image, 1_000_000, &ReferenceSvd::new()).unwrap();
        assert_eq!(compressed.k(), 4);
    }

    #[test]
    fn test_budget_too_small_is_size_error() {
        let image = gradient_image(4, 6);
        let result = compress(&image, 20, &ReferenceSvd::new());
        assert!(matches!(result, Err(ImsvdError::Size { .. })));
    }

    #[test]
    fn test_rank_deficient_channels_padded() {
        let flat = Channel::from_elem((5, 5), 120);
        let image = RawImage::new(flat.clone(), flat.clone(), Channel::zeros((5, 5))).unwrap();
        let power = PowerIteration::new().random_state(3);

        let compressed = compress(&image, container_size(5, 5, 4) as u64, &power).unwrap();
        assert_eq!(compressed.k(), 4);
        for channel in compressed.channels() {
            assert_eq!(channel.rank(), 4);
        }
        assert_eq!(compressed.b().s, array![0.0f32, 0.0, 0.0, 0.0]);

        let restored = compressed.to_raw();
        assert_eq!(restored.r(), &flat);
        assert_eq!(restored.b(), &Channel::zeros((5, 5)));
    }

    #[test]
    fn test_every_method_produces_consistent_image() {
        let image = gradient_image(12, 9);
        let size = container_size(12, 9, 9) as u64;
        let config = EngineConfig::default().seed(17).max_rounds(5000);
        for method in Method::ALL {
            let engine = Engine::from_method(method, &config);
            let compressed = compress(&image, size, &engine).unwrap();
            assert_eq!(compressed.k(), 9);
            assert_eq!(crate::codec::encode(&compressed).len(), size as usize);
        }
    }

    #[test]
    fn test_reconstruct_clips_and_rounds() {
        let svd = SvdResult {
            u: array![[1.0], [1.0], [1.0]],
            s: array![1.0],
            vh: array![[-20.0, 99.6, 300.0]],
        };
        let rebuilt = reconstruct(&svd);
        assert_eq!(rebuilt, array![[0u8, 100, 255], [0, 100, 255], [0, 100, 255]]);
    }

    #[test]
    fn test_constructor_rejects_mismatched_shapes() {
        let good = SvdResult {
            u: Array2::zeros((2, 1)),
            s: array![1.0],
            vh: Array2::zeros((1, 3)),
        };
        let bad = SvdResult {
            u: Array2::zeros((3, 1)),
            s: array![1.0],
            vh: Array2::zeros((1, 3)),
        };
        assert!(CompressedImage::new(2, 3, 1, good.clone(), good.clone(), good.clone()).is_ok());
        assert!(CompressedImage::new(2, 3, 1, good.clone(), bad, good).is_err());
    }
}
