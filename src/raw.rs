use crate::{Channel, ImsvdError, Result};
use image::{Rgb, RgbImage};
use std::path::Path;

/// An 8-bit RGB image split into three `height x width` channel matrices.
#[derive(Clone, Debug, PartialEq)]
pub struct RawImage {
    height: usize,
    width: usize,
    r: Channel,
    g: Channel,
    b: Channel,
}

impl RawImage {
    pub fn new(r: Channel, g: Channel, b: Channel) -> Result<Self> {
        let (height, width) = r.dim();
        if g.dim() != (height, width) || b.dim() != (height, width) {
            return Err(ImsvdError::Format(format!(
                "channel shapes differ: R {:?}, G {:?}, B {:?}",
                r.dim(),
                g.dim(),
                b.dim()
            )));
        }
        Ok(Self { height, width, r, g, b })
    }

    pub(crate) fn from_channels(height: usize, width: usize, r: Channel, g: Channel, b: Channel) -> Self {
        debug_assert!(r.dim() == (height, width) && g.dim() == (height, width) && b.dim() == (height, width));
        Self { height, width, r, g, b }
    }

    /// Decodes any format the `image` crate understands, converting to RGB8.
    pub fn open(path: &Path) -> Result<Self> {
        let rgb = image::open(path)?.to_rgb8();
        Ok(Self::from_rgb(&rgb))
    }

    /// Encodes by the extension of `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_rgb().save(path)?;
        Ok(())
    }

    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let plane = |c: usize| Channel::from_shape_fn((height, width), |(y, x)| rgb.get_pixel(x as u32, y as u32)[c]);
        Self::from_channels(height, width, plane(0), plane(1), plane(2))
    }

    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let (y, x) = (y as usize, x as usize);
            Rgb([self.r[[y, x]], self.g[[y, x]], self.b[[y, x]]])
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn r(&self) -> &Channel {
        &self.r
    }

    pub fn g(&self) -> &Channel {
        &self.g
    }

    pub fn b(&self) -> &Channel {
        &self.b
    }

    pub fn channels(&self) -> [&Channel; 3] {
        [&self.r, &self.g, &self.b]
    }
}
