use crate::{Channel, ImsvdError, RawImage, Result};

pub fn mean_squared_error(original: &Channel, approx: &Channel) -> Result<f64> {
    if original.dim() != approx.dim() {
        return Err(ImsvdError::Format(format!(
            "channel shapes differ: {:?} vs {:?}",
            original.dim(),
            approx.dim()
        )));
    }
    if original.is_empty() {
        return Ok(0.0);
    }

    let sum: f64 = original
        .iter()
        .zip(approx.iter())
        .map(|(&a, &b)| {
            let d = f64::from(a) - f64::from(b);
            d * d
        })
        .sum();
    Ok(sum / original.len() as f64)
}

/// Peak signal-to-noise ratio in dB for 8-bit data; infinite for identical inputs.
pub fn psnr(original: &Channel, approx: &Channel) -> Result<f64> {
    let mse = mean_squared_error(original, approx)?;
    Ok(psnr_from_mse(mse))
}

fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (255.0 * 255.0 / mse).log10()
}

/// Mean squared error averaged over the three channels.
pub fn image_mse(original: &RawImage, approx: &RawImage) -> Result<f64> {
    let mut total = 0.0;
    for (a, b) in original.channels().iter().zip(approx.channels().iter()) {
        total += mean_squared_error(a, b)?;
    }
    Ok(total / 3.0)
}

pub fn image_psnr(original: &RawImage, approx: &RawImage) -> Result<f64> {
    Ok(psnr_from_mse(image_mse(original, approx)?))
}
