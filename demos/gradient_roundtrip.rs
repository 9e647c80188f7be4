use imsvd::metrics::image_psnr;
use imsvd::{Channel, Engine, EngineConfig, Method, RawImage, codec, compress, container_size};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== SVD Image Compression ===\n");

    let (height, width) = (96, 128);
    let image = synthetic_image(height, width)?;
    let raw_bytes = 3 * height * width;
    println!("Synthetic image: {}x{} ({} raw bytes)\n", height, width, raw_bytes);

    let config = EngineConfig::new().seed(42);

    for &k in &[4, 16, 48] {
        let budget = container_size(height, width, k) as u64;
        println!("--- Budget {} bytes (ratio {:.2}) ---", budget, raw_bytes as f64 / budget as f64);

        for method in Method::ALL {
            match run(&image, budget, method, &config) {
                Ok(msg) => println!("{}", msg),
                Err(e) => println!("{:>12}: failed: {}", method, e),
            }
        }
        println!();
    }

    Ok(())
}

fn run(image: &RawImage, budget: u64, method: Method, config: &EngineConfig) -> Result<String, Box<dyn std::error::Error>> {
    let engine = Engine::from_method(method, config);
    let compressed = compress(image, budget, &engine)?;
    let bytes = codec::encode(&compressed);
    let restored = codec::decode(&bytes)?.to_raw();
    let psnr = image_psnr(image, &restored)?;

    Ok(format!(
        "{:>12}: k={:<3} container={} bytes, PSNR={:.2} dB",
        method,
        compressed.k(),
        bytes.len(),
        psnr
    ))
}

fn synthetic_image(height: usize, width: usize) -> Result<RawImage, Box<dyn std::error::Error>> {
    let r = Channel::from_shape_fn((height, width), |(i, j)| {
        let v = 128.0 + 100.0 * ((i as f64) / 15.0).sin() * ((j as f64) / 23.0).cos();
        v.clamp(0.0, 255.0) as u8
    });
    let g = Channel::from_shape_fn((height, width), |(i, j)| ((i + j) * 255 / (height + width)) as u8);
    let b = Channel::from_shape_fn((height, width), |(i, j)| if (i / 16 + j / 16) % 2 == 0 { 220 } else { 35 });
    Ok(RawImage::new(r, g, b)?)
}
