use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use imsvd::{Engine, EngineConfig, Method, RawImage, Tolerance, codec, compress, metrics};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "imsvd", about = "Compress and decompress images using SVD")]
struct Args {
    /// Input file path
    #[arg(short, long)]
    input: PathBuf,
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
    /// Compression ratio: target size is input file size / ratio
    #[arg(short, long, conflicts_with = "size")]
    ratio: Option<f64>,
    /// Absolute target container size in bytes
    #[arg(short, long)]
    size: Option<u64>,
    /// SVD computation method: reference, power or block_power
    #[arg(short, long)]
    method: Option<Method>,
    /// Decompress an IMSVD container into an image
    #[arg(short, long, default_value_t = false)]
    decompress: bool,
    /// Seed for the iterative methods' random start vectors
    #[arg(long)]
    seed: Option<u64>,
    /// Power iteration: failure-probability parameter of the iteration bound
    #[arg(long, default_value_t = 0.1)]
    delta: f64,
    /// Power iteration: target accuracy of the iteration bound
    #[arg(long, default_value_t = 0.97)]
    epsilon: f64,
    /// Power iteration: assumed spectral gap of the iteration bound
    #[arg(long, default_value_t = 2.0)]
    lambda: f64,
    /// Power iteration: extract the full numerical rank before truncating
    #[arg(long, default_value_t = false)]
    exhaustive: bool,
    /// Block power iteration: absolute residual threshold
    #[arg(long, default_value_t = 1000.0, conflicts_with = "relative_tolerance")]
    tolerance: f64,
    /// Block power iteration: residual threshold as a fraction of the image norm
    #[arg(long)]
    relative_tolerance: Option<f64>,
    /// Block power iteration: maximum number of rounds
    #[arg(long, default_value_t = 1000)]
    max_rounds: usize,
    /// Log PSNR of the compressed image against the input
    #[arg(long, default_value_t = false)]
    report: bool,
    #[arg(long)]
    rayon_threads: Option<usize>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let tolerance = match self.relative_tolerance {
            Some(ratio) => Tolerance::Relative(ratio),
            None => Tolerance::Absolute(self.tolerance),
        };
        let mut config = EngineConfig::new()
            .delta(self.delta)
            .epsilon(self.epsilon)
            .lambda(self.lambda)
            .exhaustive(self.exhaustive)
            .tolerance(tolerance)
            .max_rounds(self.max_rounds);
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }
        config
    }

    fn target_size(&self) -> Result<u64> {
        match (self.size, self.ratio) {
            (Some(size), _) => Ok(size),
            (None, Some(ratio)) if ratio > 0.0 => {
                let raw_size = fs::metadata(&self.input)
                    .with_context(|| format!("Failed to stat {}", self.input.display()))?
                    .len();
                Ok((raw_size as f64 / ratio).floor() as u64)
            }
            (None, Some(ratio)) => bail!("compression ratio must be positive, got {}", ratio),
            (None, None) => bail!("one of -r/--ratio or -s/--size is required to compress"),
        }
    }
}

fn run_compress(args: &Args) -> Result<()> {
    let method = args
        .method
        .ok_or_else(|| anyhow!("-m/--method is required to compress"))?;
    let target = args.target_size()?;
    let engine = Engine::from_method(method, &args.engine_config());

    let started = Instant::now();
    let image = RawImage::open(&args.input)
        .with_context(|| format!("Failed to open image {}", args.input.display()))?;
    let compressed = compress(&image, target, &engine)?;
    codec::write_file(&args.output, &compressed)
        .with_context(|| format!("Failed to write container {}", args.output.display()))?;

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        method = %method,
        target,
        k = compressed.k(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compressed"
    );
    if args.report {
        let psnr = metrics::image_psnr(&image, &compressed.to_raw())?;
        info!(psnr_db = psnr, "reconstruction quality");
    }
    Ok(())
}

fn run_decompress(input: &Path, output: &Path) -> Result<()> {
    let started = Instant::now();
    let compressed = codec::read_file(input)
        .with_context(|| format!("Failed to read container {}", input.display()))?;
    compressed
        .to_raw()
        .save(output)
        .with_context(|| format!("Failed to save image {}", output.display()))?;
    info!(
        input = %input.display(),
        output = %output.display(),
        k = compressed.k(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "decompressed"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(threads) = args.rayon_threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            error!("rayon init failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let outcome = if args.decompress {
        run_decompress(&args.input, &args.output)
    } else {
        run_compress(&args)
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
