use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mzgen::errors::{Result, SimError};
use mzgen::io::mzml::write_mzml;
use mzgen::io::properties_csv::read_peak_properties_path;
use mzgen::sim::dda::DdaAcquisition;
use mzgen::sim::fragmentation::KnowledgeBaseFragmentor;
use mzgen::sim::isotopologue::{build_isotopologue_library, ConvolutionEnvelopeProvider};
use mzgen::sim::noise::{GaussNoiseInjector, NoiseInjector, PassthroughNoiseInjector};
use mzgen::sim::properties::{check_peak_properties, check_run_params, RawRunParams};

#[derive(Parser, Debug)]
#[command(name = "mzgen", version, about = "Generate a synthetic LC-MS run as mzML")]
struct Cli {
    /// Molecule configuration CSV, one row per molecule
    #[arg(short, long)]
    molecules: PathBuf,

    /// Run parameters JSON (gradient_length, ms_rt_diff, charges)
    #[arg(short, long)]
    params: PathBuf,

    /// Output mzML path; the molecule summary CSV lands next to it
    #[arg(short, long)]
    output: PathBuf,

    /// Seed for the noise generator; omit for entropy seeding
    #[arg(long)]
    seed: Option<u64>,

    /// Intensity noise level relative to each scan's base peak; 0 disables noise
    #[arg(long, default_value_t = 0.05)]
    noise_level: f64,
}

fn run(cli: Cli) -> Result<()> {
    let raw_rows = read_peak_properties_path(&cli.molecules)?;
    let properties = check_peak_properties(raw_rows)?;

    let params_file = File::open(&cli.params).map_err(|source| SimError::Io {
        source,
        path: Some(cli.params.clone()),
    })?;
    let raw_params: RawRunParams = serde_json::from_reader(params_file)?;
    let params = check_run_params(raw_params)?;

    info!(
        molecules = properties.len(),
        gradient_length = params.gradient_length,
        ms_rt_diff = params.ms_rt_diff,
        "configuration validated"
    );

    let provider = ConvolutionEnvelopeProvider::default();
    let envelopes = build_isotopologue_library(&properties, &provider, &params.charges)?;
    let fragmentor = KnowledgeBaseFragmentor::with_default_kb()?;

    let mut noise: Box<dyn NoiseInjector> = if cli.noise_level > 0.0 {
        match cli.seed {
            Some(seed) => Box::new(GaussNoiseInjector::from_seed(seed, cli.noise_level)),
            None => Box::new(GaussNoiseInjector::new(cli.noise_level)),
        }
    } else {
        Box::new(PassthroughNoiseInjector)
    };

    let acquisition =
        DdaAcquisition::new(&properties, &envelopes, &params, &fragmentor, noise.as_mut())
            .generate()?;
    let written = write_mzml(&cli.output, &acquisition, &properties)?;
    info!(path = %written.display(), scans = acquisition.scan_count(), "run written");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
