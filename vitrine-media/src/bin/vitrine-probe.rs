use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use vitrine_config::MediaRuntimeConfig;
use vitrine_media::peaks::{HttpPeakSource, PeakSource, WaveformPeaks, descriptor_url};
use vitrine_media::streaming::{
    DeviceProfile, NetworkConditions, compute_cap, fetch_manifest_levels_with_retry,
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "vitrine-probe")]
#[command(
    about = "Inspect what the media runtime would load: rendition ladders, quality caps and waveform peaks"
)]
struct Cli {
    /// Configuration file (TOML or JSON). Defaults to the environment and the
    /// usual file candidates.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a master playlist and show the level a session would be capped at
    Levels {
        manifest: Url,
        /// Estimated downlink in Mbps
        #[arg(long)]
        downlink: Option<f64>,
        /// Pretend the user asked for reduced data usage
        #[arg(long, default_value_t = false)]
        save_data: bool,
        #[arg(long)]
        cores: Option<u32>,
        #[arg(long)]
        memory_gb: Option<f64>,
    },
    /// Fetch and normalize the peak descriptor for an audio source
    Peaks {
        src: String,
        /// Downsample to this many bars for display
        #[arg(long, default_value_t = 64)]
        bars: usize,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,vitrine_media=info,vitrine_config=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => MediaRuntimeConfig::load_from_file(path)?,
        None => MediaRuntimeConfig::load_from_env()?.0,
    };

    match cli.command {
        Command::Levels {
            manifest,
            downlink,
            save_data,
            cores,
            memory_gb,
        } => {
            let network = NetworkConditions {
                save_data,
                downlink_mbps: downlink,
            };
            let device = DeviceProfile {
                cpu_cores: cores,
                memory_gb,
            };
            probe_levels(&config, &manifest, network, device).await
        }
        Command::Peaks { src, bars } => probe_peaks(&config, &src, bars).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn probe_levels(
    config: &MediaRuntimeConfig,
    manifest: &Url,
    network: NetworkConditions,
    device: DeviceProfile,
) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;
    let levels = fetch_manifest_levels_with_retry(&client, manifest, &config.streaming)
        .await
        .with_context(|| format!("failed to load {manifest}"))?;

    let cap = compute_cap(&levels, &config.streaming, Some(&network), Some(&device));
    for (index, level) in levels.iter().enumerate() {
        let marker = match cap {
            Some(cap) if index == cap.max_level => "<- cap",
            Some(cap) if index > cap.max_level => "   (excluded)",
            _ => "",
        };
        println!(
            "{index:>2}  {:>8}  {:>6} kbps  {} {marker}",
            level.label(),
            level.bandwidth / 1000,
            level.uri
        );
    }
    if let Some(cap) = cap {
        println!("cap reason: {:?}", cap.reason);
    }
    Ok(())
}

async fn probe_peaks(config: &MediaRuntimeConfig, src: &str, bars: usize) -> anyhow::Result<()> {
    let base = Url::parse(&config.waveform.base_url)
        .with_context(|| format!("invalid waveform base url {}", config.waveform.base_url))?;
    println!("descriptor: {}", descriptor_url(&base, src)?);

    let source = HttpPeakSource::new(base)?;
    let Some(descriptor) = source.fetch(src).await? else {
        bail!("no peak descriptor published for {src}; players fall back to a plain bar");
    };
    let peaks = WaveformPeaks::from_descriptor(descriptor, config.waveform.bins)?;

    println!("duration: {:.2}s, bins: {}", peaks.duration(), peaks.len());
    println!("{}", sparkline(&peaks.bars(bars)));
    Ok(())
}

fn sparkline(samples: &[f32]) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    samples
        .iter()
        .map(|sample| {
            let index = (sample.clamp(0.0, 1.0) * (LEVELS.len() - 1) as f32).round() as usize;
            LEVELS[index]
        })
        .collect()
}
