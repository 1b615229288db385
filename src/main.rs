use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scopewire::{
    protocols::SimulatedBus, InstrumentSession, InterfaceKind, ResourceManager, ScaledWaveform,
    ScopeConfig, WaveformArchive,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Records above this size are slow to plot in most viewers.
const LARGE_RECORD: usize = 1_000_000;

/// Capture a waveform from a Tektronix 5 Series oscilloscope
#[derive(Parser, Debug)]
#[command(name = "scopewire")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// VISA resource of the instrument, skips the resource scan
    #[arg(long)]
    address: Option<String>,

    /// Source to transfer
    #[arg(long, default_value = "CH1")]
    channel: String,

    /// Run a single-sequence acquisition before the transfer
    #[arg(long)]
    acquire: bool,

    /// Block until the acquisition has completed
    #[arg(long, requires = "acquire")]
    wait: bool,

    /// Write the transferred waveform to this archive
    #[arg(long)]
    save: Option<PathBuf>,

    /// Summarize an archive instead of talking to an instrument
    #[arg(long, conflicts_with_all = ["acquire", "save", "list", "simulate"])]
    load: Option<PathBuf>,

    /// Print the available sources
    #[arg(long)]
    list: bool,

    /// Use a simulated MSO54
    #[arg(long)]
    simulate: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,scopewire=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Some(path) = &args.load {
        let archive = WaveformArchive::load(path)
            .with_context(|| format!("cannot load archive '{}'", path.display()))?;
        summarize(&archive.to_waveform());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => ScopeConfig::load(path)?,
        None => ScopeConfig::default(),
    };
    if let Some(address) = &args.address {
        config.address = Some(address.clone());
    }

    if args.simulate {
        let options = config
            .session_options()?
            .with_interface(InterfaceKind::Simulated);
        run(InstrumentSession::new(SimulatedBus::demo(), options), &args)
    } else {
        run(
            InstrumentSession::new(config.bus()?, config.session_options()?),
            &args,
        )
    }
}

fn run<M: ResourceManager>(mut session: InstrumentSession<M>, args: &Args) -> Result<()> {
    session.connect().context("no instrument")?;

    if args.list {
        for channel in session.available_channels()? {
            println!("{}", channel);
        }
    }
    if args.acquire {
        session.acquire_single_sequence(args.wait)?;
    }

    let waveform = session
        .transfer_waveform(&args.channel)
        .with_context(|| format!("no data from channel {}", args.channel))?;
    if waveform.len() > LARGE_RECORD {
        warn!(points = waveform.len(), "large record");
    }
    summarize(&waveform);

    if let Some(path) = &args.save {
        WaveformArchive::from_waveform(&waveform)
            .save(path)
            .with_context(|| format!("cannot save archive '{}'", path.display()))?;
    }
    session.disconnect();
    info!("done");
    Ok(())
}

fn summarize(waveform: &ScaledWaveform) {
    println!("points:          {}", waveform.len());
    println!("sample interval: {:e} s", waveform.sample_interval());
    if let (Some(first), Some(last)) = (waveform.time().first(), waveform.time().last()) {
        println!("time span:       {:e} s .. {:e} s", first, last);
    }
    match waveform.voltage_range() {
        Some((min, max)) => println!("voltage:         {:.6} V .. {:.6} V", min, max),
        None => println!("no samples"),
    }
}
