use usbmic::prelude::*;

use clap::{Parser, Subcommand};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

const POLLER_STREAM: u64 = 0;
const TRANSMITTER_STREAM: u64 = 1;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Display more information on the console. Can be used multiple times.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Milliseconds to wait between attempts to reach the device
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 100)]
    retry_interval: u64,

    /// Attempts per device call before giving up
    #[arg(long, value_name = "COUNT", default_value_t = retry::MAXIMUM_RETRIES)]
    retry_attempts: u32,

    /// Seed for the retry backoff, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the attached device's firmware and configuration once
    Info {},

    /// Print the attached device's ID
    Id {},

    /// Keep showing the device's configuration (default action)
    Monitor {},

    /// Write a new configuration, timed so the device clock lands on the second
    Configure(ConfigureArgs),
}

#[derive(clap::Args, Debug)]
struct ConfigureArgs {
    /// Sample rate in Hz (8000, 16000, 32000, 48000, 96000, 192000, 250000 or 384000)
    #[arg(long, value_name = "HZ")]
    sample_rate: u32,

    /// Gain level, 0 (low) to 4 (high)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    gain: u8,

    /// Keep frequencies below this cut-off
    #[arg(long, value_name = "HZ", conflicts_with_all = ["high_pass", "band_pass"])]
    low_pass: Option<u32>,

    /// Keep frequencies above this cut-off
    #[arg(long, value_name = "HZ", conflicts_with = "band_pass")]
    high_pass: Option<u32>,

    /// Keep frequencies between the two cut-offs
    #[arg(long, num_args = 2, value_names = ["LOWER_HZ", "HIGHER_HZ"])]
    band_pass: Option<Vec<u32>>,

    /// Keep the LED off while recording
    #[arg(long)]
    disable_led: bool,

    /// Enable energy saver mode
    #[arg(long)]
    energy_saver: bool,

    /// Disable the 48Hz DC blocking filter
    #[arg(long)]
    disable_48hz_dc_filter: bool,

    /// Enable the low gain range
    #[arg(long)]
    low_gain_range: bool,
}

impl ConfigureArgs {
    fn settings(&self) -> Result<Settings, Error> {
        let sample_rate = SampleRate::from_hz(self.sample_rate).ok_or_else(|| {
            Error::InvalidSettings(format!("unsupported sample rate {}", self.sample_rate))
        })?;
        let gain = Gain::from_level(self.gain)
            .ok_or_else(|| Error::InvalidSettings(format!("unsupported gain {}", self.gain)))?;
        let to_unit = |hz: u32| Filter::frequency_from_hz(sample_rate, hz);

        let filter = match (&self.low_pass, &self.high_pass, &self.band_pass) {
            (Some(hz), _, _) => Filter::LowPass(to_unit(*hz)),
            (_, Some(hz), _) => Filter::HighPass(to_unit(*hz)),
            (_, _, Some(bounds)) => match bounds.as_slice() {
                [a, b] => Filter::band_pass(to_unit(*a), to_unit(*b)),
                _ => {
                    return Err(Error::InvalidSettings(
                        "band-pass needs two frequencies".to_string(),
                    ))
                }
            },
            _ => Filter::None,
        };

        let settings = Settings {
            sample_rate,
            gain,
            filter,
            led_enabled: !self.disable_led,
            energy_saver: self.energy_saver,
            disable_48hz_dc_filter: self.disable_48hz_dc_filter,
            low_gain_range: self.low_gain_range,
        };
        settings.validate()?;
        Ok(settings)
    }
}

async fn configure(conf: App, args: &ConfigureArgs) -> Result<(), Box<dyn StdError>> {
    let settings = args.settings()?;
    let device = Arc::new(HidDevice::new()?);
    let session = SessionHandle::new();
    let (tx, rx) = event::channel();
    let printer = tokio::spawn(console::print_events(rx));

    let mut poller = PollingLoop::new(
        Arc::clone(&device),
        session.clone(),
        conf.retry(POLLER_STREAM),
        tx.clone(),
    );
    let mut transmitter = Transmitter::new(device, session, conf.retry(TRANSMITTER_STREAM), tx);

    let result = match poller.poll_once().await {
        Ok(_) => transmitter.configure(&settings).await,
        Err(err) => Err(err),
    };

    // Close the channel so the printer drains and stops.
    drop(poller);
    drop(transmitter);
    printer.await?;
    Ok(result?)
}

async fn info(conf: App) -> Result<(), Box<dyn StdError>> {
    let device = Arc::new(HidDevice::new()?);
    let (tx, rx) = event::channel();
    let printer = tokio::spawn(console::print_events(rx));

    let mut poller = PollingLoop::new(
        device,
        SessionHandle::new(),
        conf.retry(POLLER_STREAM),
        tx,
    );
    let result = poller.poll_once().await;

    drop(poller);
    printer.await?;
    result?;
    Ok(())
}

async fn print_id(conf: App) -> Result<(), Box<dyn StdError>> {
    let device = HidDevice::new()?;
    let id = conf.retry(POLLER_STREAM).call("read id", || device.read_id()).await?;
    println!("{id}");
    Ok(())
}

async fn monitor(conf: App) -> Result<(), Box<dyn StdError>> {
    let device = Arc::new(HidDevice::new()?);
    let (tx, rx) = event::channel();
    tokio::spawn(console::print_events(rx));

    PollingLoop::new(device, SessionHandle::new(), conf.retry(POLLER_STREAM), tx)
        .run()
        .await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError>> {
    let cli = Cli::parse();

    let conf = App {
        verbose: cli.verbose,
        retry_interval: Duration::from_millis(cli.retry_interval),
        retry_attempts: cli.retry_attempts,
        seed: cli.seed,
    };

    env_logger::Builder::new()
        .filter_level(conf.log_level())
        .parse_default_env()
        .init();
    log::debug!("{cli:?}");

    match &cli.command {
        Some(Commands::Info {}) => info(conf).await?,
        Some(Commands::Id {}) => print_id(conf).await?,
        Some(Commands::Configure(args)) => configure(conf, args).await?,
        Some(Commands::Monitor {}) | None => monitor(conf).await?,
    }

    Ok(())
}
