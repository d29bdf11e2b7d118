use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pushtalk::audio::{MicSource, SampleSource};
use pushtalk::cycle::DevicePanel;
use pushtalk::upload::TlsTransport;
use pushtalk::{Config, run_cycle};

/// pushtalk - record a voice clip and send it for speech recognition
#[derive(Parser)]
#[command(name = "pushtalk", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Wait for Enter as the record trigger instead of recording immediately
    #[arg(long)]
    wait: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input with a level meter
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,pushtalk=info",
        1 => "info,pushtalk=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::TestMic { duration }) = cli.command {
        return test_mic(duration);
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let root_cert = match &config.upload.root_cert_path {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };

    let mut source = MicSource::open(config.audio.sample_rate)?;
    let transport = TlsTransport::new(root_cert.as_deref())?;
    let mut panel = TerminalPanel::new(cli.wait);

    match run_cycle(&config, &mut source, transport, &mut panel)? {
        Some(outcome) => {
            match outcome.transcript {
                Some(text) => println!("Transcript: {text}"),
                None => println!("No transcript in response:\n{}", outcome.body),
            }
            Ok(())
        }
        None => {
            println!("No recording this cycle.");
            Ok(())
        }
    }
}

/// Terminal stand-in for the device's button, LEDs, and sleep control
struct TerminalPanel {
    wait_for_enter: bool,
    triggered: bool,
}

impl TerminalPanel {
    const fn new(wait_for_enter: bool) -> Self {
        Self {
            wait_for_enter,
            triggered: false,
        }
    }
}

impl DevicePanel for TerminalPanel {
    fn record_requested(&mut self) -> bool {
        if self.triggered {
            return true;
        }
        if self.wait_for_enter {
            println!("Press Enter to record...");
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_err() {
                return false;
            }
        }
        self.triggered = true;
        true
    }

    fn set_recording(&mut self, on: bool) {
        tracing::info!(on, "recording indicator");
    }

    fn set_link(&mut self, on: bool) {
        tracing::info!(on, "link indicator");
    }

    fn enter_sleep(&mut self) {
        tracing::info!("entering low-power sleep");
    }
}

/// Read microphone blocks and print a level meter
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn test_mic(duration: u64) -> anyhow::Result<()> {
    let config = Config::load()?;
    let sample_rate = config.audio.sample_rate;

    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    let mut source = MicSource::open(sample_rate)?;

    // Quarter-second native blocks
    let block_bytes = (sample_rate as usize / 4) * 2;
    let mut block = vec![0u8; block_bytes];

    for i in 0..duration * 4 {
        source.read_block(&mut block)?;

        let rms = block_rms(&block);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (rms * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:4.1}s] RMS: {rms:.4} | [{meter}]", (i + 1) as f64 / 4.0);
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// RMS deviation of 12-bit native frames from their midpoint, in [0, 1]
fn block_rms(block: &[u8]) -> f64 {
    if block.len() < 2 {
        return 0.0;
    }

    let sum_squares: f64 = block
        .chunks_exact(2)
        .map(|frame| {
            let native = (u16::from(frame[1] & 0x0f) << 8) | u16::from(frame[0]);
            let centered = f64::from(native) - 2048.0;
            (centered / 2048.0).powi(2)
        })
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let n = (block.len() / 2) as f64;
    (sum_squares / n).sqrt()
}
