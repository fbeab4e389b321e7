use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use otap_core::{
    LoopbackTransport, SessionConfig, SessionState, TracingObserver, TransferMode, TransferPlan,
    TransferSession, parse_key_hex, payload_budget, protocol::DEFAULT_BLOCK_SIZE,
};
use tracing::{error, info};

/// Development key used when no transfer key is provisioned.
const DEFAULT_TRANSFER_KEY: [u8; 16] = *b"0123456789abcdef";

/// Smallest ATT MTU every link supports.
const DEFAULT_MTU: usize = 23;

#[derive(Parser, Debug)]
#[command(author, version, about = "BLE OTA firmware push tool", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    /// Write-with-response pacing
    Ack,
    /// Write-without-response plus counter-echo notifications
    Notify,
}

impl From<ModeArg> for TransferMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ack => TransferMode::Ack,
            ModeArg::Notify => TransferMode::Notify,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the transfer geometry for an image under a link MTU
    Plan {
        /// Path to the firmware image
        #[arg(long)]
        image: String,

        /// Negotiated ATT MTU
        #[arg(long, default_value_t = DEFAULT_MTU)]
        mtu: usize,

        /// Requested block size in bytes
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,

        /// Flow-control discipline
        #[arg(long, value_enum, default_value_t = ModeArg::Ack)]
        mode: ModeArg,
    },
    /// Push an image through the in-process loopback peripheral
    Push {
        /// Path to the firmware image
        #[arg(long)]
        image: Option<String>,

        /// Negotiated ATT MTU
        #[arg(long)]
        mtu: Option<usize>,

        /// Requested block size in bytes
        #[arg(long)]
        block_size: Option<usize>,

        /// Flow-control discipline
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Transfer key as 32 hex characters
        #[arg(long)]
        key: Option<String>,

        /// TOML config file; flags override its values
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match args.command {
        Command::Plan {
            image,
            mtu,
            block_size,
            mode,
        } => run_plan(&image, mtu, block_size, mode.into()),
        Command::Push {
            image,
            mtu,
            block_size,
            mode,
            key,
            config,
        } => run_push(image, mtu, block_size, mode.map(Into::into), key, config),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_plan(image: &str, mtu: usize, block_size: usize, mode: TransferMode) -> Result<()> {
    let image_len = std::fs::metadata(image)
        .with_context(|| format!("cannot read {image}"))?
        .len() as usize;
    let budget = payload_budget(mtu, mode);
    let plan = TransferPlan::compute(image_len, block_size, budget)?;

    println!("image             {image}");
    println!("image length      {image_len} bytes");
    println!("mtu               {mtu} (byte budget {budget})");
    println!("mode              {mode:?}");
    println!("chunk size        {} bytes", plan.chunk_size());
    println!("block size        {} bytes", plan.block_size());
    println!("chunks per block  {}", plan.chunks_per_block());
    println!("blocks            {}", plan.number_of_blocks());
    Ok(())
}

fn run_push(
    image: Option<String>,
    mtu: Option<usize>,
    block_size: Option<usize>,
    mode: Option<TransferMode>,
    key: Option<String>,
    config_path: Option<String>,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => {
            SessionConfig::load_from_file(path).with_context(|| format!("loading config {path}"))?
        }
        None => SessionConfig::default(),
    };
    if image.is_some() {
        config.firmware_path = image;
    }
    if mtu.is_some() {
        config.mtu = mtu;
    }
    if let Some(block_size) = block_size {
        config.requested_block_size = block_size;
    }
    if let Some(mode) = mode {
        config.mode = mode;
    }
    if key.is_some() {
        config.key_hex = key;
    }

    let path = config
        .firmware_path
        .clone()
        .context("no firmware image given (use --image or a config file)")?;
    let image = std::fs::read(&path).with_context(|| format!("cannot read {path}"))?;

    let key = match &config.key_hex {
        Some(hex) => parse_key_hex(hex)?,
        None => {
            info!("No transfer key provisioned, using the development default");
            DEFAULT_TRANSFER_KEY
        }
    };

    let mtu = config.mtu.unwrap_or(DEFAULT_MTU);
    let budget = payload_budget(mtu, config.mode);
    let plan = TransferPlan::compute(image.len(), config.requested_block_size, budget)?;

    info!(path = %path, len = image.len(), mtu, budget, "Pushing image to loopback peripheral");

    let transport = Arc::new(LoopbackTransport::new(budget, config.mode, &key));
    let mut session = TransferSession::new(
        image.clone(),
        &key,
        plan.clone(),
        config.mode,
        Arc::clone(&transport),
        Arc::new(TracingObserver),
    );

    session.start()?;
    while session.state() == SessionState::AwaitingAck {
        let Some(event) = transport.pop_event() else {
            bail!("peripheral produced no event; transfer stalled");
        };
        session.handle_event(event)?;
    }

    if session.state() != SessionState::Completed {
        bail!("transfer ended in state {}", session.state());
    }

    let recovered = transport.recovered();
    if recovered != coverable_bytes(&plan, &image) {
        bail!("peripheral recovered different bytes than the host sent");
    }

    info!(
        transferred = recovered.len(),
        dropped = transport.dropped_bytes(),
        "Peripheral recovered the image"
    );
    Ok(())
}

/// Plaintext the wire can carry: each chunk truncated to whole cipher
/// groups, matching what the peripheral recovers.
fn coverable_bytes(plan: &TransferPlan, image: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in 0..plan.number_of_blocks() {
        for chunk in 0..plan.chunks_in_block(block) {
            let range = plan.chunk_range(block, chunk);
            let keep = range.len() / 4 * 4;
            out.extend_from_slice(&image[range.start..range.start + keep]);
        }
    }
    out
}
