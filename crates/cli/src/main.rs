use clap::{Parser, Subcommand};
use busline_cli::commands::{inspect, latest, timeline, verify};

#[derive(Parser)]
#[command(name = "busline")]
#[command(about = "Busline Forensic CLI - inspect and replay the vehicle record log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show log status: size, record and device counts, torn tail.
    Inspect {
        #[arg(default_value = "locations.log")]
        log_path: String,
    },
    /// Replay the log through the kernel and print its state digest
    Verify {
        #[arg(default_value = "locations.log")]
        log_path: String,
    },
    /// List records in log order
    Timeline {
        #[arg(default_value = "locations.log")]
        log_path: String,

        /// Only this device
        #[arg(long, short)]
        device: Option<String>,

        /// Only the last N records
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// Latest position per device, optionally as of an earlier record
    Latest {
        #[arg(default_value = "locations.log")]
        log_path: String,

        /// Stop replay after this record id
        #[arg(long, short)]
        at: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { log_path } => inspect::run(&log_path),
        Commands::Verify { log_path } => verify::run(&log_path).map(|_| ()),
        Commands::Timeline {
            log_path,
            device,
            limit,
        } => timeline::run(&log_path, device.as_deref(), limit).map(|_| ()),
        Commands::Latest { log_path, at } => latest::run(&log_path, at).map(|_| ()),
    }
}
