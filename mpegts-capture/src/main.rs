use std::net::IpAddr;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use mpegts_segmenter::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Capture an MPEG-TS stream from UDP and segment it into key-frame-aligned
/// files.
#[derive(Parser, Debug)]
#[command(name = "mpegts-capture", version, about)]
struct Args {
    /// IP address to bind the UDP receiver socket to.
    #[arg(long, env = "MPEGTS_UDP_IP", default_value = "0.0.0.0")]
    udp_ip: IpAddr,

    /// UDP port to bind the receiver socket to.
    #[arg(long, env = "MPEGTS_UDP_PORT")]
    udp_port: u16,

    /// Program number to segment; other programs in the stream are ignored.
    #[arg(long, env = "VALID_CHANNEL")]
    valid_channel: u16,

    /// Directory new segment files are written into.
    #[arg(long, env = "OUTPUT_FOLDER")]
    output_folder: PathBuf,

    /// Segment flush threshold in bytes.
    #[arg(long, env = "SEQUENCE_LENGTH_IN_BYTES", default_value_t = 8 * 1024 * 1024)]
    sequence_length_in_bytes: usize,

    /// Directory the rewrap executable lives in.
    #[arg(long, env = "EXEC_DIR")]
    exec_dir: Option<PathBuf>,

    /// Name of the external rewrap executable to invoke on completed
    /// segments; if unset, segments are left as raw `.raw` dumps.
    #[arg(long, env = "CONVERT_RAW_TS")]
    convert_raw_ts: Option<String>,

    /// User to chown completed segment files to.
    #[arg(long, env = "OWNER_USER")]
    owner_user: Option<String>,

    /// Group to chown completed segment files to.
    #[arg(long, env = "OWNER_GROUP")]
    owner_group: Option<String>,

    /// Bounded capacity of the writer hand-off queue.
    #[arg(long, env = "WRITER_QUEUE_CAPACITY", default_value_t = Config::DEFAULT_WRITER_QUEUE_CAPACITY)]
    writer_queue_capacity: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            udp_ip: args.udp_ip,
            udp_port: args.udp_port,
            valid_channel: args.valid_channel,
            output_folder: args.output_folder,
            max_buffer_size_in_bytes: args.sequence_length_in_bytes,
            exec_dir: args.exec_dir,
            convert_raw_ts: args.convert_raw_ts,
            owner_user: args.owner_user,
            owner_group: args.owner_group,
            writer_queue_capacity: args.writer_queue_capacity,
        }
    }
}

/// Install a stdout subscriber plus a daily-rolling file appender under
/// `log_dir`. Returns the appender's guard, which must be held for the
/// lifetime of the process or buffered log lines are lost on exit.
fn init_logging(log_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily(log_dir, "mpegts-capture.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let log_dir = args
        .output_folder
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let _log_guard = init_logging(&log_dir);

    let config: Config = args.into();

    info!(
        udp_ip = %config.udp_ip,
        udp_port = config.udp_port,
        valid_channel = config.valid_channel,
        output_folder = %config.output_folder.display(),
        "starting mpegts-capture"
    );

    if let Err(err) = mpegts_segmenter::run(config, shutdown_signal()).await {
        error!(error = %err, "ingestion loop terminated with a fatal error");
        exit(1);
    }
}
