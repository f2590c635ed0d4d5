//! Ingests an MPEG-TS stream from UDP, resolves PAT/PMT for one configured
//! program, and segments its elementary streams into key-frame-aligned
//! files.

pub mod config;
pub mod error;
pub mod lookup;
pub mod nal;
pub mod psi;
pub mod receiver;
pub mod segment;
pub mod writer;

pub use config::Config;
pub use error::CaptureError;
pub use receiver::Receiver;
pub use segment::{CompletedSegment, Segmenter};
pub use writer::Writer;

/// Result type used throughout the capture pipeline.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Run the ingestion loop until a fatal error occurs or `shutdown` resolves.
///
/// Binds the UDP receiver, creates the output folder, and feeds every
/// validated packet through the segmenter, handing completed segments off
/// to the writer. Non-fatal errors (a malformed PSI section, a write
/// failure for one segment) are logged and ingestion continues; fatal
/// errors (socket bind/recv failure, output folder creation failure) end
/// the loop.
pub async fn run(
    config: Config,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    tokio::fs::create_dir_all(&config.output_folder)
        .await
        .map_err(|source| CaptureError::OutputFolderCreate {
            path: config.output_folder.display().to_string(),
            source,
        })?;

    let mut receiver = Receiver::bind(config.udp_ip, config.udp_port).await?;
    let mut segmenter = Segmenter::new(config.valid_channel, config.max_buffer_size_in_bytes);
    let writer = Writer::spawn(config.clone());

    tokio::pin!(shutdown);

    loop {
        let packets = tokio::select! {
            result = receiver.recv_packets() => result?,
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, stopping ingestion loop");
                return Ok(());
            }
        };

        for packet in packets {
            match segmenter.process_packet(packet) {
                Ok(Some(segment)) => {
                    if let Err(err) = writer.submit(segment).await {
                        tracing::error!(error = %err, "failed to hand off completed segment");
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping packet after parse error");
                }
            }
        }
    }
}
