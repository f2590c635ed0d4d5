use std::net::IpAddr;
use std::path::PathBuf;

/// Size of one MPEG transport stream packet, in bytes.
pub const TS_PACKET_SIZE: usize = 188;

/// Consecutive synced packets required to declare the receiver in sync.
pub const SYNC_PACKET_AMOUNT: usize = 5;

/// Consecutive sync failures required to drop back to sync search.
pub const UNSYNC_PACKET_AMOUNT: usize = 3;

/// Runtime configuration for one capture instance.
///
/// Field names mirror the environment variables the binary reads them from
/// (see the CLI's `Args` struct), so this struct can be constructed directly
/// from parsed arguments without a separate translation table.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address to bind the UDP receiver socket to.
    pub udp_ip: IpAddr,
    /// UDP port to bind the receiver socket to.
    pub udp_port: u16,
    /// Program number to segment; all other programs in the stream are ignored.
    pub valid_channel: u16,
    /// Directory new segment files are written into.
    pub output_folder: PathBuf,
    /// Segment flush threshold in bytes. A segment is flushed on the first
    /// key frame seen once its buffer has reached this size.
    pub max_buffer_size_in_bytes: usize,
    /// Directory the rewrap executable lives in. Joined with
    /// `convert_raw_ts` to build the command invoked on each segment; if
    /// unset the executable is looked up on `PATH`.
    pub exec_dir: Option<PathBuf>,
    /// Name of the external rewrap executable, invoked as
    /// `<exec_dir>/<convert_raw_ts> <output_folder>/<timestamp> <output_folder>`.
    /// `None` skips the rewrap step and leaves the segment as a raw `.raw`
    /// transport stream dump.
    pub convert_raw_ts: Option<String>,
    /// Optional user to `chown` completed segment files to.
    pub owner_user: Option<String>,
    /// Optional group to `chown` completed segment files to.
    pub owner_group: Option<String>,
    /// Bounded capacity of the writer hand-off channel.
    pub writer_queue_capacity: usize,
}

impl Config {
    /// Default writer queue capacity, matched against
    /// [`crate::writer::Writer`]'s bounded channel construction.
    pub const DEFAULT_WRITER_QUEUE_CAPACITY: usize = 16;
}
