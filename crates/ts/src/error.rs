use thiserror::Error;

/// Errors produced while parsing MPEG-TS packets and PSI sections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TsError {
    #[error("invalid TS packet size: expected 188 bytes, got {0}")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: expected 0x47, got {0:#04x}")]
    InvalidSyncByte(u8),

    #[error("insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("invalid PES start code prefix")]
    InvalidPesStartCode,

    #[error("invalid or reserved PTS_DTS_flags value: {0:#04b}")]
    InvalidPtsDtsFlags(u8),

    #[error("invalid table_id: expected {expected:#04x}, got {actual:#04x}")]
    InvalidTableId { expected: u8, actual: u8 },

    #[error("invalid section_length: {0}")]
    InvalidSectionLength(u16),

    #[error("MPEG-2 CRC32 mismatch: expected {expected:#010x}, calculated {calculated:#010x}")]
    Crc32Mismatch { expected: u32, calculated: u32 },

    #[error("{0}")]
    ParseError(String),
}
