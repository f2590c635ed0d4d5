//! Transport Stream (TS) parser for MPEG-2 Transport Stream data
//!
//! This crate provides functionality to parse TS packets, Program Association
//! Table (PAT) and Program Map Table (PMT) sections, PES headers, and
//! adaptation fields from MPEG-TS (Transport Stream) data.

pub mod adaptation_field;
pub mod crc32;
pub mod error;
pub mod packet;
pub mod pat;
pub mod pes;
pub mod pmt;

pub use adaptation_field::{AdaptationField, AdaptationFieldRef, Pcr};
pub use crc32::{mpeg2_crc32, validate_section_crc32};
pub use error::TsError;
pub use packet::{ContinuityMode, ContinuityStatus, PID_CAT, PID_NULL, PID_PAT, TsPacket};
pub use pat::{Pat, PatProgram};
pub use pes::{PesHeader, PesHeaderRef};
pub use pmt::{Pmt, PmtStream, StreamType};

/// Result type for TS parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
