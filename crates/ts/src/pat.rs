use bytes::{Buf, Bytes};

use crate::crc32::mpeg2_crc32;
use crate::{Result, TsError};

/// A single program entry in a Program Association Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Owned Program Association Table (PID 0).
#[derive(Debug, Clone)]
pub struct Pat {
    pub table_id: u8,
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub programs: Vec<PatProgram>,
}

impl Pat {
    /// Parse a PAT section (starting at `table_id`, not including any `pointer_field`).
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < 8 {
            return Err(TsError::InsufficientData {
                expected: 8,
                actual: data.len(),
            });
        }
        let mut reader = &data[..];
        let table_id = reader.get_u8();
        if table_id != 0x00 {
            return Err(TsError::InvalidTableId {
                expected: 0x00,
                actual: table_id,
            });
        }
        let byte1 = reader.get_u8();
        let section_syntax_indicator = (byte1 & 0x80) != 0;
        if !section_syntax_indicator {
            return Err(TsError::ParseError(
                "PAT must have section syntax indicator set".to_string(),
            ));
        }
        let section_length = ((byte1 as u16 & 0x0F) << 8) | reader.get_u8() as u16;
        if section_length < 9 {
            return Err(TsError::InvalidSectionLength(section_length));
        }
        if data.len() < (3 + section_length as usize) {
            return Err(TsError::InsufficientData {
                expected: 3 + section_length as usize,
                actual: data.len(),
            });
        }
        let transport_stream_id = reader.get_u16();
        let byte5 = reader.get_u8();
        let version_number = (byte5 >> 1) & 0x1F;
        let current_next_indicator = (byte5 & 0x01) != 0;
        let section_number = reader.get_u8();
        let last_section_number = reader.get_u8();

        let programs_offset = 8;
        let programs_end = 3 + section_length as usize - 4; // exclude trailing CRC32
        let mut programs = Vec::with_capacity((programs_end - programs_offset) / 4);
        let mut program_bytes = &data[programs_offset..programs_end];
        while program_bytes.remaining() >= 4 {
            let program_number = program_bytes.get_u16();
            let pmt_pid = ((program_bytes.get_u8() as u16 & 0x1F) << 8) | program_bytes.get_u8() as u16;
            programs.push(PatProgram {
                program_number,
                pmt_pid,
            });
        }

        Ok(Pat {
            table_id,
            transport_stream_id,
            version_number,
            current_next_indicator,
            section_number,
            last_section_number,
            programs,
        })
    }

    /// Parse a PAT section, validating the trailing MPEG-2 CRC32 first.
    pub fn parse_with_crc(data: Bytes) -> Result<Self> {
        if data.len() >= 7 {
            let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;
            let section_end = 3 + section_length as usize;
            if section_end <= data.len()
                && section_end >= 4
                && !crate::crc32::validate_section_crc32(&data[..section_end])
            {
                let stored = u32::from_be_bytes([
                    data[section_end - 4],
                    data[section_end - 3],
                    data[section_end - 2],
                    data[section_end - 1],
                ]);
                let calculated = mpeg2_crc32(&data[..section_end - 4]);
                return Err(TsError::Crc32Mismatch {
                    expected: stored,
                    calculated,
                });
            }
        }
        Self::parse(data)
    }

    /// Look up the PMT PID for a given program number.
    pub fn pmt_pid_for_program(&self, program_number: u16) -> Option<u16> {
        self.programs
            .iter()
            .find(|p| p.program_number == program_number)
            .map(|p| p.pmt_pid)
    }

    /// Build a minimized single-program PAT section (`table_id` through the
    /// trailing CRC32, inclusive), suitable for embedding directly after a
    /// `pointer_field` in a rewritten PAT TS packet.
    ///
    /// `section_length` is fixed at 13 (5 header bytes + one 4-byte program
    /// record + 4-byte CRC), so the returned section is always 16 bytes.
    pub fn build_single_program_section(
        transport_stream_id: u16,
        version_number: u8,
        current_next_indicator: bool,
        program_number: u16,
        pmt_pid: u16,
    ) -> Vec<u8> {
        const SECTION_LENGTH: u16 = 13;

        let mut section = Vec::with_capacity(16);
        section.push(0x00); // table_id
        section.push(0x80 | ((SECTION_LENGTH >> 8) as u8 & 0x0F)); // section_syntax_indicator=1
        section.push((SECTION_LENGTH & 0xFF) as u8);
        section.push((transport_stream_id >> 8) as u8);
        section.push((transport_stream_id & 0xFF) as u8);
        section.push(
            0xC0 | ((version_number & 0x1F) << 1) | (current_next_indicator as u8),
        );
        section.push(0x00); // section_number
        section.push(0x00); // last_section_number
        section.push((program_number >> 8) as u8);
        section.push((program_number & 0xFF) as u8);
        section.push(0xE0 | ((pmt_pid >> 8) as u8 & 0x1F));
        section.push((pmt_pid & 0xFF) as u8);

        let crc = mpeg2_crc32(&section);
        section.extend_from_slice(&crc.to_be_bytes());
        section
    }
}
