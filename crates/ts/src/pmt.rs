use bytes::{Buf, Bytes};

use crate::crc32::mpeg2_crc32;
use crate::{Result, TsError};

/// Elementary stream type, as carried in a PMT stream record.
///
/// Only the subset relevant to audio/video PID selection is named; anything
/// else round-trips through `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Mpeg1Audio,
    Mpeg2Audio,
    H264,
    Aac,
    Ac3,
    Other(u8),
}

impl StreamType {
    pub fn is_video(self) -> bool {
        matches!(self, StreamType::H264)
    }

    pub fn is_audio(self) -> bool {
        matches!(
            self,
            StreamType::Mpeg1Audio | StreamType::Mpeg2Audio | StreamType::Aac | StreamType::Ac3
        )
    }
}

impl From<u8> for StreamType {
    fn from(value: u8) -> Self {
        match value {
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x0F => StreamType::Aac,
            0x1B => StreamType::H264,
            0x81 => StreamType::Ac3,
            other => StreamType::Other(other),
        }
    }
}

impl From<StreamType> for u8 {
    fn from(value: StreamType) -> Self {
        match value {
            StreamType::Mpeg1Audio => 0x03,
            StreamType::Mpeg2Audio => 0x04,
            StreamType::Aac => 0x0F,
            StreamType::H264 => 0x1B,
            StreamType::Ac3 => 0x81,
            StreamType::Other(v) => v,
        }
    }
}

/// A single elementary stream entry in a Program Map Table.
#[derive(Debug, Clone)]
pub struct PmtStream {
    pub stream_type: StreamType,
    pub elementary_pid: u16,
}

/// Owned Program Map Table.
#[derive(Debug, Clone)]
pub struct Pmt {
    pub table_id: u8,
    pub program_number: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub pcr_pid: u16,
    pub streams: Vec<PmtStream>,
}

impl Pmt {
    /// Parse a PMT section (starting at `table_id`, not including any `pointer_field`).
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < 12 {
            return Err(TsError::InsufficientData {
                expected: 12,
                actual: data.len(),
            });
        }
        let mut reader = &data[..];
        let table_id = reader.get_u8();
        if table_id != 0x02 {
            return Err(TsError::InvalidTableId {
                expected: 0x02,
                actual: table_id,
            });
        }
        let byte1 = reader.get_u8();
        let section_syntax_indicator = (byte1 & 0x80) != 0;
        if !section_syntax_indicator {
            return Err(TsError::ParseError(
                "PMT must have section syntax indicator set".to_string(),
            ));
        }
        let section_length = ((byte1 as u16 & 0x0F) << 8) | reader.get_u8() as u16;
        if section_length < 13 {
            return Err(TsError::InvalidSectionLength(section_length));
        }
        if data.len() < (3 + section_length as usize) {
            return Err(TsError::InsufficientData {
                expected: 3 + section_length as usize,
                actual: data.len(),
            });
        }
        let program_number = reader.get_u16();
        let byte5 = reader.get_u8();
        let version_number = (byte5 >> 1) & 0x1F;
        let current_next_indicator = (byte5 & 0x01) != 0;
        let section_number = reader.get_u8();
        let last_section_number = reader.get_u8();
        let pcr_pid_high = reader.get_u8();
        let pcr_pid_low = reader.get_u8();
        let pcr_pid = ((pcr_pid_high as u16 & 0x1F) << 8) | pcr_pid_low as u16;

        let prog_info_len_high = reader.get_u8();
        let prog_info_len_low = reader.get_u8();
        let program_info_length =
            (((prog_info_len_high as u16) & 0x0F) << 8) | prog_info_len_low as u16;
        let program_info_length = program_info_length as usize;

        if (section_length as usize) < 9 + program_info_length + 4 {
            return Err(TsError::InvalidSectionLength(section_length));
        }

        let streams_offset = 12 + program_info_length;
        let streams_end = 3 + section_length as usize - 4; // exclude trailing CRC32

        let mut streams = Vec::new();
        let mut stream_bytes = &data[streams_offset..streams_end];
        while stream_bytes.remaining() >= 5 {
            let stream_type = StreamType::from(stream_bytes.get_u8());
            let elementary_pid =
                ((stream_bytes.get_u8() as u16 & 0x1F) << 8) | stream_bytes.get_u8() as u16;
            let es_info_length = (((stream_bytes.get_u8() as u16) & 0x0F) << 8)
                | stream_bytes.get_u8() as u16;
            let es_info_length = es_info_length as usize;
            if stream_bytes.remaining() < es_info_length {
                return Err(TsError::InsufficientData {
                    expected: es_info_length,
                    actual: stream_bytes.remaining(),
                });
            }
            stream_bytes.advance(es_info_length);
            streams.push(PmtStream {
                stream_type,
                elementary_pid,
            });
        }

        Ok(Pmt {
            table_id,
            program_number,
            version_number,
            current_next_indicator,
            section_number,
            last_section_number,
            pcr_pid,
            streams,
        })
    }

    /// Parse a PMT section, validating the trailing MPEG-2 CRC32 first.
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

    /// First elementary stream whose `stream_type` is recognized video (H.264).
    pub fn video_pid(&self) -> Option<u16> {
        self.streams
            .iter()
            .find(|s| s.stream_type.is_video())
            .map(|s| s.elementary_pid)
    }

    /// First elementary stream whose `stream_type` is a recognized audio codec.
    pub fn audio_pid(&self) -> Option<u16> {
        self.streams
            .iter()
            .find(|s| s.stream_type.is_audio())
            .map(|s| s.elementary_pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pmt_section() -> Vec<u8> {
        // table_id=2, ssi=1, section_length=18, program_number=1, pcr_pid=0x1001,
        // program_info_length=0, two streams (video 0x1B@0x1001, audio 0x0F@0x1002)
        let mut data = vec![
            0x02, 0xB0, 18, 0x00, 0x01, 0xC1, 0x00, 0x00, 0xE0 | 0x10, 0x01, 0xF0, 0x00,
        ];
        data.extend_from_slice(&[0x1B, 0xE0 | 0x10, 0x01, 0xF0, 0x00]);
        data.extend_from_slice(&[0x0F, 0xE0 | 0x10, 0x02, 0xF0, 0x00]);
        let crc = mpeg2_crc32(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data
    }

    #[test]
    fn test_parse_pmt_streams() {
        let data = sample_pmt_section();
        let pmt = Pmt::parse(Bytes::from(data)).unwrap();
        assert_eq!(pmt.program_number, 1);
        assert_eq!(pmt.pcr_pid, 0x1001);
        assert_eq!(pmt.streams.len(), 2);
        assert_eq!(pmt.video_pid(), Some(0x1001));
        assert_eq!(pmt.audio_pid(), Some(0x1002));
    }

    #[test]
    fn test_parse_with_crc_detects_corruption() {
        let mut data = sample_pmt_section();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(
            Pmt::parse_with_crc(Bytes::from(data)),
            Err(TsError::Crc32Mismatch { .. })
        ));
    }

    #[test]
    fn test_first_video_and_audio_pid_win() {
        // Two video streams; first one must win.
        let mut data = vec![
            0x02, 0xB0, 23, 0x00, 0x01, 0xC1, 0x00, 0x00, 0xE0 | 0x10, 0x01, 0xF0, 0x00,
        ];
        data.extend_from_slice(&[0x1B, 0xE0 | 0x10, 0x01, 0xF0, 0x00]);
        data.extend_from_slice(&[0x1B, 0xE0 | 0x20, 0x02, 0xF0, 0x00]);
        data.extend_from_slice(&[0x04, 0xE0 | 0x20, 0x03, 0xF0, 0x00]);
        let crc = mpeg2_crc32(&data);
        data.extend_from_slice(&crc.to_be_bytes());

        let pmt = Pmt::parse(Bytes::from(data)).unwrap();
        assert_eq!(pmt.video_pid(), Some(0x1001));
        assert_eq!(pmt.audio_pid(), Some(0x2003));
    }

    #[test]
    fn test_stream_type_conversion() {
        assert!(StreamType::from(0x1B).is_video());
        assert!(StreamType::from(0x0F).is_audio());
        assert!(StreamType::from(0x81).is_audio());
        assert!(!StreamType::from(0x06).is_video());
        assert!(!StreamType::from(0x06).is_audio());
    }
}
