use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use ts::{TsPacket, PID_PAT};

use crate::error::CaptureError;
use crate::lookup::LookupTable;
use crate::nal;
use crate::psi::PsiResolver;

/// A segment handed off to the writer: the owned byte slice and the
/// wall-clock second its buffer began filling.
#[derive(Debug)]
pub struct CompletedSegment {
    pub bytes: Bytes,
    pub timestamp: u64,
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Per-program accumulation buffer plus the PSI resolver feeding it.
///
/// Drives the pipeline described as UDP -> Receiver -> PSI Resolver ->
/// Segmenter: packets are classified by PID once PAT/PMT are resolved, and
/// video-PID packets are scanned for key frames to decide flush points.
pub struct Segmenter {
    program: u16,
    max_buffer_size: usize,
    resolver: PsiResolver,
    lookup: LookupTable,
    buffer: BytesMut,
    filling_timestamp: u64,
}

impl Segmenter {
    pub fn new(program: u16, max_buffer_size: usize) -> Self {
        Segmenter {
            program,
            max_buffer_size,
            resolver: PsiResolver::new(program),
            lookup: LookupTable::seed(program),
            buffer: BytesMut::new(),
            filling_timestamp: unix_seconds_now(),
        }
    }

    fn is_resolved(&self) -> bool {
        self.lookup.is_resolved(self.program)
    }

    fn start_new_buffer(&mut self) {
        self.buffer.clear();
        let pat = self
            .lookup
            .cached_pat(self.program)
            .expect("segmenter only runs once PSI is resolved");
        let pmt = self
            .lookup
            .cached_pmt(self.program)
            .expect("segmenter only runs once PSI is resolved");
        self.buffer.extend_from_slice(&pat);
        self.buffer.extend_from_slice(&pmt);
        self.filling_timestamp = unix_seconds_now();
    }

    /// Feed one validated, 188-byte TS packet into the pipeline.
    ///
    /// Returns a completed segment when this packet triggered a flush.
    pub fn process_packet(
        &mut self,
        raw: Bytes,
    ) -> Result<Option<CompletedSegment>, CaptureError> {
        let packet = TsPacket::parse(raw.clone())?;

        if !self.is_resolved() {
            if packet.pid == PID_PAT || self.lookup.pmt_pid(self.program) == Some(packet.pid) {
                self.resolver.process_packet(&raw, &packet, &mut self.lookup)?;
                if self.is_resolved() && self.buffer.is_empty() {
                    self.start_new_buffer();
                }
            }
            return Ok(None);
        }

        if self.buffer.is_empty() {
            self.start_new_buffer();
        }

        if self.lookup.is_valid_video_pid(packet.pid) {
            return Ok(self.process_video_packet(&packet, &raw));
        }

        if self.lookup.is_valid_audio_pid(packet.pid) {
            self.buffer.extend_from_slice(&raw);
            return Ok(None);
        }

        // Any other PID is dropped.
        Ok(None)
    }

    fn process_video_packet(&mut self, packet: &TsPacket, raw: &Bytes) -> Option<CompletedSegment> {
        let is_key_frame = packet.payload_unit_start_indicator
            && packet
                .payload
                .as_ref()
                .is_some_and(|p| nal::is_key_frame(p));

        if is_key_frame && self.buffer.len() >= self.max_buffer_size {
            let flushed = self.flush();
            self.buffer.extend_from_slice(raw);
            return Some(flushed);
        }

        self.buffer.extend_from_slice(raw);
        None
    }

    fn flush(&mut self) -> CompletedSegment {
        let timestamp = self.filling_timestamp;
        let bytes = Bytes::copy_from_slice(&self.buffer);
        self.start_new_buffer();
        CompletedSegment { bytes, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts_header(pid: u16, pusi: bool, adaptation_field_control: u8) -> [u8; 4] {
        let byte1 = (if pusi { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
        let byte2 = (pid & 0xFF) as u8;
        let byte3 = (adaptation_field_control << 4) & 0x30;
        [0x47, byte1, byte2, byte3]
    }

    fn make_pat_packet(program: u16, pmt_pid: u16) -> Bytes {
        let mut data = vec![0u8; 188];
        data[..4].copy_from_slice(&ts_header(0, true, 0x1));
        data[4] = 0x00;
        let mut section = vec![0x00, 0xB0, 13, 0x00, 0x07, 0xC1, 0x00, 0x00];
        section.push((program >> 8) as u8);
        section.push((program & 0xFF) as u8);
        section.push(0xE0 | ((pmt_pid >> 8) as u8 & 0x1F));
        section.push((pmt_pid & 0xFF) as u8);
        let crc = ts::mpeg2_crc32(&section);
        section.extend_from_slice(&crc.to_be_bytes());
        data[5..5 + section.len()].copy_from_slice(&section);
        Bytes::from(data)
    }

    fn make_pmt_packet(pmt_pid: u16, program: u16, video_pid: u16, audio_pid: u16) -> Bytes {
        let mut data = vec![0u8; 188];
        data[..4].copy_from_slice(&ts_header(pmt_pid, true, 0x1));
        data[4] = 0x00;
        let mut section = vec![
            0x02, 0xB0, 23, (program >> 8) as u8, (program & 0xFF) as u8, 0xC1, 0x00, 0x00,
            0xE0 | ((video_pid >> 8) as u8 & 0x1F), (video_pid & 0xFF) as u8, 0xF0, 0x00,
        ];
        section.extend_from_slice(&[0x1B, 0xE0 | ((video_pid >> 8) as u8 & 0x1F), (video_pid & 0xFF) as u8, 0xF0, 0x00]);
        section.extend_from_slice(&[0x0F, 0xE0 | ((audio_pid >> 8) as u8 & 0x1F), (audio_pid & 0xFF) as u8, 0xF0, 0x00]);
        let crc = ts::mpeg2_crc32(&section);
        section.extend_from_slice(&crc.to_be_bytes());
        data[5..5 + section.len()].copy_from_slice(&section);
        Bytes::from(data)
    }

    fn key_frame_video_packet(pid: u16) -> Bytes {
        let mut data = vec![0u8; 188];
        data[..4].copy_from_slice(&ts_header(pid, true, 0x1));
        // PES header starting at payload offset 4: start code + stream id + length + flags
        data[4] = 0x00;
        data[5] = 0x00;
        data[6] = 0x01;
        data[7] = 0xE0;
        data[8] = 0x00; // pes_packet_length hi
        // byte index 8 is PES_HEADER_LENGTH_OFFSET relative to payload start (index 4),
        // i.e. absolute index 12 holds pes_header_data_length.
        data[4 + 8] = 0x00; // pes_header_data_length = 0
        let es_start = 4 + 9;
        let mut es = Vec::new();
        es.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 7]); // SPS
        es.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 8]); // PPS
        es.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 5]); // IDR
        data[es_start..es_start + es.len()].copy_from_slice(&es);
        Bytes::from(data)
    }

    fn non_key_video_packet(pid: u16) -> Bytes {
        let mut data = vec![0u8; 188];
        data[..4].copy_from_slice(&ts_header(pid, false, 0x1));
        Bytes::from(data)
    }

    fn audio_packet(pid: u16) -> Bytes {
        let mut data = vec![0u8; 188];
        data[..4].copy_from_slice(&ts_header(pid, false, 0x1));
        Bytes::from(data)
    }

    #[test]
    fn test_no_segment_before_psi_resolved() {
        let mut segmenter = Segmenter::new(7, 4 * 188);
        let result = segmenter.process_packet(non_key_video_packet(0x1001)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_flushes_on_key_frame_past_threshold() {
        let mut segmenter = Segmenter::new(7, 2 * 188);
        segmenter
            .process_packet(make_pat_packet(7, 0x1000))
            .unwrap();
        segmenter
            .process_packet(make_pmt_packet(0x1000, 7, 0x1001, 0x1002))
            .unwrap();

        // Fill past threshold with non-key video + audio packets.
        segmenter.process_packet(non_key_video_packet(0x1001)).unwrap();
        segmenter.process_packet(audio_packet(0x1002)).unwrap();

        let result = segmenter
            .process_packet(key_frame_video_packet(0x1001))
            .unwrap();
        let segment = result.expect("expected a flush on key frame past threshold");

        // New segment begins PAT then PMT then the triggering IDR packet.
        assert_eq!(&segment.bytes[0..188][0], &0x47);
        assert_eq!(segment.bytes[1] & 0x1F, 0x00);
        assert_eq!(segment.bytes[189] & 0x1F, 0x10);
        assert_eq!(segment.bytes.len(), 188 * 3);
    }

    #[test]
    fn test_unrecognized_pid_dropped() {
        let mut segmenter = Segmenter::new(7, 2 * 188);
        segmenter.process_packet(make_pat_packet(7, 0x1000)).unwrap();
        segmenter
            .process_packet(make_pmt_packet(0x1000, 7, 0x1001, 0x1002))
            .unwrap();

        let before = segmenter.buffer.len();
        let mut other = vec![0u8; 188];
        other[..4].copy_from_slice(&ts_header(0x1FFF, false, 0x1));
        segmenter.process_packet(Bytes::from(other)).unwrap();
        assert_eq!(segmenter.buffer.len(), before);
    }
}
