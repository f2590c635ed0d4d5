//! H.264 key-frame detection inside a PES payload carried by a single TS packet.
//!
//! This intentionally does not reuse `ts::PesHeader::parse`: that parser
//! validates the PES start code and `stream_id`-dependent optional header
//! rules, while the scan here must replicate a narrower, specific legacy
//! behavior byte-for-byte, quirks included (see the module-level constants
//! below and the NAL type check in [`is_key_frame`]).

/// Offset of `PES_header_data_length` from the start of the PES payload.
const PES_HEADER_LENGTH_OFFSET: usize = 8;

/// H.264 NAL unit type values relevant to key-frame detection.
const NAL_TYPE_NON_IDR_SLICE: u8 = 1;
const NAL_TYPE_IDR_SLICE: u8 = 5;
const NAL_TYPE_SPS: u8 = 7;
const NAL_TYPE_PPS: u8 = 8;

/// Skip the PES header and return the elementary-stream byte range.
///
/// Reads `PES_header_data_length` at [`PES_HEADER_LENGTH_OFFSET`] and skips
/// `9 + PES_header_data_length` bytes, exactly as the byte layout in
/// `ts::pes` describes, but without validating the start code or consulting
/// the `stream_id`'s optional-header table: every video PID packet with
/// `PUSI=1` is assumed to open a PES packet with an optional header present.
fn elementary_stream_payload(data: &[u8]) -> Option<&[u8]> {
    if data.len() <= PES_HEADER_LENGTH_OFFSET {
        return None;
    }
    let pes_header_data_length = data[PES_HEADER_LENGTH_OFFSET] as usize;
    let header_end = 9 + pes_header_data_length;
    if header_end > data.len() {
        return None;
    }
    Some(&data[header_end..])
}

/// Scan a video PID packet's PES-framed payload for a key frame.
///
/// A packet is a key-frame packet iff the byte-by-byte scan of the
/// elementary stream observes all of SPS (7), PPS (8), and either IDR (5) or
/// non-IDR (1) slice NAL units. The last disjunct is a deliberately
/// preserved quirk: it causes cuts on ordinary non-random-access slices too,
/// not just true IDR access units.
pub fn is_key_frame(pusi_payload: &[u8]) -> bool {
    let Some(es) = elementary_stream_payload(pusi_payload) else {
        return false;
    };

    let mut seen_sps = false;
    let mut seen_pps = false;
    let mut seen_slice = false;

    let mut i = 0;
    while i + 4 < es.len() {
        let w = ((es[i] as u32 & 0x1F) << 24)
            | ((es[i + 1] as u32) << 16)
            | ((es[i + 2] as u32) << 8)
            | es[i + 3] as u32;
        if w == 0x1 {
            let nal_type = es[i + 4] & 0x1F;
            match nal_type {
                NAL_TYPE_SPS => seen_sps = true,
                NAL_TYPE_PPS => seen_pps = true,
                NAL_TYPE_IDR_SLICE | NAL_TYPE_NON_IDR_SLICE => seen_slice = true,
                _ => {}
            }
        }
        i += 1;
    }

    seen_sps && seen_pps && seen_slice
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal PES header (no PTS/DTS) followed by the given ES bytes.
    fn pes_packet(es: &[u8]) -> Vec<u8> {
        let mut data = vec![
            0x00, 0x00, 0x01, // start code (ignored by this scan, kept for realism)
            0xE0, // stream_id
            0x00, 0x00, // pes_packet_length
            0x80, // marker bits
            0x00, // pts_dts_flags = 0b00
            0x00, // pes_header_data_length = 0
        ];
        data.extend_from_slice(es);
        data
    }

    fn start_code_nal(nal_type: u8) -> [u8; 5] {
        [0x00, 0x00, 0x00, 0x01, nal_type]
    }

    #[test]
    fn test_key_frame_with_idr() {
        let mut es = Vec::new();
        es.extend_from_slice(&start_code_nal(NAL_TYPE_SPS));
        es.extend_from_slice(&start_code_nal(NAL_TYPE_PPS));
        es.extend_from_slice(&start_code_nal(NAL_TYPE_IDR_SLICE));
        assert!(is_key_frame(&pes_packet(&es)));
    }

    #[test]
    fn test_key_frame_quirk_non_idr_counts() {
        let mut es = Vec::new();
        es.extend_from_slice(&start_code_nal(NAL_TYPE_SPS));
        es.extend_from_slice(&start_code_nal(NAL_TYPE_PPS));
        es.extend_from_slice(&start_code_nal(NAL_TYPE_NON_IDR_SLICE));
        assert!(is_key_frame(&pes_packet(&es)));
    }

    #[test]
    fn test_sps_pps_without_slice_is_not_key_frame() {
        let mut es = Vec::new();
        es.extend_from_slice(&start_code_nal(NAL_TYPE_SPS));
        es.extend_from_slice(&start_code_nal(NAL_TYPE_PPS));
        assert!(!is_key_frame(&pes_packet(&es)));
    }

    #[test]
    fn test_missing_sps_is_not_key_frame() {
        let mut es = Vec::new();
        es.extend_from_slice(&start_code_nal(NAL_TYPE_PPS));
        es.extend_from_slice(&start_code_nal(NAL_TYPE_IDR_SLICE));
        assert!(!is_key_frame(&pes_packet(&es)));
    }

    #[test]
    fn test_short_payload_is_not_key_frame() {
        assert!(!is_key_frame(&[0x00, 0x00, 0x01, 0xE0]));
    }
}
