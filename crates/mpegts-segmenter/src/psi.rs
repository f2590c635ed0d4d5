use bytes::Bytes;
use ts::{Pat, Pmt, StreamType, TsPacket, PID_PAT};

use crate::error::CaptureError;
use crate::lookup::LookupTable;

/// Resolves PAT and PMT for a single configured program, once, and caches the
/// packets the segmenter needs to prefix every new segment.
///
/// Follows the single-PSI-cycle design: once a program's PAT and PMT have
/// been seen, further PAT/PMT packets for it are ignored (see the "Single
/// PSI cycle" design note this resolver implements literally).
#[derive(Debug)]
pub struct PsiResolver {
    program: u16,
}

impl PsiResolver {
    pub fn new(program: u16) -> Self {
        PsiResolver { program }
    }

    /// Feed one TS packet to the resolver. Returns `Ok(())` whether or not
    /// the packet advanced resolution; parse anomalies are logged by the
    /// caller and never abort ingestion (the packet is simply not useful
    /// yet).
    pub fn process_packet(
        &self,
        raw: &Bytes,
        packet: &TsPacket,
        lookup: &mut LookupTable,
    ) -> Result<(), CaptureError> {
        if packet.pid == PID_PAT {
            if lookup.cached_pat(self.program).is_some() {
                return Ok(());
            }
            self.process_pat(raw, packet, lookup)?;
            return Ok(());
        }

        if let Some(pmt_pid) = lookup.pmt_pid(self.program)
            && packet.pid == pmt_pid
        {
            if lookup.cached_pmt(self.program).is_some() {
                return Ok(());
            }
            self.process_pmt(raw, packet, lookup)?;
        }

        Ok(())
    }

    fn process_pat(
        &self,
        raw: &Bytes,
        packet: &TsPacket,
        lookup: &mut LookupTable,
    ) -> Result<(), CaptureError> {
        let Some(section) = packet.get_psi_payload() else {
            return Ok(());
        };
        let pat = Pat::parse(section)?;
        let Some(pmt_pid) = pat.pmt_pid_for_program(self.program) else {
            tracing::debug!(program = self.program, "program not present in PAT, waiting");
            return Ok(());
        };

        lookup.set_pmt_pid(self.program, pmt_pid);

        let rewritten = build_rewritten_pat_packet(
            raw,
            packet,
            pat.transport_stream_id,
            pat.version_number,
            pat.current_next_indicator,
            self.program,
            pmt_pid,
        );
        lookup.store_pat(self.program, rewritten);
        tracing::info!(program = self.program, pmt_pid, "resolved PMT PID from PAT");
        Ok(())
    }

    fn process_pmt(
        &self,
        raw: &Bytes,
        packet: &TsPacket,
        lookup: &mut LookupTable,
    ) -> Result<(), CaptureError> {
        lookup.store_pmt(self.program, raw.clone());

        let Some(section) = packet.get_psi_payload() else {
            return Ok(());
        };
        let pmt = Pmt::parse(section)?;

        for stream in &pmt.streams {
            match stream.stream_type {
                StreamType::H264 => lookup.set_video_pid(self.program, stream.elementary_pid),
                StreamType::Mpeg1Audio | StreamType::Mpeg2Audio | StreamType::Aac | StreamType::Ac3 => {
                    lookup.set_audio_pid(self.program, stream.elementary_pid)
                }
                StreamType::Other(_) => {}
            }
        }

        tracing::info!(
            program = self.program,
            video_pid = lookup.video_pid(self.program),
            audio_pid = lookup.audio_pid(self.program),
            "resolved elementary PIDs from PMT"
        );
        Ok(())
    }
}

/// Construct a minimized single-program PAT TS packet from the original PAT
/// packet's framing (TS header plus any existing adaptation field, which is
/// preserved verbatim), left-padding the payload with `0xFF` stuffing so the
/// rewritten section lands at a deterministic offset ending exactly at the
/// packet boundary.
fn build_rewritten_pat_packet(
    original: &Bytes,
    packet: &TsPacket,
    transport_stream_id: u16,
    version_number: u8,
    current_next_indicator: bool,
    program_number: u16,
    pmt_pid: u16,
) -> Bytes {
    const TS_PACKET_SIZE: usize = 188;
    const TS_HEADER_SIZE: usize = 4;

    let payload_start = TS_HEADER_SIZE
        + packet
            .adaptation_field
            .as_ref()
            .map(|af| af.len() + 1)
            .unwrap_or(0);

    let section = Pat::build_single_program_section(
        transport_stream_id,
        version_number,
        current_next_indicator,
        program_number,
        pmt_pid,
    );

    let mut buf = vec![0u8; TS_PACKET_SIZE];
    buf[..payload_start].copy_from_slice(&original[..payload_start]);
    buf[1] |= 0x40; // force payload_unit_start_indicator

    let available_tail = TS_PACKET_SIZE - payload_start;
    let pointer_field_len = available_tail - 1 - section.len();
    buf[payload_start] = pointer_field_len as u8;
    let stuffing_start = payload_start + 1;
    for b in &mut buf[stuffing_start..stuffing_start + pointer_field_len] {
        *b = 0xFF;
    }
    let section_start = stuffing_start + pointer_field_len;
    buf[section_start..section_start + section.len()].copy_from_slice(&section);

    Bytes::from(buf)
}
