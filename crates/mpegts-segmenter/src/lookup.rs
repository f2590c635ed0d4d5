use std::collections::HashMap;

use bytes::Bytes;

/// Everything the [`crate::psi::PsiResolver`] has learned about one program, once resolved.
#[derive(Debug, Clone, Default)]
struct ProgramEntry {
    pmt_pid: Option<u16>,
    video_pid: Option<u16>,
    audio_pid: Option<u16>,
    pat_packet: Option<Bytes>,
    pmt_packet: Option<Bytes>,
}

/// Bidirectional program/PID registry seeded with the single configured program.
///
/// Written only by the PSI resolver during the first PAT/PMT cycle; read by the
/// segmenter afterward. See the single-writer-then-single-reader note in the
/// concurrency model this type backs.
#[derive(Debug, Default)]
pub struct LookupTable {
    programs: HashMap<u16, ProgramEntry>,
    pmt_pid_to_program: HashMap<u16, u16>,
    video_pid_to_program: HashMap<u16, u16>,
    audio_pid_to_program: HashMap<u16, u16>,
}

impl LookupTable {
    /// Seed the table with the single program this process cares about. Only
    /// seeded programs are ever admitted by `set_*`.
    pub fn seed(program: u16) -> Self {
        let mut table = LookupTable::default();
        table.programs.insert(program, ProgramEntry::default());
        table
    }

    fn is_seeded(&self, program: u16) -> bool {
        self.programs.contains_key(&program)
    }

    /// Record the PMT PID for a seeded program. No-op if the program is not
    /// seeded, or if the PMT PID for this program has already been set.
    pub fn set_pmt_pid(&mut self, program: u16, pid: u16) {
        if !self.is_seeded(program) {
            return;
        }
        let entry = self.programs.get_mut(&program).expect("seeded above");
        if entry.pmt_pid.is_some() {
            return;
        }
        entry.pmt_pid = Some(pid);
        self.pmt_pid_to_program.insert(pid, program);
    }

    /// Record the video elementary PID for a seeded program. First one wins.
    pub fn set_video_pid(&mut self, program: u16, pid: u16) {
        if !self.is_seeded(program) {
            return;
        }
        let entry = self.programs.get_mut(&program).expect("seeded above");
        if entry.video_pid.is_some() {
            return;
        }
        entry.video_pid = Some(pid);
        self.video_pid_to_program.insert(pid, program);
    }

    /// Record the audio elementary PID for a seeded program. First one wins.
    pub fn set_audio_pid(&mut self, program: u16, pid: u16) {
        if !self.is_seeded(program) {
            return;
        }
        let entry = self.programs.get_mut(&program).expect("seeded above");
        if entry.audio_pid.is_some() {
            return;
        }
        entry.audio_pid = Some(pid);
        self.audio_pid_to_program.insert(pid, program);
    }

    /// Cache the rewritten single-program PAT packet for a program.
    pub fn store_pat(&mut self, program: u16, packet: Bytes) {
        if let Some(entry) = self.programs.get_mut(&program) {
            entry.pat_packet = Some(packet);
        }
    }

    /// Cache the verbatim PMT packet for a program.
    pub fn store_pmt(&mut self, program: u16, packet: Bytes) {
        if let Some(entry) = self.programs.get_mut(&program) {
            entry.pmt_packet = Some(packet);
        }
    }

    pub fn program_of_pmt(&self, pid: u16) -> Option<u16> {
        self.pmt_pid_to_program.get(&pid).copied()
    }

    pub fn program_of_video(&self, pid: u16) -> Option<u16> {
        self.video_pid_to_program.get(&pid).copied()
    }

    pub fn program_of_audio(&self, pid: u16) -> Option<u16> {
        self.audio_pid_to_program.get(&pid).copied()
    }

    pub fn is_valid_video_pid(&self, pid: u16) -> bool {
        self.video_pid_to_program.contains_key(&pid)
    }

    pub fn is_valid_audio_pid(&self, pid: u16) -> bool {
        self.audio_pid_to_program.contains_key(&pid)
    }

    pub fn pmt_pid(&self, program: u16) -> Option<u16> {
        self.programs.get(&program).and_then(|e| e.pmt_pid)
    }

    pub fn video_pid(&self, program: u16) -> Option<u16> {
        self.programs.get(&program).and_then(|e| e.video_pid)
    }

    pub fn audio_pid(&self, program: u16) -> Option<u16> {
        self.programs.get(&program).and_then(|e| e.audio_pid)
    }

    pub fn cached_pat(&self, program: u16) -> Option<Bytes> {
        self.programs.get(&program).and_then(|e| e.pat_packet.clone())
    }

    pub fn cached_pmt(&self, program: u16) -> Option<Bytes> {
        self.programs.get(&program).and_then(|e| e.pmt_packet.clone())
    }

    /// True once PAT, PMT, video PID and audio PID are all known for `program`.
    pub fn is_resolved(&self, program: u16) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|e| e.pat_packet.is_some() && e.pmt_packet.is_some() && e.video_pid.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_admits_only_seeded_program() {
        let mut table = LookupTable::seed(1);
        table.set_pmt_pid(1, 0x1000);
        table.set_pmt_pid(2, 0x2000);
        assert_eq!(table.pmt_pid(1), Some(0x1000));
        assert_eq!(table.pmt_pid(2), None);
        assert_eq!(table.program_of_pmt(0x2000), None);
    }

    #[test]
    fn test_first_pid_wins() {
        let mut table = LookupTable::seed(1);
        table.set_video_pid(1, 0x1001);
        table.set_video_pid(1, 0x1099);
        assert_eq!(table.video_pid(1), Some(0x1001));
    }

    #[test]
    fn test_reverse_indices_consistent() {
        let mut table = LookupTable::seed(7);
        table.set_pmt_pid(7, 0x100);
        table.set_video_pid(7, 0x101);
        table.set_audio_pid(7, 0x102);
        assert_eq!(table.program_of_pmt(0x100), Some(7));
        assert_eq!(table.program_of_video(0x101), Some(7));
        assert_eq!(table.program_of_audio(0x102), Some(7));
        assert!(table.is_valid_video_pid(0x101));
        assert!(table.is_valid_audio_pid(0x102));
        assert!(!table.is_valid_video_pid(0x102));
    }

    #[test]
    fn test_is_resolved() {
        let mut table = LookupTable::seed(1);
        assert!(!table.is_resolved(1));
        table.store_pat(1, Bytes::from_static(&[0u8; 188]));
        table.store_pmt(1, Bytes::from_static(&[0u8; 188]));
        table.set_video_pid(1, 0x1001);
        assert!(table.is_resolved(1));
    }
}
