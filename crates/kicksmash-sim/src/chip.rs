//! Behavioural model of one 16-bit AMD-style NOR flash
//!
//! The model follows the command state machine closely enough for the
//! controller to be exercised end to end: unlock cycles, autoselect, word
//! program, chip and sector erase with the 50 us sector window, and status
//! polling with a toggling DQ6. Programming can only clear bits; asking for
//! a 0 -> 1 transition makes the chip report DQ5 until it is reset.

use kicksmash_core::chip::{resolve_sector_map, ChipBlockInfo};
use kicksmash_core::DEVICE_WORDS;

use crate::clock::TICKS_PER_USEC;

/// Erased word value
pub const ERASED: u16 = 0xffff;

/// Sector erase command window after the last 0x30
const SECTOR_WINDOW_USEC: u64 = 50;

const DQ3: u16 = 1 << 3;
const DQ5: u16 = 1 << 5;
const DQ6: u16 = 1 << 6;
const DQ7: u16 = 1 << 7;

/// Embedded algorithm durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChipTiming {
    /// Word program time in microseconds
    pub program_usec: u64,
    /// Time per erased sector in microseconds
    pub sector_erase_usec: u64,
    /// Whole chip erase time in microseconds
    pub chip_erase_usec: u64,
}

impl Default for ChipTiming {
    // Much shorter than silicon so erase tests finish quickly
    fn default() -> Self {
        Self {
            program_usec: 10,
            sector_erase_usec: 2_000,
            chip_erase_usec: 8_000,
        }
    }
}

/// Misbehaviour to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChipFaults {
    /// Number of upcoming programs that leave one bit unprogrammed
    pub weak_programs: u32,
    /// Next program or erase never completes (until reset)
    pub hang_next: bool,
    /// Next erase reports DQ5
    pub fail_next_erase: bool,
    /// Accept 0 -> 1 program requests silently instead of failing
    pub lenient: bool,
}

/// Operation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChipStats {
    /// Word programs started
    pub programs: u32,
    /// Sectors erased
    pub sector_erases: u32,
    /// Chip erases started
    pub chip_erases: u32,
    /// Read/reset commands seen
    pub resets: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Program { data: u16 },
    Erase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Read,
    Autoselect,
    ProgramArmed,
    EraseSetup,
    /// Sector erase accepted; more sectors may still be added
    SectorWindow { sectors: Vec<u32>, closes: u64 },
    Busy { algorithm: Algorithm, until: u64, hung: bool },
    /// Embedded algorithm gave up (DQ5) until reset
    Failed { algorithm: Algorithm },
}

/// One simulated flash chip
#[derive(Debug, Clone)]
pub struct NorChip {
    manufacturer: u16,
    device: u16,
    info: &'static ChipBlockInfo,
    memory: Vec<u16>,
    state: State,
    unlock: u8,
    toggle: bool,
    timing: ChipTiming,
    /// Faults to inject
    pub faults: ChipFaults,
    stats: ChipStats,
}

impl NorChip {
    /// Create an erased chip answering autoselect with `chip_id`
    /// (manufacturer in the upper half, device code in the lower)
    pub fn new(chip_id: u32) -> Self {
        Self::with_timing(chip_id, ChipTiming::default())
    }

    /// Create an erased chip with explicit algorithm durations
    pub fn with_timing(chip_id: u32, timing: ChipTiming) -> Self {
        Self {
            manufacturer: (chip_id >> 16) as u16,
            device: chip_id as u16,
            info: resolve_sector_map(chip_id),
            memory: vec![ERASED; DEVICE_WORDS as usize],
            state: State::Read,
            unlock: 0,
            toggle: false,
            timing,
            faults: ChipFaults::default(),
            stats: ChipStats::default(),
        }
    }

    /// Create a chip preloaded with `data` from word 0
    pub fn with_data(chip_id: u32, data: &[u16]) -> Self {
        let mut chip = Self::new(chip_id);
        let len = data.len().min(chip.memory.len());
        chip.memory[..len].copy_from_slice(&data[..len]);
        chip
    }

    /// Autoselect identity
    pub fn chip_id(&self) -> u32 {
        (u32::from(self.manufacturer) << 16) | u32::from(self.device)
    }

    /// Erase geometry
    pub fn info(&self) -> &'static ChipBlockInfo {
        self.info
    }

    /// Array contents
    pub fn data(&self) -> &[u16] {
        &self.memory
    }

    /// Mutable array contents
    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.memory
    }

    /// Operation counters
    pub fn stats(&self) -> ChipStats {
        self.stats
    }

    /// Whether an embedded algorithm is running at `now`
    pub fn is_busy(&mut self, now: u64) -> bool {
        self.settle(now);
        matches!(self.state, State::Busy { .. } | State::SectorWindow { .. })
    }

    /// Whether the chip is reporting a failure
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed { .. })
    }

    fn index(addr: u32) -> usize {
        (addr & (DEVICE_WORDS - 1)) as usize
    }

    fn ticks(usec: u64) -> u64 {
        usec * u64::from(TICKS_PER_USEC)
    }

    /// Advance time-driven state
    fn settle(&mut self, now: u64) {
        match self.state {
            State::Busy {
                until, hung: false, ..
            } if now >= until => self.state = State::Read,
            State::SectorWindow { closes, .. } if now >= closes => self.start_sector_erase(now),
            _ => {}
        }
    }

    fn start(&mut self, algorithm: Algorithm, usec: u64, now: u64) {
        let hung = core::mem::take(&mut self.faults.hang_next);
        if hung {
            log::debug!("chip {:08x}: {:?} hangs", self.chip_id(), algorithm);
        }
        self.state = State::Busy {
            algorithm,
            until: now + Self::ticks(usec),
            hung,
        };
    }

    fn start_sector_erase(&mut self, now: u64) {
        if !matches!(self.state, State::SectorWindow { .. }) {
            return;
        }
        let State::SectorWindow { sectors, .. } = core::mem::replace(&mut self.state, State::Read)
        else {
            return;
        };
        for &start in &sectors {
            let sector = self.info.sector_at(start);
            log::trace!("erase sector {:05x}+{:x}", sector.start, sector.words);
            let begin = Self::index(sector.start);
            let end = (begin + sector.words as usize).min(self.memory.len());
            self.memory[begin..end].fill(ERASED);
        }
        self.stats.sector_erases += sectors.len() as u32;
        self.finish_erase(self.timing.sector_erase_usec * sectors.len() as u64, now);
    }

    fn finish_erase(&mut self, usec: u64, now: u64) {
        if core::mem::take(&mut self.faults.fail_next_erase) {
            self.state = State::Failed {
                algorithm: Algorithm::Erase,
            };
        } else {
            self.start(Algorithm::Erase, usec, now);
        }
    }

    fn program(&mut self, addr: u32, data: u16, now: u64) {
        let index = Self::index(addr);
        let old = self.memory[index];
        let mut clear = old & !data;
        if self.faults.weak_programs > 0 && clear != 0 {
            self.faults.weak_programs -= 1;
            // Lowest bit that should have been cleared stays set
            clear &= clear - 1;
        }
        self.memory[index] = old & !clear;
        self.stats.programs += 1;

        let algorithm = Algorithm::Program { data };
        if data & !old != 0 && !self.faults.lenient {
            log::debug!(
                "chip {:08x}: cannot program {:04x} over {:04x} at {:05x}",
                self.chip_id(),
                data,
                old,
                addr
            );
            self.state = State::Failed { algorithm };
        } else {
            self.start(algorithm, self.timing.program_usec, now);
        }
    }

    /// Bus write cycle
    pub fn write(&mut self, addr: u32, data: u16, now: u64) {
        self.settle(now);
        let cmd = data & 0xff;
        let offset = addr & 0x7ff;

        match &mut self.state {
            State::Busy { hung, .. } => {
                if *hung && cmd == 0xf0 {
                    self.state = State::Read;
                    self.stats.resets += 1;
                }
                return;
            }
            State::Failed { .. } => {
                if cmd == 0xf0 {
                    self.state = State::Read;
                    self.stats.resets += 1;
                }
                return;
            }
            State::SectorWindow { sectors, closes } => {
                if cmd == 0x30 {
                    sectors.push(addr);
                    *closes = now + Self::ticks(SECTOR_WINDOW_USEC);
                }
                return;
            }
            State::ProgramArmed => {
                self.unlock = 0;
                self.program(addr, data, now);
                return;
            }
            _ => {}
        }

        if cmd == 0xf0 {
            self.state = State::Read;
            self.unlock = 0;
            self.stats.resets += 1;
            return;
        }

        match (self.unlock, offset, cmd) {
            (0, 0x555, 0xaa) => self.unlock = 1,
            (1, 0x2aa, 0x55) => self.unlock = 2,
            (2, _, _) => {
                self.unlock = 0;
                self.command(addr, offset, cmd, now);
            }
            _ => self.unlock = 0,
        }
    }

    fn command(&mut self, addr: u32, offset: u32, cmd: u16, now: u64) {
        let erase_setup = self.state == State::EraseSetup;
        match (offset, cmd) {
            (_, 0x30) if erase_setup => {
                self.state = State::SectorWindow {
                    sectors: vec![addr],
                    closes: now + Self::ticks(SECTOR_WINDOW_USEC),
                };
            }
            (0x555, 0x10) if erase_setup => {
                self.memory.fill(ERASED);
                self.stats.chip_erases += 1;
                self.finish_erase(self.timing.chip_erase_usec, now);
            }
            (0x555, 0x90) => self.state = State::Autoselect,
            (0x555, 0xa0) => self.state = State::ProgramArmed,
            (0x555, 0x80) => self.state = State::EraseSetup,
            _ => log::trace!("ignored command {:02x} at {:05x}", cmd, addr),
        }
    }

    fn status_word(&mut self, algorithm: Algorithm, failed: bool) -> u16 {
        self.toggle = !self.toggle;
        let mut status = if self.toggle { DQ6 } else { 0 };
        match algorithm {
            Algorithm::Program { data } => status |= !data & DQ7,
            Algorithm::Erase => status |= DQ3,
        }
        if failed {
            status |= DQ5;
        }
        status
    }

    /// Bus read cycle
    pub fn read(&mut self, addr: u32, now: u64) -> u16 {
        if matches!(self.state, State::SectorWindow { .. }) {
            self.start_sector_erase(now);
        }
        self.settle(now);
        match self.state {
            State::Busy { algorithm, .. } => self.status_word(algorithm, false),
            State::Failed { algorithm } => self.status_word(algorithm, true),
            State::Autoselect => match addr & 0xff {
                0 => self.manufacturer,
                1 => self.device,
                _ => 0,
            },
            _ => self.memory[Self::index(addr)],
        }
    }
}
