//! SNES public interface and host loop

#[cfg(test)]
mod tests;

use crate::board::Board;
use crate::bus::BusError;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::input::SnesJoypadState;
use crate::scheduler::{SchedulerEvent, SchedulerMode, ThreadId};
use bincode::config::{Fixint, LittleEndian};
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use snes_common::frontend::TimingMode;
use snes_config::SnesConfig;
use snes_coprocessors::Coprocessor;
use thiserror::Error;
use wdc65816_emu::{Registers, Wdc65816};

const STATE_PREFIX: &[u8] = b"SNESSTATE";
const STATE_VERSION: u16 = 2;

const BINCODE_CONFIG: bincode::config::Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_little_endian().with_fixed_int_encoding();

#[derive(Debug, Error)]
pub enum SnesLoadError {
    #[error("ROM is too small to contain a cartridge header ({len} bytes)")]
    RomTooSmall { len: usize },
    #[error("Error mapping cartridge onto the CPU bus: {0}")]
    BusMap(#[from] BusError),
}

pub type SnesLoadResult<T> = Result<T, SnesLoadError>;

#[derive(Debug, Error)]
pub enum SnesError {
    #[error("Error encoding save state: {0}")]
    StateEncode(#[from] EncodeError),
    #[error("Error decoding save state: {0}")]
    StateDecode(#[from] DecodeError),
    #[error("Save state does not start with the SNESSTATE prefix")]
    StatePrefix,
    #[error("Save state version {actual} is not supported (expected {expected})")]
    StateVersion { expected: u16, actual: u16 },
    #[error("Save state belongs to a different ROM (CRC32 {actual:08X}, expected {expected:08X})")]
    StateRomMismatch { expected: u32, actual: u32 },
}

pub type SnesResult<T> = Result<T, SnesError>;

/// Controller port on the front of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoypadPort {
    One,
    Two,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Snes {
    main_cpu: Wdc65816,
    cpu: Cpu,
    board: Board,
    config: SnesConfig,
}

impl Snes {
    /// Load a cartridge and power on.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM is too small to hold a header or if the cartridge mappings
    /// cannot be registered with the bus.
    pub fn create(
        rom: Vec<u8>,
        initial_sram: Option<Vec<u8>>,
        config: SnesConfig,
    ) -> SnesLoadResult<Self> {
        let cartridge = Cartridge::create(rom, initial_sram, &config)?;
        let timing_mode = cartridge.timing_mode();
        let board = Board::new(cartridge, &config)?;

        let mut snes =
            Self { main_cpu: Wdc65816::new(), cpu: Cpu::new(timing_mode, &config), board, config };
        snes.power();

        Ok(snes)
    }

    pub fn power(&mut self) {
        log::info!("Powering on ({})", self.timing_mode());

        self.main_cpu = Wdc65816::new();
        self.board.power();
        self.cpu.power();
    }

    /// Pulse /RESET. Memory contents survive; the CPU fetches the reset vector on its next turn.
    pub fn reset(&mut self) {
        log::info!("Resetting");

        self.board.reset();
        self.cpu.reset();
    }

    /// Hand control to the scheduler until a unit leaves, and report why it left.
    ///
    /// The unit that was active when the previous run ended picks up where it stopped, so it
    /// performs one unit of work before its next loop-top check. Peripherals otherwise only run
    /// nested inside the CPU's bus accesses; a peripheral that ended the previous run keeps going
    /// until it is no longer behind, then control passes back to the CPU.
    pub fn enter(&mut self, mode: SchedulerMode, target: Option<ThreadId>) -> SchedulerEvent {
        self.board.scheduler.enter(mode, target);

        loop {
            match self.board.scheduler.current() {
                ThreadId::Cpu => self.cpu.main(&mut self.main_cpu, &mut self.board),
                thread => {
                    if self.board.caught_up(thread) {
                        self.board.scheduler.resume(ThreadId::Cpu);
                    } else {
                        self.board.run(thread);
                    }
                }
            }

            let thread = self.board.scheduler.current();
            if self.board.scheduler.synchronize(thread) {
                break;
            }
        }

        self.board.scheduler.take_event().unwrap_or(SchedulerEvent::Synchronized)
    }

    /// Run until the PPU reaches vertical blank.
    pub fn run_frame(&mut self) {
        while self.enter(SchedulerMode::Run, None) != SchedulerEvent::Frame {}
    }

    /// Run until `thread` reaches a loop top without any other unit having been resumed on the
    /// way.
    pub fn synchronize(&mut self, thread: ThreadId) {
        while self.enter(SchedulerMode::Synchronize, Some(thread)) != SchedulerEvent::Synchronized {}
    }

    /// Bring every unit to a point where its state can be serialized.
    pub fn run_to_save(&mut self) {
        let threads = self.threads();

        loop {
            let mut synchronized = true;
            for &thread in &threads {
                let event = self.enter(SchedulerMode::Synchronize, Some(thread));
                synchronized &= event == SchedulerEvent::Synchronized;
            }

            if synchronized {
                return;
            }
        }
    }

    fn threads(&self) -> Vec<ThreadId> {
        let mut threads = vec![ThreadId::Cpu, ThreadId::Smp, ThreadId::Ppu];
        if self.board.cartridge.coprocessor().and_then(Coprocessor::thread).is_some() {
            threads.push(ThreadId::Coprocessor(0));
        }
        threads
    }

    /// Serialize the machine. Synchronizes every unit first.
    ///
    /// # Errors
    ///
    /// Propagates any error from the bincode encoder.
    pub fn save_state(&mut self) -> SnesResult<Vec<u8>> {
        self.run_to_save();

        let mut bytes = STATE_PREFIX.to_vec();
        bytes.extend_from_slice(&STATE_VERSION.to_le_bytes());
        bytes.extend(bincode::encode_to_vec(&*self, BINCODE_CONFIG)?);

        log::debug!("Saved state ({} bytes)", bytes.len());

        Ok(bytes)
    }

    /// Replace the machine state with a previously saved one. The ROM and the bus map are kept
    /// from the running instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a save state of this version for this ROM, or if
    /// decoding fails.
    pub fn load_state(&mut self, bytes: &[u8]) -> SnesResult<()> {
        let Some(rest) = bytes.strip_prefix(STATE_PREFIX) else {
            return Err(SnesError::StatePrefix);
        };
        let [version_lsb, version_msb, payload @ ..] = rest else {
            return Err(SnesError::StatePrefix);
        };

        let version = u16::from_le_bytes([*version_lsb, *version_msb]);
        if version != STATE_VERSION {
            return Err(SnesError::StateVersion { expected: STATE_VERSION, actual: version });
        }

        let (mut loaded, _): (Self, usize) = bincode::decode_from_slice(payload, BINCODE_CONFIG)?;

        let expected = self.board.cartridge.crc32();
        let actual = loaded.board.cartridge.crc32();
        if expected != actual {
            return Err(SnesError::StateRomMismatch { expected, actual });
        }

        loaded.board.take_rom_and_bus_from(&mut self.board);
        *self = loaded;

        log::debug!("Loaded state ({} bytes)", bytes.len());

        Ok(())
    }

    /// Battery-backed cartridge memory, if any.
    #[must_use]
    pub fn sram(&self) -> Option<&[u8]> {
        self.board.cartridge.sram()
    }

    pub fn set_joypad(&mut self, port: JoypadPort, state: SnesJoypadState) {
        let joypad = match port {
            JoypadPort::One => &mut self.board.joypads[0],
            JoypadPort::Two => &mut self.board.joypads[1],
        };
        joypad.set_state(state);
    }

    #[must_use]
    pub fn timing_mode(&self) -> TimingMode {
        self.board.cartridge.timing_mode()
    }

    #[must_use]
    pub fn config(&self) -> &SnesConfig {
        &self.config
    }

    #[must_use]
    pub fn rom_crc32(&self) -> u32 {
        self.board.cartridge.crc32()
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.board.ppu.frame_count()
    }

    #[must_use]
    pub fn wram(&self) -> &[u8] {
        self.board.wram.data()
    }

    #[must_use]
    pub fn vram(&self) -> &[u16] {
        self.board.ppu.vram()
    }

    /// Master clocks since power-on or the last reset.
    #[must_use]
    pub fn cpu_clocks(&self) -> u64 {
        self.cpu.clocks()
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        self.main_cpu.registers()
    }
}
