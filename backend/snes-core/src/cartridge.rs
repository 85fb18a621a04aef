//! Cartridge header detection, ROM/SRAM storage, and the cartridge's bus mappings.

use crate::api::{SnesLoadError, SnesLoadResult};
use crate::board::Port;
use crate::bus::{Bus, BusError};
use crate::memory::{ReadableMemory, WritableMemory};
use bincode::{Decode, Encode};
use crc::Crc;
use snes_common::frontend::TimingMode;
use snes_config::SnesConfig;
use snes_coprocessors::obc1::Obc1;
use snes_coprocessors::srtc::SRtc;
use snes_coprocessors::{Coprocessor, CoprocessorChip};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

const LOROM_HEADER_ADDR: usize = 0x007FC0;
const HIROM_HEADER_ADDR: usize = 0x00FFC0;
const EXHIROM_HEADER_ADDR: usize = 0x40FFC0;

const HEADER_MAP_OFFSET: usize = 0x15;
const HEADER_CHIPSET_OFFSET: usize = 0x16;
const HEADER_SRAM_OFFSET: usize = 0x18;
const HEADER_REGION_OFFSET: usize = 0x19;

const LOROM_RESET_VECTOR: usize = 0x7FFC;
const HIROM_RESET_VECTOR: usize = 0xFFFC;

const COPIER_HEADER_LEN: usize = 0x200;
const MIN_ROM_LEN: usize = 0x8000;

const SRTC_CHIPSET: u8 = 0x55;
const OBC1_CHIPSET: u8 = 0x25;

const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum MapMode {
    LoRom,
    HiRom,
    ExHiRom,
}

impl MapMode {
    fn header_addr(self) -> usize {
        match self {
            Self::LoRom => LOROM_HEADER_ADDR,
            Self::HiRom => HIROM_HEADER_ADDR,
            Self::ExHiRom => EXHIROM_HEADER_ADDR,
        }
    }
}

impl Display for MapMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoRom => write!(f, "LoROM"),
            Self::HiRom => write!(f, "HiROM"),
            Self::ExHiRom => write!(f, "ExHiROM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CartridgeType {
    LoRom,
    HiRom,
    ExHiRom,
    Obc1,
}

impl CartridgeType {
    fn map_mode(self) -> MapMode {
        match self {
            Self::LoRom | Self::Obc1 => MapMode::LoRom,
            Self::HiRom => MapMode::HiRom,
            Self::ExHiRom => MapMode::ExHiRom,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Cartridge {
    rom: ReadableMemory,
    sram: WritableMemory,
    map_mode: MapMode,
    timing_mode: TimingMode,
    crc32: u32,
    coprocessor: Option<CoprocessorChip>,
}

impl Cartridge {
    pub fn create(
        mut rom: Vec<u8>,
        initial_sram: Option<Vec<u8>>,
        config: &SnesConfig,
    ) -> SnesLoadResult<Self> {
        // Older SNES ROM images have an extra 512-byte header; check for that and strip it off
        if rom.len() & 0x7FFF == COPIER_HEADER_LEN {
            log::info!("Stripping {COPIER_HEADER_LEN}-byte copier header");
            rom.drain(..COPIER_HEADER_LEN);
        }

        if rom.len() < MIN_ROM_LEN {
            return Err(SnesLoadError::RomTooSmall { len: rom.len() });
        }

        let crc32 = CRC.checksum(&rom);
        log::info!("ROM CRC32: {crc32:08X}");

        let cartridge_type = guess_cartridge_type(&rom).unwrap_or_else(|| {
            log::warn!("Unable to confidently determine ROM type; defaulting to LoROM");
            CartridgeType::LoRom
        });
        let map_mode = cartridge_type.map_mode();
        let header_addr = map_mode.header_addr();

        // Determine NTSC/PAL
        let region_byte = rom[header_addr + HEADER_REGION_OFFSET];
        let timing_mode =
            config.forced_timing_mode.unwrap_or_else(|| region_to_timing_mode(region_byte));

        // $FFD8 contains SRAM size as a kilobytes power of 2
        let sram_header_byte = rom[header_addr + HEADER_SRAM_OFFSET];
        let sram_len = match sram_header_byte {
            0 => 0,
            // Anything past 128KB is a corrupt header
            1..=7 => 1 << (10 + sram_header_byte),
            _ => {
                log::warn!("Invalid SRAM size byte in header: {sram_header_byte:02X}");
                0
            }
        };

        let chipset_byte = rom[header_addr + HEADER_CHIPSET_OFFSET];
        let (coprocessor, sram) = match cartridge_type {
            CartridgeType::Obc1 => {
                let obc1 = Obc1::new(initial_sram.as_deref());
                (Some(CoprocessorChip::Obc1(obc1)), WritableMemory::default())
            }
            _ => {
                let mut sram = WritableMemory::new(sram_len, 0x00);
                if let Some(initial_sram) = &initial_sram {
                    sram.load(initial_sram);
                }

                let srtc = (chipset_byte == SRTC_CHIPSET)
                    .then(|| CoprocessorChip::SRtc(SRtc::new(config.rtc_epoch)));
                (srtc, sram)
            }
        };

        log::info!(
            "Using mapper {map_mode} with SRAM size {} and timing mode {timing_mode:?}",
            sram.size()
        );
        if let Some(coprocessor) = &coprocessor {
            log::info!("Detected {} coprocessor", coprocessor.name());
        }

        Ok(Self {
            rom: ReadableMemory::new(rom.into_boxed_slice()),
            sram,
            map_mode,
            timing_mode,
            crc32,
            coprocessor,
        })
    }

    /// Register the cartridge's ROM, SRAM and coprocessor ranges with the CPU bus.
    pub fn map(&self, bus: &mut Bus<Port>) -> Result<(), BusError> {
        let rom_len = self.rom.size() as u32;
        let sram_len = self.sram.size() as u32;

        match self.map_mode {
            MapMode::LoRom => {
                bus.map(Port::Rom, "00-7d,80-ff:8000-ffff", 0, rom_len, 0x8000)?;
                if sram_len != 0 {
                    bus.map(Port::Rom, "40-6f,c0-ef:0000-7fff", 0, rom_len, 0x8000)?;
                    bus.map(Port::Sram, "70-7d,f0-ff:0000-7fff", 0, sram_len, 0x8000)?;
                } else {
                    bus.map(Port::Rom, "40-7d,c0-ff:0000-7fff", 0, rom_len, 0x8000)?;
                }
            }
            MapMode::HiRom => {
                bus.map(Port::Rom, "00-3f,80-bf:8000-ffff", 0, rom_len, 0)?;
                bus.map(Port::Rom, "40-7d,c0-ff:0000-ffff", 0, rom_len, 0)?;
                if sram_len != 0 {
                    bus.map(Port::Sram, "20-3f,a0-bf:6000-7fff", 0, sram_len, 0xE000)?;
                }
            }
            MapMode::ExHiRom => {
                // Banks $00-$7D hold the upper part of the ROM
                bus.map(Port::Rom, "00-3f:8000-ffff", 0x400000, rom_len, 0)?;
                bus.map(Port::Rom, "40-7d:0000-ffff", 0x400000, rom_len, 0)?;
                bus.map(Port::Rom, "80-bf:8000-ffff", 0, rom_len, 0xC00000)?;
                bus.map(Port::Rom, "c0-ff:0000-ffff", 0, rom_len, 0xC00000)?;
                if sram_len != 0 {
                    bus.map(Port::Sram, "80-bf:6000-7fff", 0, sram_len, 0xE000)?;
                }
            }
        }

        match &self.coprocessor {
            Some(CoprocessorChip::SRtc(_)) => {
                bus.map(Port::Coprocessor, "00-3f,80-bf:2800-2801", 0, 0, 0)?;
            }
            Some(CoprocessorChip::Obc1(_)) => {
                bus.map(Port::Coprocessor, "00-3f,80-bf:6000-7fff", 0, 0, 0)?;
            }
            None => {}
        }

        Ok(())
    }

    #[inline]
    pub fn read_rom(&self, target: u32) -> u8 {
        self.rom.read(target)
    }

    #[inline]
    pub fn read_sram(&self, target: u32) -> u8 {
        self.sram.read(target)
    }

    #[inline]
    pub fn write_sram(&mut self, target: u32, value: u8) {
        self.sram.write(target, value);
    }

    pub fn coprocessor(&self) -> Option<&CoprocessorChip> {
        self.coprocessor.as_ref()
    }

    pub fn coprocessor_mut(&mut self) -> Option<&mut CoprocessorChip> {
        self.coprocessor.as_mut()
    }

    pub fn timing_mode(&self) -> TimingMode {
        self.timing_mode
    }

    pub fn map_mode(&self) -> MapMode {
        self.map_mode
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn take_rom_from(&mut self, other: &mut Self) {
        self.rom.take_from(&mut other.rom);
    }

    /// Battery-backed memory, if the cartridge has any.
    pub fn sram(&self) -> Option<&[u8]> {
        if let Some(memory) = self.coprocessor.as_ref().and_then(Coprocessor::persistent_memory) {
            return Some(memory);
        }

        (self.sram.size() != 0).then(|| self.sram.data())
    }

    pub fn power(&mut self) {
        if let Some(coprocessor) = &mut self.coprocessor {
            coprocessor.power();
        }
    }
}

pub fn region_to_timing_mode(region_byte: u8) -> TimingMode {
    match region_byte {
        // Japan / USA / South Korea / Canada / Brazil
        0x00 | 0x01 | 0x0D | 0x0F | 0x10 => TimingMode::Ntsc,
        // various European and Asian countries (other than Japan/Korea) + Australia
        0x02..=0x0C | 0x11 => TimingMode::Pal,
        _ => {
            log::warn!(
                "Unrecognized region byte in ROM header, defaulting to NTSC: {region_byte:02X}"
            );
            TimingMode::Ntsc
        }
    }
}

fn guess_cartridge_type(rom: &[u8]) -> Option<CartridgeType> {
    if rom.len() < 0x10000 {
        // Any ROM less than 64KB must be LoROM; HiROM <64KB wouldn't have anywhere to store
        // the 65816 interrupt vectors
        return Some(CartridgeType::LoRom);
    }

    if rom.len() >= 0x410000 {
        // $25 = ExHiROM, $35 = ExHiROM + FastROM
        let exhirom_map_byte = rom[EXHIROM_HEADER_ADDR + HEADER_MAP_OFFSET];
        if exhirom_map_byte == 0x25 || exhirom_map_byte == 0x35 {
            return Some(CartridgeType::ExHiRom);
        }
    }

    let mut lorom_points = 0;
    let mut hirom_points = 0;

    let lorom_map_byte = rom[LOROM_HEADER_ADDR + HEADER_MAP_OFFSET];
    if lorom_map_byte == 0x20 || lorom_map_byte == 0x30 {
        // $20 == LoROM, $30 == LoROM + FastROM
        lorom_points += 1;
    }

    let hirom_map_byte = rom[HIROM_HEADER_ADDR + HEADER_MAP_OFFSET];
    if hirom_map_byte == 0x21 || hirom_map_byte == 0x31 {
        // $21 == HiROM, $31 == HiROM + FastROM
        hirom_points += 1;
    }

    // All LoROM vectors should be in the range $8000-$FFFF, and A15 is ignored for mapping to ROM
    let lorom_vector = u16::from_le_bytes([rom[LOROM_RESET_VECTOR], rom[LOROM_RESET_VECTOR + 1]]);
    if lorom_vector >= 0x8000 && seems_like_valid_reset_vector(rom, lorom_vector & 0x7FFF) {
        lorom_points += 1;
    }

    let hirom_vector = u16::from_le_bytes([rom[HIROM_RESET_VECTOR], rom[HIROM_RESET_VECTOR + 1]]);
    if seems_like_valid_reset_vector(rom, hirom_vector) {
        hirom_points += 1;
    }

    // OBC1 is identified by chipset $25 in the LoROM header area
    if hirom_points <= lorom_points
        && rom[LOROM_HEADER_ADDR + HEADER_CHIPSET_OFFSET] == OBC1_CHIPSET
    {
        return Some(CartridgeType::Obc1);
    }

    match lorom_points.cmp(&hirom_points) {
        Ordering::Less => Some(CartridgeType::HiRom),
        Ordering::Greater => Some(CartridgeType::LoRom),
        Ordering::Equal => None,
    }
}

const CLC_OPCODE: u8 = 0x18;
const SEI_OPCODE: u8 = 0x78;

fn seems_like_valid_reset_vector(rom: &[u8], vector: u16) -> bool {
    // Nearly all games execute either SEI or CLC as the first instruction at the RESET vector
    let vector = vector as usize;
    vector < rom.len() && (rom[vector] == CLC_OPCODE || rom[vector] == SEI_OPCODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn rom_with_header(len: usize, header_addr: usize, map_byte: u8, reset_vector: u16) -> Vec<u8> {
        let mut rom = vec![0xFF; len];
        rom[header_addr + HEADER_MAP_OFFSET] = map_byte;
        rom[header_addr + HEADER_SRAM_OFFSET] = 0x03;
        rom[header_addr + HEADER_REGION_OFFSET] = 0x01;
        rom[header_addr + 0x3C..header_addr + 0x3E].copy_from_slice(&reset_vector.to_le_bytes());

        let entry = if header_addr == LOROM_HEADER_ADDR {
            (reset_vector & 0x7FFF) as usize
        } else {
            reset_vector as usize
        };
        rom[entry] = SEI_OPCODE;
        rom
    }

    fn lookup(bus: &Bus<Port>, address: u32) -> Option<(Port, u32)> {
        bus.lookup(address)
    }

    #[test]
    fn detects_lorom() {
        let rom = rom_with_header(0x20000, LOROM_HEADER_ADDR, 0x20, 0x8000);
        let cartridge = Cartridge::create(rom, None, &SnesConfig::default()).unwrap();
        assert_eq!(cartridge.map_mode(), MapMode::LoRom);
        assert_eq!(cartridge.timing_mode(), TimingMode::Ntsc);
        assert_eq!(cartridge.sram().map(<[u8]>::len), Some(8 * 1024));

        let mut bus = Bus::new();
        cartridge.map(&mut bus).unwrap();
        assert_eq!(lookup(&bus, 0x008000), Some((Port::Rom, 0x0000)));
        assert_eq!(lookup(&bus, 0x01FFFF), Some((Port::Rom, 0xFFFF)));
        // Mirrors past the end of a 128KB ROM
        assert_eq!(lookup(&bus, 0x048000), Some((Port::Rom, 0x0000)));
        assert_eq!(lookup(&bus, 0x808000), Some((Port::Rom, 0x0000)));
        assert_eq!(lookup(&bus, 0x700000), Some((Port::Sram, 0x0000)));
        assert_eq!(lookup(&bus, 0x712345), Some((Port::Sram, 0x0345)));
        assert_eq!(lookup(&bus, 0x006000), None);
    }

    #[test]
    fn detects_hirom() {
        let rom = rom_with_header(0x40000, HIROM_HEADER_ADDR, 0x21, 0x8000);
        let cartridge = Cartridge::create(rom, None, &SnesConfig::default()).unwrap();
        assert_eq!(cartridge.map_mode(), MapMode::HiRom);

        let mut bus = Bus::new();
        cartridge.map(&mut bus).unwrap();
        assert_eq!(lookup(&bus, 0x00FFFC), Some((Port::Rom, 0xFFFC)));
        assert_eq!(lookup(&bus, 0xC12345), Some((Port::Rom, 0x12345)));
        assert_eq!(lookup(&bus, 0x206000), Some((Port::Sram, 0x0000)));
        assert_eq!(lookup(&bus, 0x216000), Some((Port::Sram, 0x0000)));
    }

    #[test]
    fn strips_copier_header_and_detects_pal() {
        let mut rom = rom_with_header(0x8000, LOROM_HEADER_ADDR, 0x20, 0x8000);
        rom[LOROM_HEADER_ADDR + HEADER_REGION_OFFSET] = 0x02;
        let mut with_header = vec![0x00; COPIER_HEADER_LEN];
        with_header.extend_from_slice(&rom);

        let cartridge = Cartridge::create(with_header, None, &SnesConfig::default()).unwrap();
        assert_eq!(cartridge.timing_mode(), TimingMode::Pal);
        assert_eq!(cartridge.crc32(), CRC.checksum(&rom));

        let config = SnesConfig { forced_timing_mode: Some(TimingMode::Ntsc), ..Default::default() };
        let cartridge = Cartridge::create(rom, None, &config).unwrap();
        assert_eq!(cartridge.timing_mode(), TimingMode::Ntsc);
    }

    #[test]
    fn rejects_tiny_rom() {
        let result = Cartridge::create(vec![0; 0x4000], None, &SnesConfig::default());
        assert!(matches!(result, Err(SnesLoadError::RomTooSmall { len: 0x4000 })));
    }

    #[test]
    fn srtc_maps_its_ports() {
        let mut rom = rom_with_header(0x40000, HIROM_HEADER_ADDR, 0x21, 0x8000);
        rom[HIROM_HEADER_ADDR + HEADER_CHIPSET_OFFSET] = SRTC_CHIPSET;
        let config = SnesConfig { rtc_epoch: Some(0), ..Default::default() };
        let cartridge = Cartridge::create(rom, None, &config).unwrap();
        assert!(matches!(cartridge.coprocessor(), Some(CoprocessorChip::SRtc(_))));

        let mut bus = Bus::new();
        cartridge.map(&mut bus).unwrap();
        assert_eq!(lookup(&bus, 0x802801), Some((Port::Coprocessor, 0x802801)));
    }

    #[test]
    fn initial_sram_is_loaded() {
        let rom = rom_with_header(0x20000, LOROM_HEADER_ADDR, 0x20, 0x8000);
        let cartridge =
            Cartridge::create(rom, Some(vec![0x12, 0x34]), &SnesConfig::default()).unwrap();
        let sram = cartridge.sram().unwrap();
        assert_eq!(&sram[..3], &[0x12, 0x34, 0x00]);
    }
}
