//! OBC1, an OBJ controller chip that is designed to enable updating the OAM sprite table more efficiently
//!
//! Used by 1 game, Metal Combat: Falcon's Revenge. The chip sits in front of the cartridge's
//! 8KB SRAM, which it maps at $6000-$7FFF in banks $00-$3F/$80-$BF; the registers at
//! $7FF0-$7FF7 write sprite attributes into an OAM-shaped table inside that SRAM.

use crate::common::Coprocessor;
use bincode::{Decode, Encode};
use snes_common::boxedarray::BoxedByteArray;
use snes_common::num::GetBit;
use snes_common::thread::Thread;

pub const OBC1_SRAM_LEN: usize = 8 * 1024;

const OAM_BASE_0: u16 = 0x1C00;
const OAM_BASE_1: u16 = 0x1800;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Obc1 {
    sram: BoxedByteArray<OBC1_SRAM_LEN>,
    oam_base: u16,
    oam_index: u16,
    register_7: u8,
}

impl Obc1 {
    /// Create an OBC1 over the given initial SRAM contents (e.g. from a save file).
    #[must_use]
    pub fn new(initial_sram: Option<&[u8]>) -> Self {
        let mut sram = BoxedByteArray::new();
        if let Some(initial_sram) = initial_sram {
            let len = initial_sram.len().min(OBC1_SRAM_LEN);
            sram[..len].copy_from_slice(&initial_sram[..len]);
        }

        Self { sram, oam_base: OAM_BASE_0, oam_index: 0, register_7: 0 }
    }

    fn read_port(&self, port: u16) -> u8 {
        log::trace!("OBC1 register read: {port}");

        match port {
            0..=3 => {
                // OAM lower bytes
                let sram_addr = self.oam_base + (self.oam_index << 2) + port;
                self.sram[sram_addr as usize]
            }
            4 => {
                // OAM upper bits
                let sram_addr = self.oam_base + 0x200 + (self.oam_index >> 2);
                self.sram[sram_addr as usize]
            }
            5 => {
                // OAM base in SRAM (bit 0; 0=$7C00, 1=$7800)
                u8::from(self.oam_base == OAM_BASE_1)
            }
            6 => self.oam_index as u8,
            _ => self.register_7,
        }
    }

    fn write_port(&mut self, port: u16, value: u8) {
        log::trace!("OBC1 register write: {port} {value:02X}");

        match port {
            0..=3 => {
                let sram_addr = self.oam_base + (self.oam_index << 2) + port;
                self.sram[sram_addr as usize] = value;
            }
            4 => {
                // Only set the 2 bits for the selected OAM index
                let sram_addr = (self.oam_base + 0x200 + (self.oam_index >> 2)) as usize;
                let shift = 2 * (self.oam_index & 0x03);
                self.sram[sram_addr] =
                    (self.sram[sram_addr] & !(0x03 << shift)) | ((value & 0x03) << shift);
            }
            5 => {
                self.oam_base = if value.bit(0) { OAM_BASE_1 } else { OAM_BASE_0 };
            }
            6 => {
                // OAM index (0-127)
                self.oam_index = u16::from(value & 0x7F);
            }
            _ => {
                self.register_7 = value;
            }
        }
    }
}

// Register offset within the 8KB window, if the address hits $7FF0-$7FF7
fn port(address: u32) -> Option<u16> {
    let offset = (address & 0x1FFF) as u16;
    (0x1FF0..=0x1FF7).contains(&offset).then_some(offset & 7)
}

impl Coprocessor for Obc1 {
    fn name(&self) -> &'static str {
        "OBC1"
    }

    fn thread(&self) -> Option<&Thread> {
        None
    }

    fn thread_mut(&mut self) -> Option<&mut Thread> {
        None
    }

    fn main(&mut self, _cpu_frequency: u64) {}

    fn read(&mut self, address: u32, _open_bus: u8) -> u8 {
        match port(address) {
            Some(port) => self.read_port(port),
            None => self.sram[(address & 0x1FFF) as usize],
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        match port(address) {
            Some(port) => self.write_port(port, value),
            None => self.sram[(address & 0x1FFF) as usize] = value,
        }
    }

    fn power(&mut self) {
        self.oam_base = OAM_BASE_0;
        self.oam_index = 0;
        self.register_7 = 0;
    }

    fn persistent_memory(&self) -> Option<&[u8]> {
        Some(self.sram.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn writes_sprite_attributes_into_sram() {
        let mut obc1 = Obc1::new(None);

        // Sprite 5, table at $7C00
        obc1.write(0x007FF5, 0x00);
        obc1.write(0x007FF6, 0x05);
        obc1.write(0x007FF0, 0x12);
        obc1.write(0x007FF3, 0x34);
        obc1.write(0x007FF4, 0x03);

        assert_eq!(obc1.read(0x007C14, 0), 0x12);
        assert_eq!(obc1.read(0x007C17, 0), 0x34);
        // Sprite 5 uses bits 2-3 of the high table byte for sprites 4-7
        assert_eq!(obc1.read(0x007E01, 0), 0x0C);
        assert_eq!(obc1.read(0x807FF0, 0), 0x12);
    }

    #[test]
    fn plain_sram_outside_ports() {
        let mut obc1 = Obc1::new(Some(&[0xAB]));
        assert_eq!(obc1.read(0x006000, 0), 0xAB);

        obc1.write(0x007FEF, 0x77);
        assert_eq!(obc1.persistent_memory().unwrap()[0x1FEF], 0x77);
    }
}
