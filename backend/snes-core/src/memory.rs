//! Contiguous byte buffers backing ROM, work RAM and cartridge SRAM.
//!
//! Neither type wraps addresses by its size on its own; callers compute the final offset with
//! [`crate::bus::mirror`] and [`crate::bus::reduce`]. Out-of-range offsets are folded with a mask
//! when the size is a power of two and with `%` otherwise, so a stray offset can never panic.

use bincode::de::read::Reader;
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::enc::write::Writer;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use std::iter;

fn fold(offset: u32, size: usize) -> usize {
    if size.is_power_of_two() { offset as usize & (size - 1) } else { offset as usize % size }
}

/// Read-only memory (cartridge ROM).
///
/// The contents are not part of save states: encoding writes only the size, and decoding
/// allocates a zero-filled buffer of that size that the caller fills in from the running
/// instance with [`ReadableMemory::take_from`].
#[derive(Debug, Clone, Default)]
pub struct ReadableMemory {
    data: Box<[u8]>,
}

impl ReadableMemory {
    #[must_use]
    pub fn new(data: Box<[u8]>) -> Self {
        Self { data }
    }

    pub fn allocate(&mut self, size: usize, fill: u8) {
        self.data = vec![fill; size].into_boxed_slice();
    }

    #[inline]
    #[must_use]
    pub fn read(&self, offset: u32) -> u8 {
        if self.data.is_empty() {
            return 0;
        }
        self.data[fold(offset, self.data.len())]
    }

    /// Write during cartridge load or by a coprocessor with write access to its own ROM; the CPU
    /// bus never writes here.
    #[inline]
    pub fn program(&mut self, offset: u32, value: u8) {
        if self.data.is_empty() {
            return;
        }
        let len = self.data.len();
        self.data[fold(offset, len)] = value;
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn take_from(&mut self, other: &mut Self) {
        self.data = std::mem::take(&mut other.data);
    }
}

impl Encode for ReadableMemory {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        (self.data.len() as u32).encode(encoder)
    }
}

impl<Context> Decode<Context> for ReadableMemory {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let size = u32::decode(decoder)?;
        let mut memory = Self::default();
        memory.allocate(size as usize, 0);
        Ok(memory)
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for ReadableMemory {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Self::decode(decoder)
    }
}

/// Read/write memory (work RAM, cartridge SRAM).
///
/// Save states hold the size followed by the contents; decoding reallocates to the saved size
/// before reading the contents back, so a state saved with a different size restores cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritableMemory {
    data: Box<[u8]>,
}

impl WritableMemory {
    #[must_use]
    pub fn new(size: usize, fill: u8) -> Self {
        let mut memory = Self::default();
        memory.allocate(size, fill);
        memory
    }

    /// Allocate with contents from the host RNG, which is how DRAM powers on.
    #[must_use]
    pub fn random(size: usize) -> Self {
        Self { data: iter::repeat_with(rand::random).take(size).collect() }
    }

    pub fn allocate(&mut self, size: usize, fill: u8) {
        self.data = vec![fill; size].into_boxed_slice();
    }

    /// Overwrite the start of the buffer, e.g. from a save file. Extra bytes are ignored.
    pub fn load(&mut self, contents: &[u8]) {
        let len = contents.len().min(self.data.len());
        self.data[..len].copy_from_slice(&contents[..len]);
    }

    #[inline]
    #[must_use]
    pub fn read(&self, offset: u32) -> u8 {
        if self.data.is_empty() {
            return 0;
        }
        self.data[fold(offset, self.data.len())]
    }

    #[inline]
    pub fn write(&mut self, offset: u32, value: u8) {
        if self.data.is_empty() {
            return;
        }
        let len = self.data.len();
        self.data[fold(offset, len)] = value;
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Encode for WritableMemory {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        (self.data.len() as u32).encode(encoder)?;
        encoder.writer().write(&self.data)
    }
}

impl<Context> Decode<Context> for WritableMemory {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let size = u32::decode(decoder)? as usize;
        decoder.claim_bytes_read(size)?;

        let mut memory = Self::default();
        memory.allocate(size, 0);
        decoder.reader().read(&mut memory.data)?;
        Ok(memory)
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for WritableMemory {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Self::decode(decoder)
    }
}
