//! 24-bit bus address map.
//!
//! Mappings bind an address pattern to a handler value along with the parameters that turn a bus
//! address into an offset within the handler's memory. Lookup goes through a per-page table
//! (256 bytes per page, 65536 pages); a page entirely owned by one mapping stores that mapping's
//! slot directly, and only pages split between mappings allocate a per-byte table.

mod pattern;

use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use thiserror::Error;

pub use pattern::Pattern;

const PAGES: usize = 1 << 16;
const MAX_SLOTS: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Malformed address pattern: '{0}'")]
    Pattern(String),
    #[error("Pattern '{pattern}' overlaps an existing mapping at {address:06X}")]
    Overlap { pattern: String, address: u32 },
    #[error("All {} bus mapping slots are in use", MAX_SLOTS - 1)]
    SlotsExhausted,
}

/// Fold `address` into `[0, size)` the way address lines mirror non-power-of-two memories: the
/// largest power of two contained in the address is subtracted, and when the remaining size is
/// larger than that power, the subtracted part becomes a base the result is offset from.
#[must_use]
pub fn mirror(address: u32, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }

    let mut address = address;
    let mut size = size;
    let mut base = 0;
    let mut mask = 1 << (31 - address.leading_zeros().min(31));
    while address >= size {
        while address & mask == 0 {
            mask >>= 1;
        }
        address -= mask;
        if size > mask {
            size -= mask;
            base += mask;
        }
        mask >>= 1;
    }
    base + address
}

/// Remove the address bits set in `mask`, shifting higher bits down to close each hole.
#[must_use]
pub fn reduce(address: u32, mask: u32) -> u32 {
    let mut address = address;
    let mut mask = mask;
    while mask != 0 {
        let bits = (mask & mask.wrapping_neg()) - 1;
        address = ((address >> 1) & !bits) | (address & bits);
        mask = (mask & (mask - 1)) >> 1;
    }
    address
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mapping<H> {
    handler: H,
    base: u32,
    size: u32,
    mask: u32,
    bytes: u32,
}

impl<H> Mapping<H> {
    fn target(&self, address: u32) -> u32 {
        let target = reduce(address, self.mask);
        if self.size != 0 { self.base + mirror(target, self.size - self.base) } else { target }
    }
}

#[derive(Debug, Clone)]
enum Page {
    Uniform(u8),
    Split(Box<[u8; 256]>),
}

impl Page {
    fn slot(&self, offset: u8) -> u8 {
        match self {
            Self::Uniform(slot) => *slot,
            Self::Split(slots) => slots[offset as usize],
        }
    }
}

/// The address map. `H` is the handler a mapping dispatches to, typically a small `Copy` enum.
///
/// The map is configuration derived from the cartridge, not machine state, so it encodes to
/// nothing and decodes empty; a loaded state takes the map from the running instance.
#[derive(Debug, Clone)]
pub struct Bus<H> {
    pages: Box<[Page]>,
    slots: Vec<Option<Mapping<H>>>,
}

impl<H: Copy> Bus<H> {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_SLOTS);
        slots.resize_with(MAX_SLOTS, || None);
        Self { pages: vec![Page::Uniform(0); PAGES].into_boxed_slice(), slots }
    }

    /// Bind every address of `pattern` to `handler`. The handler is given
    /// `base + mirror(reduce(address, mask), size - base)`, or `reduce(address, mask)` when
    /// `size` is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is malformed, if any of its addresses is already mapped,
    /// or if every slot is in use. The map is unchanged on error.
    pub fn map(
        &mut self,
        handler: H,
        pattern: &str,
        base: u32,
        size: u32,
        mask: u32,
    ) -> Result<u8, BusError> {
        let parsed = Pattern::parse(pattern)?;

        if let Some(address) = parsed.spans().find_map(|span| self.first_mapped(span)) {
            return Err(BusError::Overlap { pattern: pattern.into(), address });
        }

        let slot = (1..MAX_SLOTS)
            .find(|&i| self.slots[i].is_none())
            .ok_or(BusError::SlotsExhausted)?;

        // Spans of one pattern may overlap each other; count each address once
        let mut bytes = 0;
        for (page, first, last) in parsed.spans() {
            let entry = &self.pages[page as usize];
            bytes += (first..=last).filter(|&offset| entry.slot(offset) != slot as u8).count() as u32;
            self.fill(page, first, last, slot as u8);
        }

        self.slots[slot] = Some(Mapping { handler, base, size, mask, bytes });

        log::debug!(
            "Mapped '{pattern}' to slot {slot} (base {base:06X} size {size:06X} mask {mask:06X})"
        );

        Ok(slot as u8)
    }

    /// Clear every address of `pattern`, freeing slots left with no addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is malformed.
    pub fn unmap(&mut self, pattern: &str) -> Result<(), BusError> {
        let parsed = Pattern::parse(pattern)?;

        for (page, first, last) in parsed.spans() {
            for offset in first..=last {
                let slot = self.pages[page as usize].slot(offset) as usize;
                if let Some(mapping) = &mut self.slots[slot] {
                    mapping.bytes -= 1;
                    if mapping.bytes == 0 {
                        self.slots[slot] = None;
                        log::debug!("Freed bus slot {slot}");
                    }
                }
            }
            self.fill(page, first, last, 0);
        }

        Ok(())
    }

    /// Resolve `address` to its handler and the handler-relative target offset.
    #[inline]
    #[must_use]
    pub fn lookup(&self, address: u32) -> Option<(H, u32)> {
        let address = address & 0xFFFFFF;
        let slot = self.slot(address);
        if slot == 0 {
            return None;
        }

        let mapping = self.slots[slot as usize].as_ref()?;
        Some((mapping.handler, mapping.target(address)))
    }

    /// Number of live mappings.
    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[inline]
    fn slot(&self, address: u32) -> u8 {
        self.pages[(address >> 8) as usize].slot(address as u8)
    }

    fn first_mapped(&self, (page, first, last): (u32, u8, u8)) -> Option<u32> {
        (first..=last)
            .find(|&offset| self.pages[page as usize].slot(offset) != 0)
            .map(|offset| (page << 8) | u32::from(offset))
    }

    fn fill(&mut self, page: u32, first: u8, last: u8, slot: u8) {
        let entry = &mut self.pages[page as usize];
        if first == 0x00 && last == 0xFF {
            *entry = Page::Uniform(slot);
            return;
        }

        if let Page::Uniform(current) = *entry {
            if current == slot {
                return;
            }
            *entry = Page::Split(Box::new([current; 256]));
        }

        if let Page::Split(slots) = entry {
            slots[first as usize..=last as usize].fill(slot);

            let head = slots[0];
            if slots.iter().all(|&s| s == head) {
                *entry = Page::Uniform(head);
            }
        }
    }
}

impl<H: Copy> Default for Bus<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Encode for Bus<H> {
    fn encode<E: Encoder>(&self, _encoder: &mut E) -> Result<(), EncodeError> {
        Ok(())
    }
}

impl<H: Copy, Context> Decode<Context> for Bus<H> {
    fn decode<D: Decoder<Context = Context>>(_decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self::new())
    }
}

impl<'de, H: Copy, Context> BorrowDecode<'de, Context> for Bus<H> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        _decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests;
