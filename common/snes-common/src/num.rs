use bincode::de::{BorrowDecoder, Decoder};
use bincode::error::DecodeError;
use bincode::{BorrowDecode, Decode, Encode};
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

pub trait GetBit {
    #[must_use]
    fn bit(self, i: u8) -> bool;

    #[must_use]
    fn bits(self, range: RangeInclusive<u8>) -> Self;
}

macro_rules! impl_get_bit {
    ($($t:ty),* $(,)?) => {
        $(
            impl GetBit for $t {
                #[inline]
                fn bit(self, i: u8) -> bool {
                    debug_assert!(i < (<$t>::BITS as u8));
                    self & (1 << i) != 0
                }

                #[inline]
                fn bits(self, range: RangeInclusive<u8>) -> Self {
                    let start = *range.start();
                    let end = *range.end();
                    debug_assert!(end < (<$t>::BITS as u8));

                    (self >> start) & ((1 << (end - start + 1)) - 1)
                }
            }
        )*
    };
}

impl_get_bit!(u8, u16, u32, u64, usize);

pub trait SignBit: Copy {
    fn sign_bit(self) -> bool;
}

impl SignBit for u8 {
    #[inline]
    fn sign_bit(self) -> bool {
        self.bit(7)
    }
}

impl SignBit for u16 {
    #[inline]
    fn sign_bit(self) -> bool {
        self.bit(15)
    }
}

pub trait U16Ext {
    fn lsb(self) -> u8;

    fn msb(self) -> u8;

    fn set_lsb(&mut self, value: u8);

    fn set_msb(&mut self, value: u8);
}

impl U16Ext for u16 {
    #[inline(always)]
    fn lsb(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    fn msb(self) -> u8 {
        (self >> 8) as u8
    }

    #[inline(always)]
    fn set_lsb(&mut self, value: u8) {
        *self = (*self & 0xFF00) | u16::from(value);
    }

    #[inline(always)]
    fn set_msb(&mut self, value: u8) {
        *self = (*self & 0x00FF) | (u16::from(value) << 8);
    }
}

/// Byte access for 24-bit values held in a `u32`, such as `bank:offset` bus addresses.
pub trait U24Ext {
    fn low_byte(self) -> u8;

    fn mid_byte(self) -> u8;

    fn high_byte(self) -> u8;

    fn set_low_byte(&mut self, value: u8);

    fn set_mid_byte(&mut self, value: u8);

    fn set_high_byte(&mut self, value: u8);
}

macro_rules! impl_u24_ext {
    ($($t:ty),* $(,)?) => {
        $(
            impl U24Ext for $t {
                #[inline(always)]
                fn low_byte(self) -> u8 {
                    self as u8
                }

                #[inline(always)]
                fn mid_byte(self) -> u8 {
                    (self >> 8) as u8
                }

                #[inline(always)]
                fn high_byte(self) -> u8 {
                    (self >> 16) as u8
                }

                #[inline(always)]
                fn set_low_byte(&mut self, value: u8) {
                    *self = (*self & 0xFFFF00) | <$t>::from(value);
                }

                #[inline(always)]
                fn set_mid_byte(&mut self, value: u8) {
                    *self = (*self & 0xFF00FF) | (<$t>::from(value) << 8);
                }

                #[inline(always)]
                fn set_high_byte(&mut self, value: u8) {
                    *self = (*self & 0x00FFFF) | (<$t>::from(value) << 16);
                }
            }
        )*
    };
}

// The PPU multiplier produces a signed 24-bit product
impl_u24_ext!(u32, i32);

/// Unsigned integer that is exactly `BITS` bits wide.
///
/// Every constructor and every arithmetic operation masks the result, so a `Natural<21>` wraps at
/// 2^21 exactly like the hardware counter it models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode)]
pub struct Natural<const BITS: u32>(u32);

pub type U1 = Natural<1>;
pub type U2 = Natural<2>;
pub type U3 = Natural<3>;
pub type U7 = Natural<7>;
pub type U9 = Natural<9>;
pub type U21 = Natural<21>;
pub type U24 = Natural<24>;

impl<const BITS: u32> Natural<BITS> {
    pub const MASK: u32 = u32::MAX >> (32 - BITS);
    pub const MAX: Self = Self(Self::MASK);
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value & Self::MASK)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn set(&mut self, value: u32) {
        self.0 = value & Self::MASK;
    }

    #[inline]
    #[must_use]
    pub const fn wrapping_add(self, rhs: u32) -> Self {
        Self::new(self.0.wrapping_add(rhs))
    }

    #[inline]
    #[must_use]
    pub const fn wrapping_sub(self, rhs: u32) -> Self {
        Self::new(self.0.wrapping_sub(rhs))
    }

    #[inline]
    pub fn increment(&mut self) {
        *self = self.wrapping_add(1);
    }

    #[inline]
    #[must_use]
    pub const fn bit(self, i: u32) -> bool {
        self.0 & (1 << i) != 0
    }

    #[inline]
    pub fn set_bit(&mut self, i: u32, value: bool) {
        self.set((self.0 & !(1 << i)) | (u32::from(value) << i));
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl<const BITS: u32> From<Natural<BITS>> for u32 {
    #[inline]
    fn from(value: Natural<BITS>) -> Self {
        value.0
    }
}

impl<const BITS: u32> Display for Natural<BITS> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<const BITS: u32, Context> Decode<Context> for Natural<BITS> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        u32::decode(decoder).map(Self::new)
    }
}

impl<'de, const BITS: u32, Context> BorrowDecode<'de, Context> for Natural<BITS> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        u32::borrow_decode(decoder).map(Self::new)
    }
}

/// A latched boolean line with edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct Signal(bool);

impl Signal {
    #[inline]
    #[must_use]
    pub const fn new(value: bool) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> bool {
        self.0
    }

    #[inline]
    pub fn set(&mut self, value: bool) {
        self.0 = value;
    }

    /// Stores `value`; returns true on a low-to-high transition.
    #[inline]
    pub fn raise(&mut self, value: bool) -> bool {
        let edge = !self.0 && value;
        self.0 = value;
        edge
    }

    /// Clears the line; returns true if it was high.
    #[inline]
    pub fn lower(&mut self) -> bool {
        let edge = self.0;
        self.0 = false;
        edge
    }

    /// Stores `value`; returns true if it differs from the previous value.
    #[inline]
    pub fn flip(&mut self, value: bool) -> bool {
        let changed = self.0 != value;
        self.0 = value;
        changed
    }
}

impl From<Signal> for bool {
    #[inline]
    fn from(value: Signal) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn natural_masks_on_every_operation() {
        let counter = U21::new(0x1F_FFFF);
        assert_eq!(counter.wrapping_add(1), U21::ZERO);
        assert_eq!(U21::ZERO.wrapping_sub(1).get(), 0x1F_FFFF);
        assert_eq!(U24::new(0x12_345678).get(), 0x345678);

        let mut line = U7::new(0x7F);
        line.increment();
        assert!(line.is_zero());

        let mut mode = U3::new(5);
        mode.set_bit(2, false);
        assert_eq!(mode.get(), 1);
        mode.set(0xFF);
        assert_eq!(mode, U3::MAX);
    }

    #[test]
    fn signal_edges() {
        let mut signal = Signal::default();
        assert!(signal.raise(true));
        assert!(!signal.raise(true));
        assert!(!signal.raise(false));
        assert!(!signal.get());

        signal.set(true);
        assert!(signal.lower());
        assert!(!signal.lower());

        assert!(signal.flip(true));
        assert!(!signal.flip(true));
        assert!(signal.flip(false));
    }

    #[test]
    fn bit_helpers() {
        assert!(0x80_u8.bit(7));
        assert_eq!(0xABCD_u16.bits(4..=11), 0xBC);

        let mut word = 0x1234_u16;
        word.set_msb(0xAB);
        assert_eq!(word, 0xAB34);

        let mut address = 0x7E_0000_u32;
        address.set_mid_byte(0x21);
        address.set_low_byte(0x80);
        assert_eq!(address, 0x7E2180);
        assert_eq!(address.high_byte(), 0x7E);

        address.set_high_byte(0x00);
        assert_eq!(address, 0x002180);

        let product = -258_i32;
        assert_eq!([product.low_byte(), product.mid_byte(), product.high_byte()], [0xFE, 0xFE, 0xFF]);
    }
}
