//! Heap-allocated fixed-size arrays whose `bincode::Decode` implementation decodes directly into
//! heap memory instead of building the array on the stack first.

use bincode::de::read::Reader;
use bincode::de::{BorrowDecoder, Decoder};
use bincode::error::DecodeError;
use bincode::{BorrowDecode, Decode, Encode};
use std::ops::{Deref, DerefMut};

fn boxed_zeroed<T: Copy + Default, const LEN: usize>() -> Box<[T; LEN]> {
    let slice = vec![T::default(); LEN].into_boxed_slice();
    match slice.try_into() {
        Ok(array) => array,
        Err(_) => unreachable!("vec was allocated with exactly LEN elements"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode)]
pub struct BoxedByteArray<const LEN: usize>(Box<[u8; LEN]>);

impl<const LEN: usize> BoxedByteArray<LEN> {
    #[must_use]
    pub fn new() -> Self {
        Self(boxed_zeroed())
    }

    #[must_use]
    pub fn filled(value: u8) -> Self {
        let mut array = Self::new();
        array.fill(value);
        array
    }
}

impl<const LEN: usize> Default for BoxedByteArray<LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LEN: usize> Deref for BoxedByteArray<LEN> {
    type Target = Box<[u8; LEN]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const LEN: usize> DerefMut for BoxedByteArray<LEN> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<const LEN: usize, Context> Decode<Context> for BoxedByteArray<LEN> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut array: Box<[u8; LEN]> = boxed_zeroed();
        decoder.reader().read(array.as_mut())?;
        Ok(Self(array))
    }
}

impl<'de, const LEN: usize, Context> BorrowDecode<'de, Context> for BoxedByteArray<LEN> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        let mut array: Box<[u8; LEN]> = boxed_zeroed();
        decoder.reader().read(array.as_mut())?;
        Ok(Self(array))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode)]
pub struct BoxedWordArray<const LEN: usize>(Box<[u16; LEN]>);

impl<const LEN: usize> BoxedWordArray<LEN> {
    #[must_use]
    pub fn new() -> Self {
        Self(boxed_zeroed())
    }
}

impl<const LEN: usize> Default for BoxedWordArray<LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LEN: usize> Deref for BoxedWordArray<LEN> {
    type Target = Box<[u16; LEN]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const LEN: usize> DerefMut for BoxedWordArray<LEN> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<const LEN: usize, Context> Decode<Context> for BoxedWordArray<LEN> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut array: Box<[u16; LEN]> = boxed_zeroed();
        for value in array.iter_mut() {
            *value = u16::decode(decoder)?;
        }
        Ok(Self(array))
    }
}

impl<'de, const LEN: usize, Context> BorrowDecode<'de, Context> for BoxedWordArray<LEN> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        let mut array: Box<[u16; LEN]> = boxed_zeroed();
        for value in array.iter_mut() {
            *value = u16::borrow_decode(decoder)?;
        }
        Ok(Self(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn decodes_back_into_heap() {
        let config = bincode::config::standard().with_fixed_int_encoding();

        let mut bytes = BoxedByteArray::<4096>::filled(0x55);
        bytes[4095] = 0xAA;
        let encoded = bincode::encode_to_vec(&bytes, config).unwrap();
        let (decoded, _): (BoxedByteArray<4096>, _) =
            bincode::decode_from_slice(&encoded, config).unwrap();
        assert_eq!(decoded, bytes);

        let mut words = BoxedWordArray::<256>::new();
        words[17] = 0xBEEF;
        let encoded = bincode::encode_to_vec(&words, config).unwrap();
        let (decoded, _): (BoxedWordArray<256>, _) =
            bincode::decode_from_slice(&encoded, config).unwrap();
        assert_eq!(decoded[17], 0xBEEF);
    }
}
