//! Heap-allocated fixed-size memory regions with a custom `bincode::Decode`
//! that deserializes directly into heap memory.
//!
//! The derived `Decode` for `Box<[u8; LEN]>` builds the array on the stack
//! before moving it to the heap, which overflows the stack for multi-megabyte
//! regions on some platforms.

use bincode::de::read::Reader;
use bincode::de::{BorrowDecoder, Decoder};
use bincode::error::DecodeError;
use bincode::{BorrowDecode, Decode, Encode};
use std::ops::{Deref, DerefMut};

macro_rules! boxed_array_common {
    ($name:ident, $elem:ty) => {
        #[derive(Debug, Clone, Encode)]
        pub struct $name<const LEN: usize>(Box<[$elem; LEN]>);

        impl<const LEN: usize> $name<LEN> {
            #[must_use]
            #[allow(clippy::missing_panics_doc)]
            pub fn new() -> Self {
                Self(vec![0; LEN].into_boxed_slice().try_into().unwrap())
            }
        }

        impl<const LEN: usize> Default for $name<LEN> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<const LEN: usize> Deref for $name<LEN> {
            type Target = [$elem; LEN];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<const LEN: usize> DerefMut for $name<LEN> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

boxed_array_common!(BoxedByteArray, u8);
boxed_array_common!(BoxedWordArray, u16);

impl<const LEN: usize, Context> Decode<Context> for BoxedByteArray<LEN> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut array = Self::new();
        decoder.reader().read(array.0.as_mut())?;
        Ok(array)
    }
}

impl<'de, const LEN: usize, Context> BorrowDecode<'de, Context> for BoxedByteArray<LEN> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}

impl<const LEN: usize, Context> Decode<Context> for BoxedWordArray<LEN> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut array = Self::new();
        for value in array.0.as_mut() {
            *value = u16::decode(decoder)?;
        }
        Ok(array)
    }
}

impl<'de, const LEN: usize, Context> BorrowDecode<'de, Context> for BoxedWordArray<LEN> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}
