//! Characteristic payload codecs
//! Every scalar on the wire is a fixed-width little-endian integer; composite
//! fields are handled by dedicated codecs built on the helpers here.

use std::fmt::Debug;
use std::marker::PhantomData;

/// A scalar with a fixed-width little-endian wire representation.
pub trait FixedWidth: Copy + Debug + Send + Sync + 'static {
    /// Number of bytes on the wire
    const WIDTH: usize;

    /// Reads the value from exactly `WIDTH` bytes.
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;

    fn to_le_vec(self) -> Vec<u8>;
}

macro_rules! impl_fixed_width {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FixedWidth for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Option<Self> {
                    let raw: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().ok()?;
                    Some(<$ty>::from_le_bytes(raw))
                }

                fn to_le_vec(self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }
        )*
    };
}

impl_fixed_width!(u8, i8, u16, i16, u32, i32);

/// Extracts a scalar starting at `offset`, or `None` if the buffer is too short.
pub fn extract<T: FixedWidth>(bytes: &[u8], offset: usize) -> Option<T> {
    let end = offset.checked_add(T::WIDTH)?;
    T::from_le_slice(bytes.get(offset..end)?)
}

/// Encodes a scalar into its fixed-width wire form.
pub fn encode<T: FixedWidth>(value: T) -> Vec<u8> {
    value.to_le_vec()
}

/// Turns a raw characteristic payload into a typed value.
///
/// Implementations must be pure: no side effects, `None` on malformed or
/// insufficient input.
pub trait Decode: Send + Sync + 'static {
    type Value: Clone + Debug + Send + Sync + 'static;

    fn decode(&self, bytes: &[u8]) -> Option<Self::Value>;
}

/// Encoding side of a codec, required by modifiable attributes.
pub trait Encode: Decode {
    fn encode(&self, value: &Self::Value) -> Vec<u8>;
}

/// Default codec: a single fixed-width scalar read at a configurable offset.
pub struct Scalar<T> {
    offset: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Scalar<T> {
    pub const fn new() -> Self {
        Self::at_offset(0)
    }

    pub const fn at_offset(offset: usize) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Scalar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FixedWidth> Decode for Scalar<T> {
    type Value = T;

    fn decode(&self, bytes: &[u8]) -> Option<T> {
        extract(bytes, self.offset)
    }
}

impl<T: FixedWidth> Encode for Scalar<T> {
    fn encode(&self, value: &T) -> Vec<u8> {
        // Writes always start at the beginning of the characteristic.
        encode(*value)
    }
}

/// Opaque payload, absent when the characteristic delivers no bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBytes;

impl Decode for RawBytes {
    type Value = Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        if bytes.is_empty() {
            None
        } else {
            Some(bytes.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_little_endian_scalars() {
        let bytes = [0x88, 0x13, 0x00, 0x00];
        assert_eq!(extract::<u32>(&bytes, 0), Some(5000));
        assert_eq!(extract::<i16>(&bytes, 0), Some(5000));
        assert_eq!(extract::<u8>(&bytes, 1), Some(0x13));
        assert_eq!(extract::<i8>(&[0xFE], 0), Some(-2));
    }

    #[test]
    fn short_buffers_decode_to_none() {
        assert_eq!(extract::<u32>(&[0x01, 0x02, 0x03], 0), None);
        assert_eq!(extract::<u16>(&[0x01, 0x02], 1), None);
        assert_eq!(extract::<u8>(&[], 0), None);
        assert_eq!(extract::<u8>(&[0x01], usize::MAX), None);
    }

    #[test]
    fn scalar_codec_honours_offset() {
        let codec = Scalar::<u16>::at_offset(2);
        assert_eq!(codec.decode(&[0xFF, 0xFF, 0x20, 0x02]), Some(0x0220));
        assert_eq!(codec.decode(&[0xFF, 0xFF, 0x20]), None);
        assert_eq!(codec.encode(&0x0220), vec![0x20, 0x02]);
    }

    #[test]
    fn negative_values_encode_twos_complement() {
        assert_eq!(encode(-4500i16), vec![0x6C, 0xEE]);
        assert_eq!(extract::<i16>(&[0x6C, 0xEE], 0), Some(-4500));
    }

    #[test]
    fn raw_bytes_are_absent_when_empty() {
        assert_eq!(RawBytes.decode(&[]), None);
        assert_eq!(RawBytes.decode(&[1, 2, 3]), Some(vec![1, 2, 3]));
    }
}
