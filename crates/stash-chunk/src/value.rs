/// Fixed-size values stored little-endian in chunk payloads.
pub trait LeValue: Copy {
    /// Encoded size in bytes; at most 8.
    const SIZE: usize;

    /// Write the value into `out[..Self::SIZE]`.
    fn encode(self, out: &mut [u8]);

    /// Read a value from `bytes[..Self::SIZE]`.
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! le_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LeValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

le_value!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_encoding() {
        let mut buf = [0u8; 8];
        0x1234u16.encode(&mut buf);
        assert_eq!(&buf[..2], &[0x34, 0x12]);
        (-2i32).encode(&mut buf);
        assert_eq!(&buf[..4], &[0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(i32::decode(&buf), -2);
        1.5f64.encode(&mut buf);
        assert_eq!(f64::decode(&buf), 1.5);
    }
}
