//! Keystream obfuscation used for every region of the volume.
//!
//! Each byte is XORed with a running key that starts at `0xF2` and steps by
//! `0x11` (wrapping) after every byte. The key restarts for every region: the
//! footer, the file table and each entry's data are decoded independently.
//! Since the transform is a plain XOR, decoding and encoding are the same
//! operation.

/// Key applied to the first byte of a region.
pub const INITIAL_KEY: u8 = 0xF2;

/// Amount the key advances after each byte.
pub const KEY_STEP: u8 = 0x11;

/// Infinite iterator over the key bytes of one region.
#[derive(Debug, Clone)]
pub struct Keystream {
    key: u8,
}

impl Keystream {
    /// Start a fresh keystream at [`INITIAL_KEY`].
    #[inline]
    pub const fn new() -> Self {
        Self { key: INITIAL_KEY }
    }
}

impl Default for Keystream {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Keystream {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        let key = self.key;
        self.key = key.wrapping_add(KEY_STEP);
        Some(key)
    }
}

/// Decode a region in place.
#[inline]
pub fn decode_in_place(data: &mut [u8]) {
    for (byte, key) in data.iter_mut().zip(Keystream::new()) {
        *byte ^= key;
    }
}

/// Decode a region into a new buffer.
pub fn decode(data: &[u8]) -> Vec<u8> {
    data.iter().zip(Keystream::new()).map(|(&b, k)| b ^ k).collect()
}

/// Encode a region into a new buffer.
///
/// Identical to [`decode`].
#[inline]
pub fn encode(data: &[u8]) -> Vec<u8> {
    decode(data)
}
