//! MD5-derived keys and numeric file identifiers

use binrw::{BinRead, BinWrite};
use md5::{Digest, Md5};
use std::fmt;

fn md5_digest(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Content key (MD5 of the decoded file contents)
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey([u8; 16]);

impl ContentKey {
    /// Create content key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create content key from a slice of exactly 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(Self)
    }

    /// Create content key from data by computing its MD5 hash
    pub fn from_data(data: &[u8]) -> Self {
        Self(md5_digest(data))
    }

    /// Parse content key from a 32 character hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for ContentKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encoding key (MD5 of the block-encoded payload as stored in archives)
///
/// Some producers only publish a truncated prefix of the key (TVFS uses 9
/// bytes). Such keys are zero padded and remember their significant length
/// so index lookups use the right width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodingKey {
    bytes: [u8; 16],
    len: u8,
}

impl BinRead for EncodingKey {
    type Args<'a> = ();

    fn read_options<R: binrw::io::Read + binrw::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let bytes = <[u8; 16]>::read_options(reader, endian, args)?;
        Ok(Self::from_bytes(bytes))
    }
}

impl BinWrite for EncodingKey {
    type Args<'a> = ();

    fn write_options<W: binrw::io::Write + binrw::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        self.bytes.write_options(writer, endian, args)
    }
}

impl EncodingKey {
    /// Create encoding key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes, len: 16 }
    }

    /// Create encoding key from a possibly truncated prefix (1..=16 bytes)
    pub fn from_prefix(prefix: &[u8]) -> Option<Self> {
        if prefix.is_empty() || prefix.len() > 16 {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes[..prefix.len()].copy_from_slice(prefix);
        Some(Self {
            bytes,
            len: prefix.len() as u8,
        })
    }

    /// Create encoding key from data by computing its MD5 hash
    pub fn from_data(data: &[u8]) -> Self {
        Self::from_bytes(md5_digest(data))
    }

    /// Parse encoding key from hex (full or truncated)
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let decoded = hex::decode(hex)?;
        Self::from_prefix(&decoded).ok_or(hex::FromHexError::InvalidStringLength)
    }

    /// Get the padded 16 raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Significant bytes of the key
    pub fn significant(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Whether only a prefix of the real key is known
    pub const fn is_truncated(&self) -> bool {
        self.len < 16
    }

    /// Convert the significant bytes to hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.significant())
    }

    /// Get first 9 bytes, the width most index files store
    pub fn first_9(&self) -> [u8; 9] {
        let mut result = [0u8; 9];
        result.copy_from_slice(&self.bytes[..9]);
        result
    }
}

impl fmt::Display for EncodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for EncodingKey {
    fn as_ref(&self) -> &[u8] {
        self.significant()
    }
}

/// Numeric file identifier used by block root manifests
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[brw(little)]
pub struct FileDataId(pub u32);

impl FileDataId {
    /// Create a new `FileDataId`
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FileDataId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<FileDataId> for u32 {
    fn from(fdid: FileDataId) -> Self {
        fdid.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_from_data() {
        let key = ContentKey::from_data(b"Hello, World!");
        assert_eq!(key.to_hex(), "65a8e27d8879283831b664bd8b7f0ad4");
    }

    #[test]
    fn test_content_key_from_hex() {
        let hex = "65a8e27d8879283831b664bd8b7f0ad4";
        let key = ContentKey::from_hex(hex).expect("valid hex");
        assert_eq!(key.to_hex(), hex);
        assert!(ContentKey::from_hex("65a8").is_err());
    }

    #[test]
    fn test_content_key_from_slice() {
        assert!(ContentKey::from_slice(&[0u8; 15]).is_none());
        let key = ContentKey::from_slice(&[7u8; 16]).expect("16 bytes");
        assert_eq!(key.as_bytes(), &[7u8; 16]);
    }

    #[test]
    fn test_encoding_key_prefix() {
        let key = EncodingKey::from_prefix(&[0xaa, 0xbb, 0xcc, 0xdd, 0x00, 0x11, 0x22, 0x33, 0xee])
            .expect("nine bytes");
        assert!(key.is_truncated());
        assert_eq!(key.significant().len(), 9);
        assert_eq!(key.to_hex(), "aabbccdd00112233ee");
        assert_eq!(&key.as_bytes()[9..], &[0u8; 7]);

        assert!(EncodingKey::from_prefix(&[]).is_none());
        assert!(EncodingKey::from_prefix(&[0u8; 17]).is_none());
    }

    #[test]
    fn test_encoding_key_hex_widths() {
        let full = EncodingKey::from_hex("0102030405060708090a0b0c0d0e0f10").expect("full key");
        assert!(!full.is_truncated());
        assert_eq!(full.first_9(), [1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let short = EncodingKey::from_hex("010203040506070809").expect("truncated key");
        assert_eq!(short.first_9(), full.first_9());
        assert_ne!(short, full);
    }

    #[test]
    fn test_file_data_id_binrw() {
        use binrw::io::Cursor;

        let original = FileDataId::new(0x1234_5678);
        let mut buffer = Vec::new();
        original
            .write_le(&mut Cursor::new(&mut buffer))
            .expect("write to memory");
        assert_eq!(buffer, vec![0x78, 0x56, 0x34, 0x12]);

        let parsed = FileDataId::read_le(&mut Cursor::new(&buffer)).expect("read from memory");
        assert_eq!(original, parsed);
        assert_eq!(format!("{parsed}"), "305419896");
    }
}
