//! Content and locale flags shared by every record of a root block

use std::fmt;

/// Content flags (32 bits, 40 bits in `V4` manifests)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentFlags(pub u64);

impl ContentFlags {
    /// No flags
    pub const NONE: u64 = 0;
    /// File is loaded on Windows
    pub const LOAD_ON_WINDOWS: u64 = 0x0001;
    /// File is loaded on macOS
    pub const LOAD_ON_MACOS: u64 = 0x0002;
    /// Installed file
    pub const INSTALL: u64 = 0x0004;
    /// Low violence variant
    pub const LOW_VIOLENCE: u64 = 0x0008;
    /// Not loaded by the client
    pub const DO_NOT_LOAD: u64 = 0x0200;
    /// Payload is encrypted
    pub const ENCRYPTED: u64 = 0x1000;
    /// Block carries no name hashes
    pub const NO_NAME_HASH: u64 = 0x2000;
    /// Payload is stored without compression
    pub const NO_COMPRESSION: u64 = 0x0001_0000;

    /// Create from raw bits
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw bits
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Check whether `flag` is set
    pub const fn has(self, flag: u64) -> bool {
        self.0 & flag != 0
    }

    /// Whether records in the block carry name hashes
    pub const fn has_name_hashes(self) -> bool {
        !self.has(Self::NO_NAME_HASH)
    }
}

impl fmt::Display for ContentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Locale flags; a block applies to every locale whose bit is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocaleFlags(pub u32);

impl LocaleFlags {
    /// Every locale
    pub const ALL: u32 = 0xFFFF_FFFF;
    /// English (US)
    pub const ENUS: u32 = 0x0000_0002;
    /// Korean
    pub const KOKR: u32 = 0x0000_0004;
    /// French
    pub const FRFR: u32 = 0x0000_0010;
    /// German
    pub const DEDE: u32 = 0x0000_0020;
    /// Chinese (simplified)
    pub const ZHCN: u32 = 0x0000_0040;
    /// Spanish (Spain)
    pub const ESES: u32 = 0x0000_0080;
    /// Chinese (traditional)
    pub const ZHTW: u32 = 0x0000_0100;
    /// English (GB)
    pub const ENGB: u32 = 0x0000_0200;
    /// Russian
    pub const RURU: u32 = 0x0000_1000;

    /// Create from raw bits
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw bits
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether the two masks share a locale
    pub const fn intersects(self, mask: u32) -> bool {
        self.0 & mask != 0
    }
}

impl Default for LocaleFlags {
    fn default() -> Self {
        Self(Self::ALL)
    }
}

impl fmt::Display for LocaleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_hash_flag() {
        assert!(ContentFlags::new(ContentFlags::INSTALL).has_name_hashes());
        assert!(!ContentFlags::new(ContentFlags::NO_NAME_HASH | ContentFlags::INSTALL).has_name_hashes());
    }

    #[test]
    fn test_locale_intersects() {
        let block = LocaleFlags::new(LocaleFlags::ENUS | LocaleFlags::ENGB);
        assert!(block.intersects(LocaleFlags::ENGB));
        assert!(!block.intersects(LocaleFlags::DEDE));
        assert!(LocaleFlags::default().intersects(LocaleFlags::KOKR));
    }
}
