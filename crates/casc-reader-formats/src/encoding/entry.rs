//! Page entries of the encoding table

use binrw::{BinRead, BinResult, BinWrite};
use casc_reader_crypto::{ContentKey, EncodingKey};
use std::io::{Read, Seek, Write};

/// Key widths declared by the table header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizes {
    /// Content key width
    pub ckey: u8,
    /// Encoding key width
    pub ekey: u8,
}

impl Default for KeySizes {
    fn default() -> Self {
        Self { ckey: 16, ekey: 16 }
    }
}

fn read_40bit<R: Read + Seek>(reader: &mut R) -> BinResult<u64> {
    let high = u8::read_options(reader, binrw::Endian::Big, ())?;
    let low = u32::read_options(reader, binrw::Endian::Big, ())?;
    Ok((u64::from(high) << 32) | u64::from(low))
}

fn write_40bit<W: Write + Seek>(writer: &mut W, value: u64) -> BinResult<()> {
    ((value >> 32) as u8).write_options(writer, binrw::Endian::Big, ())?;
    (value as u32).write_options(writer, binrw::Endian::Big, ())
}

fn read_key<R: Read + Seek>(reader: &mut R, width: u8) -> BinResult<[u8; 16]> {
    let mut bytes = [0u8; 16];
    reader.read_exact(&mut bytes[..width as usize])?;
    Ok(bytes)
}

/// Content key page entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CKeyPageEntry {
    /// Decoded file size (40-bit)
    pub file_size: u64,
    /// Content key
    pub content_key: ContentKey,
    /// Encoding keys, first is canonical
    pub encoding_keys: Vec<EncodingKey>,
}

impl CKeyPageEntry {
    /// Encoded width of this entry
    pub fn encoded_len(&self, sizes: KeySizes) -> usize {
        1 + 5 + sizes.ckey as usize + self.encoding_keys.len() * sizes.ekey as usize
    }
}

impl BinRead for CKeyPageEntry {
    type Args<'a> = (KeySizes,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (sizes,) = args;
        let key_count = u8::read_options(reader, endian, ())?;
        let file_size = read_40bit(reader)?;
        let content_key = ContentKey::from_bytes(read_key(reader, sizes.ckey)?);

        let mut encoding_keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            let bytes = read_key(reader, sizes.ekey)?;
            let key = EncodingKey::from_prefix(&bytes[..sizes.ekey as usize])
                .unwrap_or_else(|| EncodingKey::from_bytes(bytes));
            encoding_keys.push(key);
        }

        Ok(Self {
            file_size,
            content_key,
            encoding_keys,
        })
    }
}

impl BinWrite for CKeyPageEntry {
    type Args<'a> = (KeySizes,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        let (sizes,) = args;
        (self.encoding_keys.len() as u8).write_options(writer, binrw::Endian::Big, ())?;
        write_40bit(writer, self.file_size)?;
        writer.write_all(&self.content_key.as_bytes()[..sizes.ckey as usize])?;
        for ekey in &self.encoding_keys {
            writer.write_all(&ekey.as_bytes()[..sizes.ekey as usize])?;
        }
        Ok(())
    }
}

/// Encoding key page entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EKeyPageEntry {
    /// Encoding key
    pub encoding_key: EncodingKey,
    /// Index into the `ESpec` table
    pub espec_index: u32,
    /// Encoded (stored) size (40-bit)
    pub file_size: u64,
}

impl EKeyPageEntry {
    /// Encoded width of this entry
    pub fn encoded_len(sizes: KeySizes) -> usize {
        sizes.ekey as usize + 4 + 5
    }
}

impl BinRead for EKeyPageEntry {
    type Args<'a> = (KeySizes,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (sizes,) = args;
        let bytes = read_key(reader, sizes.ekey)?;
        let encoding_key = EncodingKey::from_prefix(&bytes[..sizes.ekey as usize])
            .unwrap_or_else(|| EncodingKey::from_bytes(bytes));
        let espec_index = u32::read_options(reader, binrw::Endian::Big, ())?;
        let file_size = read_40bit(reader)?;

        Ok(Self {
            encoding_key,
            espec_index,
            file_size,
        })
    }
}

impl BinWrite for EKeyPageEntry {
    type Args<'a> = (KeySizes,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        let (sizes,) = args;
        writer.write_all(&self.encoding_key.as_bytes()[..sizes.ekey as usize])?;
        self.espec_index
            .write_options(writer, binrw::Endian::Big, ())?;
        write_40bit(writer, self.file_size)
    }
}
