//! BLTE header structures and parsing

use binrw::io::{Cursor, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite};

use super::error::{BlteError, BlteResult};

/// BLTE magic bytes
pub const BLTE_MAGIC: [u8; 4] = *b"BLTE";

/// Size of the magic plus the header size field
pub const PREAMBLE_SIZE: usize = 8;

/// Header flags for chunk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderFlags {
    /// Standard chunk info (24 bytes per chunk)
    Standard = 0x0F,
    /// Extended chunk info (40 bytes per chunk)
    Extended = 0x10,
}

impl HeaderFlags {
    /// Parse from byte value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0F => Some(Self::Standard),
            0x10 => Some(Self::Extended),
            _ => None,
        }
    }

    /// Get the size of each chunk info entry
    pub fn chunk_info_size(self) -> usize {
        match self {
            Self::Standard => 24,
            Self::Extended => 40,
        }
    }
}

/// Chunk information (24 bytes standard, 40 bytes extended)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Compressed size including the mode byte
    pub compressed_size: u32,
    /// Decompressed size (allocation hint only)
    pub decompressed_size: u32,
    /// MD5 of the mode byte plus chunk payload, all zero when absent
    pub checksum: [u8; 16],
    /// MD5 of the decompressed data (extended format only)
    pub decompressed_checksum: Option<[u8; 16]>,
}

impl BinRead for ChunkInfo {
    type Args<'a> = (HeaderFlags,);

    fn read_options<R: binrw::io::Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (flags,) = args;

        let compressed_size = u32::read_options(reader, binrw::Endian::Big, ())?;
        let decompressed_size = u32::read_options(reader, binrw::Endian::Big, ())?;
        let checksum = <[u8; 16]>::read_options(reader, binrw::Endian::Big, ())?;

        let decompressed_checksum = if flags == HeaderFlags::Extended {
            Some(<[u8; 16]>::read_options(reader, binrw::Endian::Big, ())?)
        } else {
            None
        };

        Ok(Self {
            compressed_size,
            decompressed_size,
            checksum,
            decompressed_checksum,
        })
    }
}

impl BinWrite for ChunkInfo {
    type Args<'a> = (HeaderFlags,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        let (flags,) = args;

        self.compressed_size
            .write_options(writer, binrw::Endian::Big, ())?;
        self.decompressed_size
            .write_options(writer, binrw::Endian::Big, ())?;
        writer.write_all(&self.checksum)?;

        if flags == HeaderFlags::Extended {
            writer.write_all(&self.decompressed_checksum.unwrap_or([0u8; 16]))?;
        }

        Ok(())
    }
}

/// Chunk table present when the header size is non-zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTable {
    /// Descriptor layout
    pub flags: HeaderFlags,
    /// One descriptor per chunk, in payload order
    pub chunk_infos: Vec<ChunkInfo>,
}

/// BLTE file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlteHeader {
    /// Header size including the 8 byte preamble (0 = single implicit chunk)
    pub header_size: u32,
    /// Chunk table (present when `header_size` > 0)
    pub table: Option<ChunkTable>,
}

impl BlteHeader {
    /// Parse the header from the start of a payload
    ///
    /// Descriptors are checked against the header size but not against the
    /// payload length; chunk extraction does that.
    pub fn parse(data: &[u8]) -> BlteResult<Self> {
        if data.len() < PREAMBLE_SIZE {
            return Err(BlteError::Truncated {
                needed: PREAMBLE_SIZE,
                available: data.len(),
            });
        }

        let magic = [data[0], data[1], data[2], data[3]];
        if magic != BLTE_MAGIC {
            return Err(BlteError::InvalidMagic(magic));
        }

        let header_size = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if header_size == 0 {
            return Ok(Self::single_chunk());
        }

        let table_start = PREAMBLE_SIZE + 4;
        if (header_size as usize) < table_start || header_size as usize > data.len() {
            return Err(BlteError::InvalidHeaderSize(header_size));
        }

        let flags =
            HeaderFlags::from_byte(data[8]).ok_or(BlteError::InvalidHeaderFlags(data[8]))?;
        let chunk_count = u32::from_be_bytes([0, data[9], data[10], data[11]]);
        if chunk_count == 0 {
            return Err(BlteError::InvalidChunkCount(0));
        }

        let table_end = table_start + chunk_count as usize * flags.chunk_info_size();
        if table_end > header_size as usize {
            return Err(BlteError::InvalidHeaderSize(header_size));
        }

        let mut cursor = Cursor::new(&data[table_start..table_end]);
        let mut chunk_infos = Vec::with_capacity(chunk_count as usize);
        for _ in 0..chunk_count {
            chunk_infos.push(ChunkInfo::read_options(
                &mut cursor,
                binrw::Endian::Big,
                (flags,),
            )?);
        }

        Ok(Self {
            header_size,
            table: Some(ChunkTable { flags, chunk_infos }),
        })
    }

    /// Create a header for a single-chunk file
    pub fn single_chunk() -> Self {
        Self {
            header_size: 0,
            table: None,
        }
    }

    /// Create a header with an explicit chunk table
    pub fn with_table(flags: HeaderFlags, chunk_infos: Vec<ChunkInfo>) -> BlteResult<Self> {
        if chunk_infos.is_empty() || chunk_infos.len() > 0xFF_FFFF {
            return Err(BlteError::InvalidChunkCount(chunk_infos.len() as u32));
        }

        let header_size = PREAMBLE_SIZE + 4 + chunk_infos.len() * flags.chunk_info_size();
        Ok(Self {
            header_size: header_size as u32,
            table: Some(ChunkTable { flags, chunk_infos }),
        })
    }

    /// Check if this is a single-chunk file
    pub fn is_single_chunk(&self) -> bool {
        self.table.is_none()
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.table.as_ref().map_or(1, |t| t.chunk_infos.len())
    }

    /// Offset of the first chunk payload
    pub fn data_offset(&self) -> usize {
        if self.is_single_chunk() {
            PREAMBLE_SIZE
        } else {
            self.header_size as usize
        }
    }

    /// Serialise the header
    pub fn to_bytes(&self) -> BlteResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.data_offset());
        let mut cursor = Cursor::new(&mut buffer);
        cursor.write_all(&BLTE_MAGIC)?;
        self.header_size
            .write_options(&mut cursor, binrw::Endian::Big, ())?;

        if let Some(table) = &self.table {
            let count = table.chunk_infos.len() as u32;
            cursor.write_all(&[
                table.flags as u8,
                (count >> 16) as u8,
                (count >> 8) as u8,
                count as u8,
            ])?;
            for info in &table.chunk_infos {
                info.write_options(&mut cursor, binrw::Endian::Big, (table.flags,))?;
            }
        }

        Ok(buffer)
    }
}
