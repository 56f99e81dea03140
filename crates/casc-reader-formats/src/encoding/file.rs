use crate::encoding::entry::{CKeyPageEntry, EKeyPageEntry, KeySizes};
use crate::encoding::error::{EncodingError, EncodingResult};
use crate::encoding::header::{EncodingHeader, HEADER_SIZE, PAGE_INDEX_ENTRY_SIZE};
use crate::encoding::ESpecTable;
use binrw::BinRead;
use casc_reader_crypto::{ContentKey, EncodingKey};
use std::io::Cursor;

/// Page index record: first key of the page and the page MD5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndexEntry {
    /// First key in the page
    pub first_key: [u8; 16],
    /// MD5 of the full page, padding included
    pub checksum: [u8; 16],
}

impl PageIndexEntry {
    fn read(data: &[u8]) -> Self {
        let mut first_key = [0u8; 16];
        let mut checksum = [0u8; 16];
        first_key.copy_from_slice(&data[..16]);
        checksum.copy_from_slice(&data[16..32]);
        Self {
            first_key,
            checksum,
        }
    }

    /// Verify page data against checksum
    pub fn verify(&self, page: &[u8]) -> bool {
        md5::compute(page).0 == self.checksum
    }
}

/// Parsed encoding table
#[derive(Debug, Clone)]
pub struct EncodingFile {
    /// Table header
    pub header: EncodingHeader,
    /// `ESpec` strings referenced by encoding key entries
    pub espec_table: ESpecTable,
    /// Content key page index
    pub ckey_index: Vec<PageIndexEntry>,
    /// Content key entries across all pages, in page order
    pub ckey_entries: Vec<CKeyPageEntry>,
    /// Encoding key page index
    pub ekey_index: Vec<PageIndexEntry>,
    /// Encoding key entries across all pages, in page order
    pub ekey_entries: Vec<EKeyPageEntry>,
    /// Self-describing `ESpec` after the last page, when present
    pub trailing_espec: Option<String>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> EncodingResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(EncodingError::Truncated {
                needed: end,
                available: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn page_index(&mut self, count: u32) -> EncodingResult<Vec<PageIndexEntry>> {
        let raw = self.take(count as usize * PAGE_INDEX_ENTRY_SIZE)?;
        Ok(raw
            .chunks_exact(PAGE_INDEX_ENTRY_SIZE)
            .map(PageIndexEntry::read)
            .collect())
    }
}

impl EncodingFile {
    /// Parse a decoded encoding table without page checksum verification
    pub fn parse(data: &[u8]) -> EncodingResult<Self> {
        Self::parse_with_options(data, false)
    }

    /// Parse a decoded encoding table
    ///
    /// With `verify_pages` every page is checked against the MD5 in its
    /// index record.
    pub fn parse_with_options(data: &[u8], verify_pages: bool) -> EncodingResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(EncodingError::Truncated {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }
        if data[..2] != *b"EN" {
            return Err(EncodingError::InvalidMagic([data[0], data[1]]));
        }

        let header = EncodingHeader::read(&mut Cursor::new(&data[..HEADER_SIZE]))?;
        header.validate()?;

        let sizes = KeySizes {
            ckey: header.ckey_hash_size,
            ekey: header.ekey_hash_size,
        };
        let mut reader = Reader {
            data,
            pos: HEADER_SIZE,
        };

        let espec_table = ESpecTable::parse(reader.take(header.espec_block_size as usize)?);

        let ckey_index = reader.page_index(header.ckey_page_count)?;
        let mut ckey_entries = Vec::new();
        for (page_number, index) in ckey_index.iter().enumerate() {
            let page = reader.take(header.ckey_page_size())?;
            if verify_pages && !index.verify(page) {
                return Err(EncodingError::ChecksumMismatch {
                    table: "content key",
                    page: page_number,
                });
            }
            parse_ckey_page(page, sizes, &mut ckey_entries)?;
        }

        let ekey_index = reader.page_index(header.ekey_page_count)?;
        let mut ekey_entries = Vec::new();
        for (page_number, index) in ekey_index.iter().enumerate() {
            let page = reader.take(header.ekey_page_size())?;
            if verify_pages && !index.verify(page) {
                return Err(EncodingError::ChecksumMismatch {
                    table: "encoding key",
                    page: page_number,
                });
            }
            parse_ekey_page(page, sizes, &mut ekey_entries)?;
        }

        let trailing = &data[reader.pos..];
        let trailing_espec = (!trailing.is_empty())
            .then(|| String::from_utf8_lossy(trailing).trim_end_matches('\0').to_string());

        Ok(Self {
            header,
            espec_table,
            ckey_index,
            ckey_entries,
            ekey_index,
            ekey_entries,
            trailing_espec,
        })
    }

    /// Content key entry by key (binary search; pages are sorted)
    pub fn find_content(&self, key: &ContentKey) -> Option<&CKeyPageEntry> {
        self.ckey_entries
            .binary_search_by(|e| e.content_key.cmp(key))
            .ok()
            .map(|i| &self.ckey_entries[i])
            .or_else(|| self.ckey_entries.iter().find(|e| e.content_key == *key))
    }

    /// Encoding key entry by key
    pub fn find_encoding(&self, key: &EncodingKey) -> Option<&EKeyPageEntry> {
        self.ekey_entries.iter().find(|e| e.encoding_key == *key)
    }

    /// `ESpec` string for an encoding key entry
    pub fn espec_for(&self, entry: &EKeyPageEntry) -> Option<&str> {
        self.espec_table.get(entry.espec_index)
    }
}

impl crate::CascFormat<'_> for EncodingFile {
    type Error = EncodingError;

    fn parse(data: &[u8]) -> EncodingResult<Self> {
        EncodingFile::parse(data)
    }
}

// Entries run until a zero key count or the space left cannot hold one
fn parse_ckey_page(
    page: &[u8],
    sizes: KeySizes,
    out: &mut Vec<CKeyPageEntry>,
) -> EncodingResult<()> {
    let min_len = 1 + 5 + sizes.ckey as usize;
    let mut cursor = Cursor::new(page);
    loop {
        let pos = cursor.position() as usize;
        if page.len() - pos < min_len || page[pos] == 0 {
            return Ok(());
        }
        let needed = min_len + page[pos] as usize * sizes.ekey as usize;
        if page.len() - pos < needed {
            return Err(EncodingError::EntryOverflow);
        }
        out.push(CKeyPageEntry::read_options(
            &mut cursor,
            binrw::Endian::Big,
            (sizes,),
        )?);
    }
}

// Entries run until an all-zero key or the page end
fn parse_ekey_page(
    page: &[u8],
    sizes: KeySizes,
    out: &mut Vec<EKeyPageEntry>,
) -> EncodingResult<()> {
    let entry_len = EKeyPageEntry::encoded_len(sizes);
    let mut cursor = Cursor::new(page);
    loop {
        let pos = cursor.position() as usize;
        if page.len() - pos < entry_len
            || page[pos..pos + sizes.ekey as usize].iter().all(|&b| b == 0)
        {
            return Ok(());
        }
        out.push(EKeyPageEntry::read_options(
            &mut cursor,
            binrw::Endian::Big,
            (sizes,),
        )?);
    }
}
