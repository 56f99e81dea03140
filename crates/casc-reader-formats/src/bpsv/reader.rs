use crate::bpsv::document::BpsvDocument;
use crate::bpsv::schema::BpsvSchema;
use crate::bpsv::types::{BpsvError, BpsvResult};

/// Parse a BPSV document from text
///
/// The first non-blank line is the header. `## seqn` lines set the sequence
/// number, other `#` lines and blank lines are skipped.
pub fn parse(content: &str) -> BpsvResult<BpsvDocument> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = lines
        .by_ref()
        .find(|l| !l.starts_with('#'))
        .ok_or(BpsvError::EmptyDocument)?;
    let mut document = BpsvDocument::new(BpsvSchema::parse(header)?);

    for line in lines {
        if let Some(rest) = line.strip_prefix("## seqn") {
            if let Some(seqn) = parse_sequence(rest) {
                document.set_sequence_number(seqn);
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        document.add_row(line.split('|').map(str::to_string).collect());
    }

    Ok(document)
}

/// Parse a BPSV document from raw bytes
pub fn parse_bytes(data: &[u8]) -> BpsvResult<BpsvDocument> {
    parse(std::str::from_utf8(data)?)
}

// "## seqn = 123", "## seqn: 123" or "## seqn 123"
fn parse_sequence(rest: &str) -> Option<u32> {
    rest.trim_start()
        .trim_start_matches(['=', ':'])
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const BUILD_INFO: &str = "Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Key!HEX:16|Version!STRING:0|Product!STRING:0
## seqn = 12345
us|1|0123456789abcdef0123456789abcdef|fedcba9876543210fedcba9876543210|1.15.2.55140|wow_classic_era
# a comment
eu|1|00112233445566778899aabbccddeeff|ffeeddccbbaa99887766554433221100|11.0.2.56421|wow
";

    #[test]
    fn test_parse_build_info() {
        let doc = parse(BUILD_INFO).expect("parse");
        assert_eq!(doc.sequence_number(), Some(12345));
        assert_eq!(doc.row_count(), 2);
        assert_eq!(doc.get(0, "Product"), Some("wow_classic_era"));
        assert_eq!(doc.get(1, "Build Key"), Some("00112233445566778899aabbccddeeff"));
        assert_eq!(doc.find_row("Product", "wow"), Some(1));
        assert_eq!(doc.find_row("Product", "wowt"), None);
    }

    #[test]
    fn test_short_rows_and_empty_cells() {
        let doc = parse("A!STRING:0|B!STRING:0|C!STRING:0\nx||z\ny\n").expect("parse");
        assert_eq!(doc.get(0, "B"), Some(""));
        assert_eq!(doc.get(1, "C"), Some(""));
    }

    #[test]
    fn test_crlf_and_bom() {
        let doc = parse("\u{feff}Name!STRING:0\r\nfoo\r\n").expect("parse");
        assert_eq!(doc.get(0, "Name"), Some("foo"));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(parse(""), Err(BpsvError::EmptyDocument)));
        assert!(matches!(parse("## seqn = 1\n"), Err(BpsvError::EmptyDocument)));
        assert!(parse_bytes(&[0xFF, 0xFE]).is_err());
    }
}
