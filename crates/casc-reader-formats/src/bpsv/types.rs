use std::fmt;
use thiserror::Error;

/// BPSV column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BpsvType {
    /// String field with size hint
    String(usize),
    /// Hexadecimal field with byte count
    Hex(usize),
    /// Decimal number field with byte count
    Dec(usize),
    /// Any other declared type, kept verbatim
    Other(String),
}

impl BpsvType {
    /// Parse a type specification like `STRING:0` or `HEX:16`
    ///
    /// A missing or unreadable size counts as 0; unknown type names are kept.
    pub fn parse(spec: &str) -> Self {
        let (name, size) = spec.split_once(':').unwrap_or((spec, "0"));
        let size = size.trim().parse::<usize>().unwrap_or(0);
        match name.trim().to_ascii_uppercase().as_str() {
            "STRING" => Self::String(size),
            "HEX" => Self::Hex(size),
            "DEC" => Self::Dec(size),
            _ => Self::Other(spec.trim().to_string()),
        }
    }
}

impl fmt::Display for BpsvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(size) => write!(f, "STRING:{size}"),
            Self::Hex(size) => write!(f, "HEX:{size}"),
            Self::Dec(size) => write!(f, "DEC:{size}"),
            Self::Other(spec) => f.write_str(spec),
        }
    }
}

/// Column of a BPSV table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpsvField {
    /// Column name (text before `!`)
    pub name: String,
    /// Declared type
    pub field_type: BpsvType,
}

impl BpsvField {
    /// Parse a header cell like `Product!STRING:0`
    ///
    /// A cell without `!` is a bare name typed as a string.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('!') {
            Some((name, ty)) => Self {
                name: name.trim().to_string(),
                field_type: BpsvType::parse(ty),
            },
            None => Self {
                name: spec.trim().to_string(),
                field_type: BpsvType::String(0),
            },
        }
    }
}

/// BPSV parsing errors
#[derive(Debug, Error)]
pub enum BpsvError {
    /// No header line
    #[error("empty BPSV document")]
    EmptyDocument,

    /// Header line without any named column
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Text is not UTF-8
    #[error("BPSV text is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type for BPSV operations
pub type BpsvResult<T> = Result<T, BpsvError>;
