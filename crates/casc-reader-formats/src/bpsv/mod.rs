//! BPSV (Blizzard Pipe-Separated Values) tables
//!
//! `.build.info` is a BPSV table: a header line of `Name!TYPE:size` cells,
//! an optional `## seqn = N` line and pipe-separated data rows. Parsing is
//! lenient; unknown types are kept, short rows are padded.
//!
//! ```
//! use casc_reader_formats::bpsv::parse;
//!
//! let document = parse("Product!STRING:0|Build Key!HEX:16\nwow|0123456789abcdef0123456789abcdef")
//!     .expect("parse");
//! assert_eq!(document.get(0, "Build Key"), Some("0123456789abcdef0123456789abcdef"));
//! ```

mod document;
mod reader;
mod schema;
mod types;

pub use document::BpsvDocument;
pub use reader::{parse, parse_bytes};
pub use schema::BpsvSchema;
pub use types::{BpsvError, BpsvField, BpsvResult, BpsvType};
