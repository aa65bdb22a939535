//! Line-protocol scanning and parsing.
//!
//! A line has the shape
//! `name[,tag=value...] field=value[,field=value...] [timestamp]`, where a
//! backslash before `,`, `=` or a space makes the delimiter literal.

pub mod error;
pub mod escape;
pub mod parser;
pub mod scan;
pub mod tags;
pub mod timestamp;

pub use error::ParseError;
pub use escape::{find_unescaped, has_escapes};
pub use parser::LineParser;
pub use scan::{scan_fields, scan_name, scan_tags};
pub use tags::decode_tags;
pub use timestamp::{
    Clock, FixedClock, Precision, SystemClock, normalize, precision_multiplier,
};
