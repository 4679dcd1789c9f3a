pub mod segment;
pub mod subject;

pub use segment::{segment, SegmentedText};
pub use subject::parse;
