mod format;
mod highlight;
mod line;

pub use format::{bytes_to_string, string_to_bytes, Conversion, DataFormat, FormatError, UnknownFormat};
pub use highlight::{highlight, to_marked, Segment, SegmentKind};
pub use line::{LineBuffer, LineEnding, UnknownLineEnding};
