use std::fmt::Display;
use std::str::FromStr;

/// Line ending appended to written data, or used as the read delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    None,
    Cr,
    Lf,
    CrLf,
}
impl LineEnding {
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            LineEnding::None => &[],
            LineEnding::Cr => &[0x0D],
            LineEnding::Lf => &[0x0A],
            LineEnding::CrLf => &[0x0D, 0x0A],
        }
    }
    pub const fn name(self) -> &'static str {
        match self {
            LineEnding::None => "none",
            LineEnding::Cr => "cr",
            LineEnding::Lf => "lf",
            LineEnding::CrLf => "crlf",
        }
    }
    pub fn apply(self, mut payload: Vec<u8>) -> Vec<u8> {
        payload.extend_from_slice(self.bytes());
        payload
    }
}
impl Display for LineEnding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown line ending '{0}', expected one of none, cr, lf, crlf")]
pub struct UnknownLineEnding(String);

impl FromStr for LineEnding {
    type Err = UnknownLineEnding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(LineEnding::None),
            "cr" | "\\r" => Ok(LineEnding::Cr),
            "lf" | "nl" | "\\n" => Ok(LineEnding::Lf),
            "crlf" | "\\r\\n" => Ok(LineEnding::CrLf),
            _ => Err(UnknownLineEnding(s.to_string())),
        }
    }
}

/// Accumulates received bytes and cuts them into frames that end with a delimiter.
///
/// Frames keep their delimiter. A frame that grows to `max_len` bytes without
/// seeing the delimiter is emitted as-is. With [`LineEnding::None`] every fed chunk
/// is passed straight through.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    delimiter: LineEnding,
    max_len: usize,
}
impl LineBuffer {
    pub fn new(delimiter: LineEnding, max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            delimiter,
            max_len: max_len.max(1),
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        if self.delimiter == LineEnding::None {
            return if data.is_empty() { Vec::new() } else { vec![data.to_vec()] };
        }
        let delimiter = self.delimiter.bytes();
        let mut frames = Vec::new();
        for &byte in data {
            self.buffer.push(byte);
            if self.buffer.ends_with(delimiter) || self.buffer.len() >= self.max_len {
                frames.push(core::mem::take(&mut self.buffer));
            }
        }
        frames
    }

    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(core::mem::take(&mut self.buffer))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_ending_bytes() {
        assert_eq!(LineEnding::None.bytes(), b"");
        assert_eq!(LineEnding::CrLf.bytes(), b"\r\n");
        assert_eq!(LineEnding::Cr.apply(b"AT".to_vec()), b"AT\r");
    }

    #[test]
    fn test_line_ending_from_str() {
        assert_eq!("CRLF".parse::<LineEnding>().unwrap(), LineEnding::CrLf);
        assert_eq!("nl".parse::<LineEnding>().unwrap(), LineEnding::Lf);
        assert!("lfcr".parse::<LineEnding>().is_err());
    }

    #[test]
    fn test_frames_split_across_feeds() {
        let mut buffer = LineBuffer::new(LineEnding::CrLf, 64);
        assert!(buffer.feed(b"hel").is_empty());
        assert!(buffer.feed(b"lo\r").is_empty());
        assert_eq!(buffer.feed(b"\nwor"), vec![b"hello\r\n".to_vec()]);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.flush(), Some(b"wor".to_vec()));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_multiple_frames_in_one_feed() {
        let mut buffer = LineBuffer::new(LineEnding::Lf, 64);
        assert_eq!(buffer.feed(b"a\nb\n\n"), vec![b"a\n".to_vec(), b"b\n".to_vec(), b"\n".to_vec()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_lone_cr_does_not_end_crlf_frame() {
        let mut buffer = LineBuffer::new(LineEnding::CrLf, 64);
        assert!(buffer.feed(b"a\rb\n").is_empty());
        assert_eq!(buffer.feed(b"\r\n"), vec![b"a\rb\n\r\n".to_vec()]);
    }

    #[test]
    fn test_max_len_forces_frame() {
        let mut buffer = LineBuffer::new(LineEnding::Lf, 4);
        assert_eq!(buffer.feed(b"abcdef"), vec![b"abcd".to_vec()]);
        assert_eq!(buffer.flush(), Some(b"ef".to_vec()));
    }

    #[test]
    fn test_none_delimiter_passes_chunks_through() {
        let mut buffer = LineBuffer::new(LineEnding::None, 4);
        assert_eq!(buffer.feed(b"abcdef"), vec![b"abcdef".to_vec()]);
        assert!(buffer.feed(b"").is_empty());
        assert_eq!(buffer.flush(), None);
    }
}
