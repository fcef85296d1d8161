use std::fmt::Display;
use std::num::IntErrorKind;
use std::str::FromStr;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Textual encoding used to display received bytes and to parse typed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Hex,
    Binary,
    Ascii,
    Decimal,
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    Base64,
}
impl DataFormat {
    pub const ALL: [DataFormat; 6] = [
        DataFormat::Hex,
        DataFormat::Binary,
        DataFormat::Ascii,
        DataFormat::Decimal,
        DataFormat::Utf8,
        DataFormat::Base64,
    ];
    pub const fn name(self) -> &'static str {
        match self {
            DataFormat::Hex => "hex",
            DataFormat::Binary => "binary",
            DataFormat::Ascii => "ascii",
            DataFormat::Decimal => "decimal",
            DataFormat::Utf8 => "utf8",
            DataFormat::Base64 => "base64",
        }
    }
    /// Formats whose rendered text contains the raw characters rather than byte tokens.
    pub const fn is_text(self) -> bool {
        matches!(self, DataFormat::Ascii | DataFormat::Utf8)
    }
}
impl Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown data format '{0}', expected one of hex, binary, ascii, decimal, utf8, base64")]
pub struct UnknownFormat(String);

impl FromStr for DataFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(DataFormat::Hex),
            "bin" | "binary" => Ok(DataFormat::Binary),
            "ascii" => Ok(DataFormat::Ascii),
            "dec" | "decimal" => Ok(DataFormat::Decimal),
            "utf8" | "utf-8" => Ok(DataFormat::Utf8),
            "base64" | "b64" => Ok(DataFormat::Base64),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Result of rendering bytes as text.
///
/// The text is always usable. When the bytes do not fit the format, the text is a
/// lossy rendering and `error` describes the first problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    text: String,
    error: Option<String>,
}
impl Conversion {
    fn ok(text: String) -> Self {
        Self { text, error: None }
    }
    pub fn text(&self) -> &str { &self.text }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn into_parts(self) -> (String, Option<String>) { (self.text, self.error) }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid hex digit '{ch}' at position {index}")]
    InvalidHexDigit { ch: char, index: usize },
    #[error("Hex input has an odd number of digits ({0})")]
    OddHexLength(usize),
    #[error("Invalid binary token '{0}'")]
    InvalidBinary(String),
    #[error("Invalid decimal token '{0}'")]
    InvalidDecimal(String),
    #[error("Decimal value {0} does not fit in a byte")]
    DecimalOutOfRange(String),
    #[error("Non-ASCII character '{ch}' at position {index}")]
    NonAscii { ch: char, index: usize },
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),
}

pub fn bytes_to_string(bytes: &[u8], format: DataFormat) -> Conversion {
    match format {
        DataFormat::Hex => Conversion::ok(join_bytes(bytes, |b| format!("{b:02X}"))),
        DataFormat::Binary => Conversion::ok(join_bytes(bytes, |b| format!("{b:08b}"))),
        DataFormat::Decimal => Conversion::ok(join_bytes(bytes, |b| b.to_string())),
        DataFormat::Ascii => {
            let mut error = None;
            let text = bytes.iter()
                .enumerate()
                .map(|(offset, &b)| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        if error.is_none() {
                            error = Some(format!("non-ASCII byte 0x{b:02X} at offset {offset}"));
                        }
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect();
            Conversion { text, error }
        }
        DataFormat::Utf8 => match std::str::from_utf8(bytes) {
            Ok(text) => Conversion::ok(text.to_string()),
            Err(err) => Conversion {
                text: String::from_utf8_lossy(bytes).into_owned(),
                error: Some(format!("invalid UTF-8 at offset {}", err.valid_up_to())),
            },
        },
        DataFormat::Base64 => Conversion::ok(STANDARD.encode(bytes)),
    }
}

pub fn string_to_bytes(text: &str, format: DataFormat) -> Result<Vec<u8>, FormatError> {
    match format {
        DataFormat::Hex => parse_hex(text),
        DataFormat::Binary => parse_binary(text),
        DataFormat::Decimal => parse_decimal(text),
        DataFormat::Ascii => {
            match text.chars().enumerate().find(|(_, ch)| !ch.is_ascii()) {
                Some((index, ch)) => Err(FormatError::NonAscii { ch, index }),
                None => Ok(text.as_bytes().to_vec()),
            }
        }
        DataFormat::Utf8 => Ok(text.as_bytes().to_vec()),
        DataFormat::Base64 => {
            let compact: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
            STANDARD.decode(compact)
                .map_err(|err| FormatError::InvalidBase64(err.to_string()))
        }
    }
}

fn join_bytes(bytes: &[u8], f: impl Fn(u8) -> String) -> String {
    bytes.iter()
        .map(|&b| f(b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|token| !token.is_empty())
}

/// Digits are checked against the input as typed, so errors carry the character
/// position the user sees. A `0x`/`0X` prefix is only skipped at the start of a token.
fn parse_hex(text: &str) -> Result<Vec<u8>, FormatError> {
    let mut digits = String::with_capacity(text.len());
    let mut chars = text.chars().enumerate().peekable();
    let mut token_start = true;
    while let Some((index, ch)) = chars.next() {
        if ch.is_whitespace() || ch == ',' {
            token_start = true;
            continue;
        }
        if token_start && ch == '0' && matches!(chars.peek(), Some((_, 'x' | 'X'))) {
            chars.next();
            token_start = false;
            continue;
        }
        token_start = false;
        if !ch.is_ascii_hexdigit() {
            return Err(FormatError::InvalidHexDigit { ch, index });
        }
        digits.push(ch);
    }
    if digits.len() % 2 != 0 {
        return Err(FormatError::OddHexLength(digits.len()));
    }
    hex::decode(&digits).map_err(|_| FormatError::OddHexLength(digits.len()))
}

fn parse_binary(text: &str) -> Result<Vec<u8>, FormatError> {
    fn octet(digits: &[u8]) -> u8 {
        digits.iter().fold(0u8, |acc, digit| (acc << 1) | (digit - b'0'))
    }
    let mut out = Vec::new();
    for token in tokens(text) {
        if !token.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(FormatError::InvalidBinary(token.to_string()));
        }
        let digits = token.as_bytes();
        if digits.len() <= 8 {
            out.push(octet(digits));
        } else if digits.len() % 8 == 0 {
            out.extend(digits.chunks(8).map(octet));
        } else {
            return Err(FormatError::InvalidBinary(token.to_string()));
        }
    }
    Ok(out)
}

fn parse_decimal(text: &str) -> Result<Vec<u8>, FormatError> {
    tokens(text)
        .map(|token| match token.parse::<u8>() {
            Ok(v) => Ok(v),
            Err(err) if matches!(err.kind(), IntErrorKind::PosOverflow) => Err(FormatError::DecimalOutOfRange(token.to_string())),
            Err(_) => Err(FormatError::InvalidDecimal(token.to_string())),
        })
        .collect()
}
