use chrono::{DateTime, Local, Utc};
use serialfmt::{DataFormat, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}
impl Direction {
    pub const fn arrow(self) -> &'static str {
        match self {
            Direction::Sent => ">>",
            Direction::Received => "<<",
        }
    }
}

/// One logged message. Rendered once at creation and never changed afterwards.
#[derive(Debug, Clone, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct SerialMessage {
    id: uuid::Uuid,
    direction: Direction,
    data: Vec<u8>,
    timestamp: DateTime<Utc>,
    format: DataFormat,
    text: String,
    error: Option<String>,
    original_input: Option<String>,
}
impl SerialMessage {
    pub fn received(data: Vec<u8>, format: DataFormat) -> Self {
        Self::new(Direction::Received, data, format, None)
    }
    pub fn sent(data: Vec<u8>, format: DataFormat, original_input: String) -> Self {
        Self::new(Direction::Sent, data, format, Some(original_input))
    }
    fn new(direction: Direction, data: Vec<u8>, format: DataFormat, original_input: Option<String>) -> Self {
        let (text, error) = serialfmt::bytes_to_string(&data, format).into_parts();
        Self {
            id: uuid::Uuid::new_v4(),
            direction,
            data,
            timestamp: Utc::now(),
            format,
            text,
            error,
            original_input,
        }
    }
    pub const fn id(&self) -> uuid::Uuid { self.id }
    pub const fn direction(&self) -> Direction { self.direction }
    pub fn data(&self) -> &[u8] { &self.data }
    pub const fn format(&self) -> DataFormat { self.format }
    pub fn text(&self) -> &str { &self.text }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn original_input(&self) -> Option<&str> { self.original_input.as_deref() }

    pub fn is_resendable(&self) -> bool {
        self.direction == Direction::Sent && self.original_input.is_some()
    }
    pub fn segments(&self) -> Vec<Segment> {
        serialfmt::highlight(&self.text, self.format)
    }
    /// Local wall-clock time with milliseconds, `HH:MM:SS.mmm`.
    pub fn display_time(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M:%S%.3f").to_string()
    }
    pub fn render(&self) -> RenderedMessage {
        RenderedMessage {
            id: self.id,
            direction: self.direction,
            timestamp: self.timestamp,
            time: self.display_time(),
            format: self.format,
            text: self.text.clone(),
            segments: self.segments(),
            error: self.error.clone(),
            original_input: self.original_input.clone(),
            resendable: self.is_resendable(),
        }
    }
}

/// Client-facing view of a [`SerialMessage`].
#[derive(Debug, Clone, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct RenderedMessage {
    pub id: uuid::Uuid,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub time: String,
    pub format: DataFormat,
    pub text: String,
    pub segments: Vec<Segment>,
    pub error: Option<String>,
    pub original_input: Option<String>,
    pub resendable: bool,
}
