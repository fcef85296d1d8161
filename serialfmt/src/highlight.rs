use crate::DataFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Plain,
    Cr,
    Lf,
    CrLf,
}

/// A run of rendered text. Concatenating the `text` of all segments returned by
/// [`highlight`] reproduces its input.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}
impl Segment {
    pub const fn is_line_ending(&self) -> bool {
        !matches!(self.kind, SegmentKind::Plain)
    }
}

#[derive(Default)]
struct Segments(Vec<Segment>);
impl Segments {
    fn plain(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.0.last_mut() {
            Some(last) if last.kind == SegmentKind::Plain => last.text.push_str(text),
            _ => self.0.push(Segment { kind: SegmentKind::Plain, text: text.to_string() }),
        }
    }
    fn mark(&mut self, kind: SegmentKind, text: &str) {
        self.0.push(Segment { kind, text: text.to_string() });
    }
}

/// Splits rendered text into plain runs and CR/LF runs.
///
/// Text formats match the control characters themselves. Token formats match the
/// whitespace separated tokens that encode 0x0D and 0x0A (`0D`/`0A` for hex, `13`/`10`
/// for decimal, the two octets for binary). Base64 has no byte boundaries and is
/// returned as a single plain run.
pub fn highlight(text: &str, format: DataFormat) -> Vec<Segment> {
    let mut segments = Segments::default();
    match format {
        DataFormat::Ascii | DataFormat::Utf8 => highlight_chars(text, &mut segments),
        DataFormat::Hex => highlight_tokens(text, "0D", "0A", &mut segments),
        DataFormat::Decimal => highlight_tokens(text, "13", "10", &mut segments),
        DataFormat::Binary => highlight_tokens(text, "00001101", "00001010", &mut segments),
        DataFormat::Base64 => segments.plain(text),
    }
    segments.0
}

fn highlight_chars(text: &str, segments: &mut Segments) {
    let mut rest = text;
    while let Some(pos) = rest.find(['\r', '\n']) {
        segments.plain(&rest[..pos]);
        let tail = &rest[pos..];
        let (kind, len) = if tail.starts_with("\r\n") {
            (SegmentKind::CrLf, 2)
        } else if tail.starts_with('\r') {
            (SegmentKind::Cr, 1)
        } else {
            (SegmentKind::Lf, 1)
        };
        segments.mark(kind, &tail[..len]);
        rest = &tail[len..];
    }
    segments.plain(rest);
}

fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (index, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, index));
                start = None;
            }
            (false, None) => start = Some(index),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

fn highlight_tokens(text: &str, cr: &str, lf: &str, segments: &mut Segments) {
    let spans = token_spans(text);
    let is = |span: Option<&(usize, usize)>, token: &str| {
        span.is_some_and(|&(start, end)| text[start..end].eq_ignore_ascii_case(token))
    };
    let mut cursor = 0;
    let mut i = 0;
    while i < spans.len() {
        let (start, end) = spans[i];
        let (kind, end, consumed) = if is(spans.get(i), cr) && is(spans.get(i + 1), lf) {
            (SegmentKind::CrLf, spans[i + 1].1, 2)
        } else if is(spans.get(i), cr) {
            (SegmentKind::Cr, end, 1)
        } else if is(spans.get(i), lf) {
            (SegmentKind::Lf, end, 1)
        } else {
            i += 1;
            continue;
        };
        segments.plain(&text[cursor..start]);
        segments.mark(kind, &text[start..end]);
        cursor = end;
        i += consumed;
    }
    segments.plain(&text[cursor..]);
}

/// Renders segments for a plain terminal: control characters become visible glyphs
/// (an LF keeps its line break) and matched tokens are wrapped in brackets.
pub fn to_marked(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let raw = segment.text.starts_with(['\r', '\n']);
        match (segment.kind, raw) {
            (SegmentKind::Plain, _) => out.push_str(&segment.text),
            (SegmentKind::Cr, true) => out.push('␍'),
            (SegmentKind::Lf, true) => out.push_str("␊\n"),
            (SegmentKind::CrLf, true) => out.push_str("␍␊\n"),
            (_, false) => {
                out.push('[');
                out.push_str(&segment.text);
                out.push(']');
            }
        }
    }
    out
}
