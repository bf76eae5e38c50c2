//! Manager wire framing: byte stream to envelopes, envelopes to messages

use crate::{
    constants::{FRAME_TERMINATOR, LINE_TERMINATOR, MAX_BUFFER_SIZE},
    envelope::Envelope,
    error::{AmiError, AmiResult},
    event::AmiEvent,
    headers::AmiHeader,
    response::AmiResponse,
};
use tracing::trace;

/// Inbound envelope classified by the presence of an `Event` key.
#[derive(Debug, Clone, PartialEq)]
pub enum AmiMessage {
    /// Reply to an earlier action, matched by `ActionID`.
    Response(AmiResponse),
    /// Unsolicited event.
    Event(AmiEvent),
}

impl AmiMessage {
    /// Classify a raw envelope.
    pub fn from_envelope(envelope: Envelope) -> Self {
        if envelope.contains(AmiHeader::Event) {
            AmiMessage::Event(AmiEvent::from_envelope(envelope))
        } else {
            AmiMessage::Response(AmiResponse::from_envelope(envelope))
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

/// Parse the lines of one frame (without its terminator).
///
/// Each line is split on the first `:` with both halves trimmed. Lines
/// without a colon or with an empty key are skipped.
fn parse_frame(raw: &[u8]) -> Envelope {
    let text = String::from_utf8_lossy(raw);
    let mut envelope = Envelope::new();

    for line in text.split(LINE_TERMINATOR) {
        match line.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                envelope.set(key.trim(), value.trim());
            }
            _ => {
                if !line.is_empty() {
                    trace!("[RECV] Skipping unparsable line: {:?}", line);
                }
            }
        }
    }

    envelope
}

/// Split every fully terminated frame off the front of `buffer`.
///
/// Returns the parsed frames and the unterminated remainder, which the caller
/// keeps and prepends to the next read. Empty frames (a stray blank line) are
/// dropped.
pub fn extract_frames(buffer: &[u8]) -> (Vec<Envelope>, &[u8]) {
    let terminator = FRAME_TERMINATOR.as_bytes();
    let mut frames = Vec::new();
    let mut rest = buffer;

    while let Some(pos) = find(rest, terminator) {
        let frame = parse_frame(&rest[..pos]);
        if !frame.is_empty() {
            frames.push(frame);
        }
        rest = &rest[pos + terminator.len()..];
    }

    (frames, rest)
}

/// Incremental frame decoder over an arbitrarily chunked byte stream.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buffer: Vec<u8>,
}

impl FrameCodec {
    /// Create an empty codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the socket.
    ///
    /// Fails once more than [`MAX_BUFFER_SIZE`] bytes are pending without a
    /// frame terminator.
    pub fn add_data(&mut self, data: &[u8]) -> AmiResult<()> {
        self.buffer
            .extend_from_slice(data);
        if self
            .buffer
            .len()
            > MAX_BUFFER_SIZE
        {
            return Err(AmiError::protocol_error(format!(
                "{} bytes buffered without a frame terminator (limit {})",
                self.buffer
                    .len(),
                MAX_BUFFER_SIZE
            )));
        }
        Ok(())
    }

    /// Take a single `\r\n`-terminated line, used for the server greeting.
    pub fn take_line(&mut self) -> Option<String> {
        let pos = find(&self.buffer, LINE_TERMINATOR.as_bytes())?;
        let line = String::from_utf8_lossy(&self.buffer[..pos]).into_owned();
        self.buffer
            .drain(..pos + LINE_TERMINATOR.len());
        Some(line)
    }

    /// Drain every complete frame currently buffered.
    pub fn extract(&mut self) -> Vec<Envelope> {
        let (frames, rest) = extract_frames(&self.buffer);
        let consumed = self
            .buffer
            .len()
            - rest.len();
        if consumed > 0 {
            self.buffer
                .drain(..consumed);
        }
        frames
    }

    /// Bytes held back waiting for a terminator.
    pub fn buffered_len(&self) -> usize {
        self.buffer
            .len()
    }
}
