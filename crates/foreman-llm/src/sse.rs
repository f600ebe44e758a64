//! Incremental server-sent-events decoding for streamed completions.

/// One decoded SSE frame. Only the fields chat-completion streams use are
/// kept; `id`/`retry` lines are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Terminator frame OpenAI-compatible streams send after the last chunk.
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }
}

/// Chunk-at-a-time SSE decoder.
///
/// Frames are delimited by a blank line. Input is normalized to `\n` as it
/// arrives; a trailing `\r` is held back in case the matching `\n` lands in
/// the next chunk.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        let carried = if self.buffer.ends_with('\r') {
            self.buffer.pop();
            true
        } else {
            false
        };
        let mut normalized = String::with_capacity(chunk.len() + 1);
        if carried {
            normalized.push('\r');
        }
        normalized.push_str(chunk);
        self.buffer.push_str(&normalized.replace("\r\n", "\n"));
        if self.buffer.ends_with('\r') {
            // Keep a dangling CR out of the parse until its LF arrives.
            let held = self.buffer.pop();
            let frames = self.drain_complete_frames();
            if let Some(held) = held {
                self.buffer.push(held);
            }
            return frames;
        }

        self.drain_complete_frames()
    }

    /// Decode whatever remains once the transport stream ends.
    pub fn finish(mut self) -> Option<SseFrame> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        let remainder = std::mem::take(&mut self.buffer);
        let frame = parse_frame(&remainder);
        if frame == SseFrame::default() {
            None
        } else {
            Some(frame)
        }
    }

    fn drain_complete_frames(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..boundary + 2).collect();
            let frame = parse_frame(&block);
            if frame != SseFrame::default() {
                frames.push(frame);
            }
        }
        frames
    }
}

fn parse_frame(block: &str) -> SseFrame {
    let mut frame = SseFrame::default();
    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => {
                if !frame.data.is_empty() {
                    frame.data.push('\n');
                }
                frame.data.push_str(value);
            }
            _ => {}
        }
    }
    frame
}
