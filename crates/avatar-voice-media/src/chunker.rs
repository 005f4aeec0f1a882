//! Sentence chunking for streamed text.
//!
//! Text often arrives in small deltas (an LLM token stream, a socket). The
//! pipeline works best with one utterance per sentence: long enough for
//! natural prosody, short enough that playback starts early.

/// Accumulates text deltas and yields complete sentences.
///
/// A sentence ends at a newline, or at a run of terminators (`.` `!` `?` `…`,
/// plus trailing closing quotes/brackets) followed by whitespace. A terminator
/// at the very end of the buffer is held back until the next delta shows
/// whether it ends the sentence (`3.` may still become `3.5`).
#[derive(Debug, Default)]
pub struct SentenceChunker {
    buffer: String,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta and return any sentences it completed.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut sentences = Vec::new();
        while let Some(end) = find_boundary(&self.buffer) {
            let sentence: String = self.buffer.drain(..end).collect();
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
        }
        sentences
    }

    /// Flush whatever is left as a final sentence.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '»')
}

fn find_boundary(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\n' {
            return Some(i + c.len_utf8());
        }
        if !is_terminator(c) {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminator(next) || is_closer(next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        match chars.peek() {
            Some(&(_, next)) if next.is_whitespace() => return Some(end),
            Some(_) => {}
            None => return None,
        }
    }
    None
}
