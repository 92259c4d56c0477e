//! Recursive character text chunker.
//!
//! Splits extracted document text into overlapping chunks for embedding.
//! The splitter walks a separator hierarchy — paragraph breaks, line
//! breaks, sentence boundaries, spaces, and finally single characters —
//! preferring the coarsest separator that keeps pieces under the target
//! size, then merges pieces back together with a sliding overlap window.
//!
//! Splitting is deterministic: the same text and parameters always produce
//! the same chunk boundaries and count. Lengths are measured in characters,
//! not bytes, so multi-byte text never splits mid-codepoint.

use std::collections::VecDeque;

/// Separator hierarchy, coarsest first. The empty string means
/// character-level splitting and always matches.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Configurable text splitter. `overlap` must be smaller than
/// `chunk_size`; the config layer enforces this.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split `text` into chunks of at most roughly `chunk_size` characters
    /// with `overlap` characters carried between consecutive chunks.
    ///
    /// Whitespace-only pieces are dropped; empty input produces no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator that occurs in the text; "" always does.
        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keep_separator(text, separator);

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
            } else {
                if !good.is_empty() {
                    chunks.extend(self.merge(&good));
                    good.clear();
                }
                if remaining.is_empty() {
                    chunks.push(piece);
                } else {
                    chunks.extend(self.split_with(&piece, remaining));
                }
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, keeping a tail of roughly
    /// `overlap` characters when a chunk is flushed.
    fn merge(&self, splits: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(usize, &str)> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    chunks.push(chunk);
                }
                // Shrink the window down to the overlap budget, and further
                // if the incoming piece would still overflow.
                while total > self.overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((popped, _)) => total -= popped,
                        None => break,
                    }
                }
            }
            window.push_back((len, piece));
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `sep`, keeping the separator attached to the front of the
/// following piece so no characters are lost. An empty separator splits
/// into individual characters.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut parts = text.split(sep);
    let mut out: Vec<String> = Vec::new();
    if let Some(first) = parts.next() {
        out.push(first.to_string());
    }
    for part in parts {
        out.push(format!("{}{}", sep, part));
    }
    out.retain(|s| !s.is_empty());
    out
}

fn join_window(window: &VecDeque<(usize, &str)>) -> Option<String> {
    let joined: String = window.iter().map(|(_, s)| *s).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
