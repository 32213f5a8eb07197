//! Deterministic splitting of proposal text into embeddable chunks.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    max_chars: usize,
    /// Characters repeated between consecutive hard splits of one paragraph.
    overlap_chars: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_chars: 1500,
            overlap_chars: 200,
        }
    }
}

impl ChunkPolicy {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars - 1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Packs blank-line separated paragraphs greedily into chunks of at most
    /// `max_chars` characters. Paragraphs longer than that are cut into
    /// overlapping windows. Blank input yields no chunks.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let normalized = text.replace("\r\n", "\n");
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for paragraph in normalized
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let len = paragraph.chars().count();

            if len > self.max_chars {
                flush(&mut chunks, &mut current, &mut current_len);
                chunks.extend(self.hard_split(paragraph));
                continue;
            }

            let separator = if current.is_empty() { 0 } else { 2 };
            if current_len + separator + len > self.max_chars {
                flush(&mut chunks, &mut current, &mut current_len);
            }
            if !current.is_empty() {
                current.push_str("\n\n");
                current_len += 2;
            }
            current.push_str(paragraph);
            current_len += len;
        }

        flush(&mut chunks, &mut current, &mut current_len);
        chunks
    }

    fn hard_split(&self, paragraph: &str) -> Vec<String> {
        let chars: Vec<char> = paragraph.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.max_chars).min(chars.len());
            pieces.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start = end - self.overlap_chars;
        }
        pieces
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
    *current_len = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let policy = ChunkPolicy::default();
        assert_eq!(
            policy.chunk_text("Fund a new ramp\n\nFor the park."),
            vec!["Fund a new ramp\n\nFor the park.".to_string()]
        );
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        let policy = ChunkPolicy::default();
        assert!(policy.chunk_text("   \n\n \t ").is_empty());
    }

    #[test]
    fn test_paragraphs_are_packed_within_limit() {
        let policy = ChunkPolicy::new(12, 2);
        let chunks = policy.chunk_text("aaaa\n\nbbbb\n\ncccc\n\ndddd");
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc\n\ndddd"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
    }

    #[test]
    fn test_long_paragraph_is_split_with_overlap() {
        let policy = ChunkPolicy::new(4, 1);
        let chunks = policy.chunk_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let policy = ChunkPolicy::new(3, 0);
        let chunks = policy.chunk_text("ñandú🛹");
        assert_eq!(chunks, vec!["ñan", "dú🛹"]);
    }

    #[test]
    fn test_deterministic() {
        let policy = ChunkPolicy::new(50, 10);
        let text = "Skate park proposal. ".repeat(20);
        assert_eq!(policy.chunk_text(&text), policy.chunk_text(&text));
    }

    #[test]
    fn test_overlap_is_clamped() {
        let policy = ChunkPolicy::new(3, 10);
        assert_eq!(policy.overlap_chars(), 2);
        assert_eq!(policy.chunk_text("abcdef"), vec!["abc", "bcd", "cde", "def"]);

        let degenerate = ChunkPolicy::new(0, 5);
        assert_eq!(degenerate.max_chars(), 1);
        assert_eq!(degenerate.overlap_chars(), 0);
        assert_eq!(degenerate.chunk_text("abc"), vec!["a", "b", "c"]);
    }
}
