use crate::chunk::{generate_id, Chunk, ChunkMetadata, Chunker};
use crate::{Error, Result};

/// Break granularities a segment may end on, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// Blank line between paragraphs
    Paragraph,
    /// Single line break
    Line,
    /// Whitespace after `.`, `!` or `?`
    Sentence,
    /// Any whitespace following a word
    Word,
    /// Any position not preceded by whitespace
    Character,
}

impl Separator {
    /// Paragraph, line, sentence, word, then raw characters.
    pub const DEFAULT_HIERARCHY: [Separator; 5] = [
        Separator::Paragraph,
        Separator::Line,
        Separator::Sentence,
        Separator::Word,
        Separator::Character,
    ];

    /// Whether a segment may end right before `chars[pos]`.
    ///
    /// `pos` must be in `1..chars.len()`.
    fn breaks_at(self, chars: &[char], pos: usize) -> bool {
        let prev = chars[pos - 1];
        let here = chars[pos];
        match self {
            Separator::Paragraph => {
                here == '\n' && chars.get(pos + 1) == Some(&'\n') && !prev.is_whitespace()
            }
            Separator::Line => here == '\n' && !prev.is_whitespace(),
            Separator::Sentence => here.is_whitespace() && matches!(prev, '.' | '!' | '?'),
            Separator::Word => here.is_whitespace() && !prev.is_whitespace(),
            Separator::Character => !prev.is_whitespace(),
        }
    }
}

/// A raw segment produced by [`RecursiveChunker::split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Character offset of the segment in the input text
    pub offset: usize,
    /// Segment text, trimmed of surrounding whitespace
    pub text: String,
}

impl Segment {
    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Returns `true` if the segment holds no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Character offset one past the last character.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.len()
    }
}

/// Recursive chunker - splits on the coarsest boundary that fits
///
/// Each segment is at most `max_size` characters and ends on the latest
/// paragraph break that fits, else the latest line break, sentence end, word
/// end, and finally an arbitrary character. Consecutive segments share up to
/// `overlap` characters, starting on a word boundary when one is available.
///
/// If the hierarchy is configured without [`Separator::Character`], a token
/// longer than `max_size` is emitted whole as an oversized segment.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    max_size: usize,
    overlap: usize,
    separators: Vec<Separator>,
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_SIZE, Self::DEFAULT_OVERLAP)
    }
}

impl RecursiveChunker {
    pub const DEFAULT_MAX_SIZE: usize = 800;
    pub const DEFAULT_OVERLAP: usize = 150;

    /// Create a chunker with the default separator hierarchy.
    ///
    /// # Panics
    /// Panics unless `overlap < max_size`.
    #[must_use]
    pub fn new(max_size: usize, overlap: usize) -> Self {
        assert!(
            overlap < max_size,
            "overlap ({overlap}) must be smaller than max_size ({max_size})"
        );
        Self {
            max_size,
            overlap,
            separators: Separator::DEFAULT_HIERARCHY.to_vec(),
        }
    }

    /// Fallible variant of [`new`](Self::new) for user-supplied settings.
    pub fn try_new(max_size: usize, overlap: usize) -> Result<Self> {
        if overlap >= max_size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({max_size})"
            )));
        }
        Ok(Self::new(max_size, overlap))
    }

    /// Replace the separator hierarchy. Order is coarsest first.
    #[must_use]
    pub fn with_separators(mut self, separators: Vec<Separator>) -> Self {
        self.separators = separators;
        self
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into overlapping segments in document order.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Segment> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();

        let mut segments = Vec::new();
        let mut start = skip_whitespace(&chars, 0);
        while start < n {
            let end = self.segment_end(&chars, start);

            let (lo, hi) = trim_span(&chars, start, end);
            if lo < hi {
                segments.push(Segment {
                    offset: lo,
                    text: chars[lo..hi].iter().collect(),
                });
            }

            if end >= n {
                break;
            }
            start = self.next_start(&chars, start, end);
        }
        segments
    }

    /// Exclusive end of the segment starting at `start`.
    fn segment_end(&self, chars: &[char], start: usize) -> usize {
        let n = chars.len();
        if n - start <= self.max_size {
            return n;
        }

        // `limit < n`, and ending past `floor` keeps the next start moving forward
        let limit = start + self.max_size;
        let floor = start + self.overlap + 1;
        for separator in &self.separators {
            if let Some(pos) = (floor..=limit)
                .rev()
                .find(|&pos| separator.breaks_at(chars, pos))
            {
                return pos;
            }
        }

        if self.separators.contains(&Separator::Character) {
            return limit;
        }

        // unsplittable token: run to the next break of the finest granularity
        match self.separators.last() {
            Some(finest) => (limit + 1..n)
                .find(|&pos| finest.breaks_at(chars, pos))
                .unwrap_or(n),
            None => n,
        }
    }

    /// Start of the segment following `[start, end)`.
    fn next_start(&self, chars: &[char], start: usize, end: usize) -> usize {
        if self.overlap > 0 {
            let lo = end.saturating_sub(self.overlap).max(start + 1);
            if let Some(pos) = (lo..end).find(|&pos| is_word_start(chars, pos)) {
                return pos;
            }
            if self.separators.contains(&Separator::Character) {
                if let Some(pos) = (lo..end).find(|&pos| !chars[pos].is_whitespace()) {
                    return pos;
                }
            }
        }
        skip_whitespace(chars, end)
    }
}

impl Chunker for RecursiveChunker {
    fn name(&self) -> &str {
        "recursive"
    }

    fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk> {
        self.split(content)
            .into_iter()
            .enumerate()
            .map(|(ordinal, segment)| {
                let mut m = metadata.clone();
                m.ordinal = ordinal;
                m.offset = segment.offset;

                Chunk {
                    id: generate_id(&segment.text),
                    content: segment.text,
                    metadata: m,
                }
            })
            .collect()
    }
}

fn is_word_start(chars: &[char], pos: usize) -> bool {
    pos > 0 && !chars[pos].is_whitespace() && chars[pos - 1].is_whitespace()
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

fn trim_span(chars: &[char], mut lo: usize, mut hi: usize) -> (usize, usize) {
    while lo < hi && chars[lo].is_whitespace() {
        lo += 1;
    }
    while hi > lo && chars[hi - 1].is_whitespace() {
        hi -= 1;
    }
    (lo, hi)
}
