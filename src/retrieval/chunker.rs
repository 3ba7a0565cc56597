use unicode_segmentation::UnicodeSegmentation;

/// Splits document text into overlapping chunks for indexing.
///
/// Windows are measured in characters. A window is cut at the last
/// paragraph break, line break, sentence end or word boundary that keeps it
/// past the overlap; text with no such boundary is cut hard. Sentence and
/// word boundaries follow Unicode text segmentation (UAX #29).
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// `overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                self.soft_end(&chars, start, hard_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            let trimmed = chunk.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end == chars.len() {
                break;
            }
            start = (end - self.overlap).max(start + 1);
        }
        chunks
    }

    fn soft_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let window: String = chars[start..hard_end].iter().collect();
        // Byte offsets into `window` just past each boundary, coarsest first
        let levels = [
            separator_ends(&window, "\n\n"),
            separator_ends(&window, "\n"),
            segment_ends(&window, window.split_sentence_bound_indices()),
            segment_ends(&window, window.split_word_bound_indices()),
        ];
        levels
            .iter()
            .find_map(|ends| {
                ends.iter()
                    .rev()
                    .map(|&byte| window[..byte].chars().count())
                    .find(|&cut| cut > self.overlap)
            })
            .map_or(hard_end, |cut| start + cut)
    }
}

fn separator_ends(window: &str, separator: &str) -> Vec<usize> {
    window
        .match_indices(separator)
        .map(|(i, sep)| i + sep.len())
        .collect()
}

/// Segment ends strictly inside the window; the last segment may be cut off.
fn segment_ends<'a>(window: &str, segments: impl Iterator<Item = (usize, &'a str)>) -> Vec<usize> {
    segments
        .map(|(i, segment)| i + segment.len())
        .filter(|&end| end < window.len())
        .collect()
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
