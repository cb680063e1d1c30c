//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`ParagraphChunker`], which
//! packs blank-line separated paragraphs into chunks of at most `chunk_size`
//! characters. Oversized paragraphs fall back to sentence boundaries, and
//! oversized sentences to word boundaries. Each new chunk is seeded with the
//! tail of the previous one (the overlap window).
//!
//! Sizes are counted in characters, not tokens.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::RagConfig;
use crate::document::Chunk;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("blank line pattern is valid"));

/// A strategy for splitting document text into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the indexer.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks owned by `document_id`.
    ///
    /// Returns an empty `Vec` if the text is empty or whitespace only.
    /// Each returned chunk has an empty embedding vector and carries a copy of
    /// `metadata` plus a `chunk_index` entry.
    fn chunk(&self, document_id: &str, text: &str, metadata: &HashMap<String, String>)
    -> Vec<Chunk>;
}

/// Splits text on paragraphs, then sentences, then words, with overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`.
///
/// `chunk_overlap >= chunk_size` is not rejected here: the overlap window
/// will then consume most of each chunk's budget. Use
/// [`RagConfig::validate`] to guard against it.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::{Chunker, ParagraphChunker};
///
/// let chunker = ParagraphChunker::new(512, 100);
/// let chunks = chunker.chunk("doc1", &text, &HashMap::new());
/// ```
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: character budget per chunk
    /// * `chunk_overlap`: number of trailing characters carried into the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Create a chunker using the sizes from a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split text into raw chunk strings in emission order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut builder = ChunkBuilder::new(self.chunk_size, self.chunk_overlap);

        for paragraph in split_paragraphs(text) {
            if char_len(paragraph) <= self.chunk_size {
                builder.push(paragraph, PARAGRAPH_SEPARATOR);
                continue;
            }

            let mut separator = PARAGRAPH_SEPARATOR;
            for sentence in split_sentences(paragraph) {
                if char_len(sentence) <= self.chunk_size {
                    builder.push(sentence, separator);
                } else {
                    for piece in split_words(sentence, self.chunk_size) {
                        builder.push(&piece, separator);
                        separator = SENTENCE_SEPARATOR;
                    }
                }
                separator = SENTENCE_SEPARATOR;
            }
        }

        builder.finish()
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let mut metadata = metadata.clone();
                metadata.insert("chunk_index".to_string(), index.to_string());
                Chunk {
                    id: Chunk::make_id(document_id, index),
                    document_id: document_id.to_string(),
                    index,
                    text,
                    embedding: Vec::new(),
                    metadata,
                }
            })
            .collect()
    }
}

/// Accumulates text units into chunks and seeds each new chunk with the
/// overlap window of the previous one.
struct ChunkBuilder {
    chunk_size: usize,
    chunk_overlap: usize,
    current: String,
    current_len: usize,
    // false while `current` holds only the overlap seed
    has_content: bool,
    chunks: Vec<String>,
}

impl ChunkBuilder {
    fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            current: String::new(),
            current_len: 0,
            has_content: false,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, unit: &str, separator: &str) {
        let unit_len = char_len(unit);
        let separator_len = char_len(separator);

        if self.has_content && self.current_len + separator_len + unit_len > self.chunk_size {
            self.close();
        }

        if !self.current.is_empty() {
            self.current.push_str(separator);
            self.current_len += separator_len;
        }
        self.current.push_str(unit);
        self.current_len += unit_len;
        self.has_content = true;
    }

    fn close(&mut self) {
        let seed = overlap_window(&self.current, self.chunk_overlap).to_string();
        let finished = std::mem::replace(&mut self.current, seed);
        self.chunks.push(finished);
        self.current_len = char_len(&self.current);
        self.has_content = false;
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_content {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

/// Return the trailing `overlap` characters of `text`, advanced to the next
/// word boundary when the cut lands inside a word, and trimmed.
pub fn overlap_window(text: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }
    let total = char_len(text);
    if overlap >= total {
        return text.trim();
    }

    let start = text.char_indices().nth(total - overlap).map_or(text.len(), |(i, _)| i);
    let tail = &text[start..];
    let cut_mid_word =
        !text[..start].ends_with(char::is_whitespace) && !tail.starts_with(char::is_whitespace);

    let tail = if cut_mid_word {
        match tail.find(char::is_whitespace) {
            Some(pos) => &tail[pos..],
            None => "",
        }
    } else {
        tail
    };
    tail.trim()
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    BLANK_LINE.split(text).map(str::trim).filter(|p| !p.is_empty())
}

/// Split at terminal punctuation (`.`, `!`, `?`) followed by whitespace,
/// keeping the punctuation with the preceding sentence.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if followed_by_space {
            let end = i + c.len_utf8();
            let sentence = paragraph[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Greedily pack whitespace-separated words into pieces of at most
/// `chunk_size` characters. Words longer than the budget are cut on
/// character boundaries.
fn split_words(sentence: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in sentence.split_whitespace() {
        let word_len = char_len(word);
        if word_len > chunk_size {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(chunk_size.max(1)).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if !current.is_empty() && current_len + 1 + word_len > chunk_size {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn empty_and_whitespace_input_yield_no_chunks() {
        let chunker = ParagraphChunker::new(100, 10);
        assert!(chunker.chunk("d", "", &HashMap::new()).is_empty());
        assert!(chunker.chunk("d", "  \n\n \t\n", &HashMap::new()).is_empty());
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunker = ParagraphChunker::new(100, 20);
        let chunks = chunker.chunk("doc", "First paragraph.\n\nSecond one.", &HashMap::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "First paragraph.\n\nSecond one.");
        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn paragraphs_close_chunks_at_budget() {
        let chunker = ParagraphChunker::new(25, 0);
        let metadata = HashMap::from([("lang".to_string(), "en".to_string())]);
        let chunks =
            chunker.chunk("doc1", "Cats are mammals.\n\nDogs are mammals too.", &metadata);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Cats are mammals.");
        assert_eq!(chunks[1].text, "Dogs are mammals too.");
        assert_eq!(chunks[1].id, "doc1_1");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].document_id, "doc1");
        assert_eq!(chunks[1].metadata.get("chunk_index").map(String::as_str), Some("1"));
        assert_eq!(chunks[1].metadata.get("lang").map(String::as_str), Some("en"));
        assert!(chunks.iter().all(|c| c.embedding.is_empty()));
    }

    #[test]
    fn long_paragraph_splits_on_sentences() {
        let chunker = ParagraphChunker::new(30, 0);
        let text = "One short sentence. Another short one! Is this the third? Yes.";
        let chunks = chunker.split_text(text);

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0], "One short sentence.");
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
        assert_eq!(words(&chunks.join(" ")), words(text));
    }

    #[test]
    fn newline_terminated_sentences_are_boundaries() {
        assert_eq!(split_sentences("Line one.\nLine two!\nDone"), vec![
            "Line one.",
            "Line two!",
            "Done"
        ]);
        assert_eq!(split_sentences("Version 1.5 is out."), vec!["Version 1.5 is out."]);
    }

    #[test]
    fn oversized_sentence_falls_back_to_words() {
        let chunker = ParagraphChunker::new(12, 0);
        let chunks = chunker.split_text("alpha beta gamma delta epsilon");
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
    }

    #[test]
    fn oversized_word_is_cut_on_char_boundaries() {
        let chunker = ParagraphChunker::new(4, 0);
        let chunks = chunker.split_text("ééééééééé");
        assert_eq!(chunks, vec!["éééé", "éééé", "é"]);
    }

    #[test]
    fn overlap_window_respects_word_boundaries() {
        assert_eq!(overlap_window("hello brave world", 8), "world");
        assert_eq!(overlap_window("hello brave world", 6), "world");
        assert_eq!(overlap_window("hello brave world", 11), "brave world");
        assert_eq!(overlap_window("hello brave world", 0), "");
        assert_eq!(overlap_window("hello", 50), "hello");
        assert_eq!(overlap_window("unbroken", 3), "");
    }

    #[test]
    fn next_chunk_is_seeded_with_overlap() {
        let chunker = ParagraphChunker::new(40, 15);
        let text = "The quick brown fox jumps over it.\n\n\
                    A lazy dog sleeps in the warm sun.\n\n\
                    Birds sing loudly in the tall trees.";
        let chunks = chunker.split_text(text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "The quick brown fox jumps over it.");
        assert!(chunks[1].starts_with("jumps over it.\n\nA lazy dog"));
        assert!(chunks[2].starts_with("the warm sun.\n\nBirds"));
    }

    fn arb_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(proptest::collection::vec("[a-z]{1,8}", 1..15), 1..8).prop_map(
            |paragraphs| {
                paragraphs
                    .into_iter()
                    .map(|words| format!("{}.", words.join(" ")))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_without_overlap_cover_text_in_order(
            text in arb_text(),
            chunk_size in 20usize..120,
        ) {
            let chunks = ParagraphChunker::new(chunk_size, 0).split_text(&text);
            let joined = chunks.join(" ");
            prop_assert_eq!(words(&joined), words(&text));
            for chunk in &chunks {
                prop_assert!(!chunk.trim().is_empty());
                prop_assert!(chunk.chars().count() <= chunk_size);
            }
        }

        #[test]
        fn chunks_with_overlap_cover_text_once_seeds_are_removed(
            text in arb_text(),
            chunk_size in 30usize..120,
            overlap_pct in 1usize..50,
        ) {
            let overlap = chunk_size * overlap_pct / 100;
            let chunks = ParagraphChunker::new(chunk_size, overlap).split_text(&text);
            let mut fresh = Vec::with_capacity(chunks.len());
            for (i, chunk) in chunks.iter().enumerate() {
                let seed = if i == 0 { "" } else { overlap_window(&chunks[i - 1], overlap) };
                let rest = chunk.strip_prefix(seed);
                prop_assert!(rest.is_some(), "chunk {:?} lost its seed {:?}", chunk, seed);
                fresh.extend(words(rest.unwrap_or_default()));
            }
            prop_assert_eq!(fresh, words(&text));
        }

        #[test]
        fn input_within_budget_is_one_chunk(text in arb_text()) {
            let size = text.chars().count();
            let chunks = ParagraphChunker::new(size, 0).split_text(&text);
            prop_assert_eq!(chunks.len(), 1);
        }

        #[test]
        fn consecutive_chunks_share_overlap(
            text in arb_text(),
            chunk_size in 30usize..120,
            overlap_pct in 1usize..50,
        ) {
            let overlap = chunk_size * overlap_pct / 100;
            let chunks = ParagraphChunker::new(chunk_size, overlap).split_text(&text);
            for pair in chunks.windows(2) {
                let window = overlap_window(&pair[0], overlap);
                prop_assert!(
                    pair[1].starts_with(window),
                    "chunk {:?} does not start with overlap {:?}",
                    pair[1],
                    window,
                );
            }
        }
    }
}
