
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_FRAGMENT_SIZE: usize = 1000;

/// A run of whole sentences from one document, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// The fragment text, sentences joined by single spaces
    pub text: String,
    /// Position of this fragment within its document
    pub ordinal: usize,
    /// Identifier (file name) of the owning document
    pub document: String,
}

/// Configuration for fragment splitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Soft upper bound on fragment length, in characters
    pub fragment_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }
}

/// Lazily packs consecutive sentences into fragments of at most
/// `fragment_size` characters.
///
/// A sentence is never split. One that is longer than the limit on its own
/// becomes an oversized fragment.
pub struct FragmentSplitter<'a> {
    sentences: Box<dyn Iterator<Item = &'a str> + 'a>,
    document: &'a str,
    max_chars: usize,
    current: String,
    current_len: usize,
    next_ordinal: usize,
}

impl<'a> FragmentSplitter<'a> {
    #[inline]
    pub fn new(text: &'a str, document: &'a str, config: &ChunkingConfig) -> Self {
        Self {
            sentences: Box::new(split_sentences(text)),
            document,
            max_chars: config.fragment_size,
            current: String::new(),
            current_len: 0,
            next_ordinal: 0,
        }
    }

    fn take_current(&mut self) -> Option<Fragment> {
        let text = self.current.trim_end();
        if text.is_empty() {
            return None;
        }

        let fragment = Fragment {
            text: text.to_string(),
            ordinal: self.next_ordinal,
            document: self.document.to_string(),
        };
        self.next_ordinal += 1;
        self.current.clear();
        self.current_len = 0;
        Some(fragment)
    }

    fn push_sentence(&mut self, sentence: &str, sentence_len: usize) {
        self.current.push_str(sentence);
        self.current.push(' ');
        self.current_len += sentence_len + 1;
    }
}

impl Iterator for FragmentSplitter<'_> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        while let Some(sentence) = self.sentences.next() {
            let sentence_len = sentence.chars().count();
            if self.current_len + sentence_len <= self.max_chars {
                self.push_sentence(sentence, sentence_len);
                continue;
            }

            let flushed = self.take_current();
            self.push_sentence(sentence, sentence_len);
            if flushed.is_some() {
                return flushed;
            }
        }

        self.take_current()
    }
}

/// Split `text` into fragments, collecting eagerly
#[inline]
pub fn split_into_fragments(text: &str, document: &str, config: &ChunkingConfig) -> Vec<Fragment> {
    FragmentSplitter::new(text, document, config).collect()
}

/// Split text into trimmed sentences using Unicode sentence boundaries
#[inline]
pub fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
}
