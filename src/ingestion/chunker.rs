//! Adaptive text chunking with structure-aware strategy selection

use pulldown_cmark::{Event, Options, Parser, Tag};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;

/// Structural profile of a text, used to pick a chunking strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct TextProfile {
    /// Markdown headings present
    pub has_headings: bool,
    /// Tables or code blocks present
    pub has_dense_blocks: bool,
    /// Average sentence length in characters
    pub avg_sentence_len: usize,
}

/// Strategy selected for a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Split by top-level headings, then paragraphs
    Hierarchical,
    /// Sentence accumulation within a size window
    Sentence,
}

/// Text chunker that inspects structure and routes to a strategy.
///
/// Dense texts (tables/code) get the tighter window with more overlap;
/// prose gets the loose window.
pub struct AdaptiveChunker {
    config: ChunkingConfig,
}

impl AdaptiveChunker {
    /// Create a chunker with the given configuration
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Profile a text for structure markers
    pub fn profile(text: &str) -> TextProfile {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        let parser = Parser::new_ext(text, options);

        let mut has_headings = false;
        let mut has_dense_blocks = false;
        for event in parser {
            match event {
                Event::Start(Tag::Heading { .. }) => has_headings = true,
                Event::Start(Tag::CodeBlock(_)) | Event::Start(Tag::Table(_)) => {
                    has_dense_blocks = true
                }
                _ => {}
            }
            if has_headings && has_dense_blocks {
                break;
            }
        }

        let sentences: Vec<&str> = text.split_sentence_bounds().collect();
        let avg_sentence_len = if sentences.is_empty() {
            0
        } else {
            sentences.iter().map(|s| s.chars().count()).sum::<usize>() / sentences.len()
        };

        TextProfile {
            has_headings,
            has_dense_blocks,
            avg_sentence_len,
        }
    }

    /// Strategy for a given profile
    pub fn strategy_for(profile: &TextProfile) -> ChunkStrategy {
        if profile.has_headings {
            ChunkStrategy::Hierarchical
        } else {
            ChunkStrategy::Sentence
        }
    }

    /// Split text into retrieval-sized chunks.
    ///
    /// Output chunks collectively reproduce the source text up to the declared
    /// overlap and whitespace normalization; no chunk exceeds the configured
    /// maximum.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let profile = Self::profile(text);
        let (target, overlap) = if profile.has_dense_blocks {
            (self.config.dense_chunk_size, self.config.dense_chunk_overlap)
        } else {
            (self.config.chunk_size, self.config.chunk_overlap)
        };

        let chunks = match Self::strategy_for(&profile) {
            ChunkStrategy::Hierarchical => self.chunk_hierarchical(text, target, overlap),
            ChunkStrategy::Sentence => self.chunk_sentences(text, target, overlap),
        };

        tracing::debug!(
            "Chunked {} chars into {} chunks ({:?}, target {})",
            text.chars().count(),
            chunks.len(),
            Self::strategy_for(&profile),
            target
        );

        chunks
    }

    /// Split by top-level headings, then paragraphs, accumulating to target
    fn chunk_hierarchical(&self, text: &str, target: usize, overlap: usize) -> Vec<String> {
        let mut chunks = Vec::new();

        for section in split_sections(text) {
            let mut current = String::new();

            for paragraph in section.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }

                // Oversized paragraphs drop down to sentence accumulation
                if paragraph.chars().count() > self.config.max_chunk_size {
                    if current.chars().count() >= self.config.min_chunk_size {
                        chunks.push(current.trim().to_string());
                    }
                    current = String::new();
                    chunks.extend(self.chunk_sentences(paragraph, target, overlap));
                    continue;
                }

                if !current.is_empty() && current.chars().count() + paragraph.chars().count() > target {
                    chunks.push(current.trim().to_string());
                    current = String::new();
                }

                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(paragraph);
            }

            if current.chars().count() >= self.config.min_chunk_size {
                chunks.push(current.trim().to_string());
            } else if !current.trim().is_empty() {
                // Undersized section tail: merge into the previous chunk
                match chunks.last_mut() {
                    Some(last) => {
                        last.push_str("\n\n");
                        last.push_str(current.trim());
                    }
                    None => chunks.push(current.trim().to_string()),
                }
            }
        }

        chunks
    }

    /// Accumulate sentences within [min, max], carrying overlap between chunks
    fn chunk_sentences(&self, text: &str, target: usize, overlap: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        // The carried overlap alone is already emitted content; only flush
        // the tail if fresh text was appended after it
        let mut fresh_content = false;

        for sentence in text.split_sentence_bounds() {
            let sentence_len = sentence.chars().count();

            // Hard-split sentences that alone exceed the maximum
            if sentence_len > self.config.max_chunk_size {
                if fresh_content && !current.trim().is_empty() {
                    chunks.push(current.trim().to_string());
                }
                for piece in split_by_chars(sentence, self.config.max_chunk_size) {
                    chunks.push(piece.trim().to_string());
                }
                current = self.overlap_text(chunks.last().unwrap(), overlap);
                fresh_content = false;
                continue;
            }

            // Break early rather than exceed the window's maximum
            if !current.is_empty()
                && current.chars().count() + sentence_len > self.config.max_chunk_size.min(target)
                && current.chars().count() >= self.config.min_chunk_size
            {
                chunks.push(current.trim().to_string());
                current = self.overlap_text(chunks.last().unwrap(), overlap);
                fresh_content = false;
            }

            current.push_str(sentence);
            fresh_content = true;
        }

        if !fresh_content || current.trim().is_empty() {
            return chunks;
        }

        if current.trim().chars().count() >= self.config.min_chunk_size || chunks.is_empty() {
            chunks.push(current.trim().to_string());
        } else if let Some(last) = chunks.last_mut() {
            last.push(' ');
            last.push_str(current.trim());
        }

        chunks
    }

    /// Overlap carried from the end of a chunk into the next one.
    ///
    /// Prefers to restart at a sentence boundary, then a word boundary.
    fn overlap_text(&self, text: &str, overlap: usize) -> String {
        if overlap == 0 {
            return String::new();
        }
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= overlap {
            return text.to_string();
        }

        let tail: String = chars[chars.len() - overlap..].iter().collect();

        if let Some(pos) = tail.find(". ") {
            return tail[pos + 2..].to_string();
        }
        if let Some(pos) = tail.find(' ') {
            return tail[pos + 1..].to_string();
        }
        tail
    }
}

/// Split markdown text into sections at top-level headings
fn split_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        let is_top_heading = trimmed.starts_with("# ") || trimmed.starts_with("## ");

        if is_top_heading && !current.trim().is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        sections.push(current);
    }

    sections
}

/// Split a string into pieces of at most `max_chars` characters
fn split_by_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}
