//! Sentence segmentation and chunk identity.
//!
//! Each sentence becomes a chunk with a stable id `{topic}{n}` (1-based, in
//! document order). Chunk ids are the provenance currency of the whole batch:
//! mentions carry them as source references and retrieval resolves them back
//! to sentence text.

use std::collections::HashMap;

use crate::utils::text::normalize_whitespace;

/// One sentence with its batch-stable chunk id.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
}

/// A segmented input document with id lookup.
#[derive(Debug, Clone, Default)]
pub struct SegmentedText {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
}

impl SegmentedText {
    /// Split `text` into sentences and assign `{topic}1`, `{topic}2`, … ids.
    pub fn segment(topic: &str, text: &str) -> Self {
        let mut chunks = Vec::new();
        let mut by_id = HashMap::new();
        for (n, sentence) in split_sentences(text).into_iter().enumerate() {
            let id = format!("{topic}{}", n + 1);
            by_id.insert(id.clone(), chunks.len());
            chunks.push(Chunk { id, text: sentence });
        }
        Self { chunks, by_id }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Sentence text for a chunk id, if the id belongs to this batch.
    pub fn text_of(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(|&i| self.chunks[i].text.as_str())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Split on sentence-ending punctuation, keeping the terminator with the
/// sentence. ASCII terminators only end a sentence at a whitespace boundary,
/// which leaves decimals ("3.5") and single-letter initials ("J. Smith")
/// intact; CJK terminators always end one.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    // Internal newlines and runs of spaces collapse to single spaces.
    let push = |from: usize, to: usize, sentences: &mut Vec<String>| {
        let s = normalize_whitespace(&chars[from..to].iter().collect::<String>());
        if !s.is_empty() {
            sentences.push(s);
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let cjk_end = matches!(c, '。' | '！' | '？');
        let ascii_end = matches!(c, '.' | '!' | '?');
        if !cjk_end && !ascii_end {
            i += 1;
            continue;
        }

        // Absorb a run of terminators ("?!", "。。。").
        let mut j = i;
        while j + 1 < chars.len() && matches!(chars[j + 1], '.' | '!' | '?' | '。' | '！' | '？') {
            j += 1;
        }

        let boundary = if cjk_end {
            true
        } else {
            let at_ws = j + 1 >= chars.len() || chars[j + 1].is_whitespace();
            let initial = c == '.'
                && i >= 1
                && chars[i - 1].is_alphabetic()
                && (i == 1 || !chars[i - 2].is_alphabetic());
            at_ws && !initial
        };

        if boundary {
            push(start, j + 1, &mut sentences);
            start = j + 1;
        }
        i = j + 1;
    }

    if start < chars.len() {
        push(start, chars.len(), &mut sentences);
    }
    sentences
}
