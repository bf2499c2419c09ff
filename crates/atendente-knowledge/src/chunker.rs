// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentence-aware text chunking with word overlap.
//!
//! Sizes are measured in characters. Sentences are packed into a chunk until
//! the next one would exceed the target size; the next chunk then starts with
//! the trailing words of the previous one, up to `overlap` characters. A
//! sentence longer than the target is split on words, and a single word longer
//! than the target is cut.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    pub token_count: usize,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits after `.`, `!` or `?` followed by whitespace, and at line breaks.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_trimmed(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_boundary {
            push_trimmed(&mut sentences, &mut current);
        }
    }
    push_trimmed(&mut sentences, &mut current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, current: &mut String) {
    let trimmed = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
    current.clear();
}

/// Breaks a piece longer than `limit` on word boundaries, cutting oversized words.
fn split_long(piece: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for word in piece.split_whitespace() {
        let word_len = char_len(word);
        if word_len > limit {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for slice in chars.chunks(limit) {
                parts.push(slice.iter().collect());
            }
            continue;
        }
        let needed = if current.is_empty() {
            word_len
        } else {
            char_len(&current) + 1 + word_len
        };
        if needed > limit {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Trailing words of `text` whose joined length fits in `overlap` characters.
fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let mut taken: Vec<&str> = Vec::new();
    let mut length = 0;
    for word in text.split_whitespace().rev() {
        let extra = if taken.is_empty() {
            char_len(word)
        } else {
            char_len(word) + 1
        };
        if length + extra > overlap {
            break;
        }
        length += extra;
        taken.push(word);
    }
    taken.reverse();
    taken.join(" ")
}

/// Splits `text` into chunks of at most `chunk_size` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    let limit = chunk_size.max(1);
    let overlap = overlap.min(limit.saturating_sub(1));

    let pieces: Vec<String> = split_sentences(text)
        .into_iter()
        .flat_map(|sentence| {
            if char_len(&sentence) > limit {
                split_long(&sentence, limit)
            } else {
                vec![sentence]
            }
        })
        .collect();

    let mut contents: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let piece_len = char_len(&piece);
        let joined_len = if current.is_empty() {
            piece_len
        } else {
            char_len(&current) + 1 + piece_len
        };

        if joined_len > limit && !current.is_empty() {
            contents.push(current.clone());
            current = overlap_tail(&current, overlap);
            if !current.is_empty() && char_len(&current) + 1 + piece_len > limit {
                current.clear();
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        contents.push(current);
    }

    contents
        .into_iter()
        .enumerate()
        .map(|(index, content)| TextChunk {
            index,
            token_count: estimate_tokens(&content),
            content,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("ção!"), 1);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let sentences =
            split_sentences("Abrimos às 8h. Fechamos às 18h! Aceita pix? Sim\nR$ 3.50 cada");
        assert_eq!(
            sentences,
            vec![
                "Abrimos às 8h.",
                "Fechamos às 18h!",
                "Aceita pix?",
                "Sim",
                "R$ 3.50 cada",
            ]
        );
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("Uma frase. Outra frase.", 100, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Uma frase. Outra frase.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = "Primeira frase aqui. Segunda frase aqui. Terceira frase aqui.";
        let chunks = chunk_text(text, 45, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Primeira frase aqui. Segunda frase aqui.");
        assert_eq!(chunks[1].content, "Terceira frase aqui.");
    }

    #[test]
    fn next_chunk_carries_overlap_words() {
        let text = "Primeira frase aqui. Segunda frase aqui. Terceira frase aqui.";
        let chunks = chunk_text(text, 45, 12);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "frase aqui. Terceira frase aqui.");
    }

    #[test]
    fn long_sentence_is_split_on_words() {
        let text = "palavra ".repeat(30);
        let chunks = chunk_text(&text, 50, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 50);
            assert!(!chunk.content.contains("  "));
        }
    }

    #[test]
    fn oversized_word_is_cut() {
        let text = "x".repeat(25);
        let chunks = chunk_text(&text, 10, 3);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.content.len()).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("  \n\n ", 100, 10).is_empty());
    }

    proptest! {
        #[test]
        fn chunks_respect_the_size_bound(
            words in proptest::collection::vec("[a-zà-ú]{1,15}[.,!?]?", 0..120),
            size in 10usize..200,
            overlap in 0usize..60,
        ) {
            let text = words.join(" ");
            for chunk in chunk_text(&text, size, overlap) {
                prop_assert!(chunk.content.chars().count() <= size);
                prop_assert!(!chunk.content.is_empty());
            }
        }

        #[test]
        fn without_overlap_every_word_survives_in_order(
            words in proptest::collection::vec("[a-z]{1,12}", 1..80),
            size in 12usize..120,
        ) {
            let text = words.join(" ");
            let rebuilt: Vec<String> = chunk_text(&text, size, 0)
                .into_iter()
                .flat_map(|c| c.content.split(' ').map(str::to_string).collect::<Vec<_>>())
                .collect();
            prop_assert_eq!(rebuilt, words);
        }
    }
}
