// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure transcript preprocessing applied before Facts prompt assembly.
//!
//! Deterministic and idempotent: running the filter twice on its own output
//! produces the same output.

const FILLER_WORDS: &[&str] = &["um", "uh", "umm", "uhh", "like,", "you know,"];

/// Strip filler tokens, collapse whitespace, drop a leading `Speaker:` tag,
/// and truncate to the most recent `max_chars` characters.
pub fn clean_transcript(text: &str, max_chars: usize) -> String {
    let without_speaker = strip_speaker_tag(text);
    let collapsed = collapse_whitespace(&without_speaker);
    let defillered = strip_fillers(&collapsed);
    truncate_tail(&defillered, max_chars)
}

fn strip_speaker_tag(text: &str) -> String {
    match text.split_once(':') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.len() < 32 && !prefix.contains(' ') => {
            rest.trim_start().to_string()
        }
        _ => text.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_fillers(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !FILLER_WORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_tail(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let start = text.len() - max_chars;
    // Avoid splitting mid-character: walk forward to the next char boundary.
    let mut boundary = start;
    while boundary < text.len() && !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    text[boundary..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_filler_words() {
        assert_eq!(clean_transcript("um so like, it works", 1000), "so it works");
    }

    #[test]
    fn strips_speaker_tag() {
        assert_eq!(clean_transcript("Alice: hello there", 1000), "hello there");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(clean_transcript("hello   there\n\nworld", 1000), "hello there world");
    }

    #[test]
    fn truncates_to_most_recent_chars() {
        let text = "a".repeat(50) + "TAIL";
        let cleaned = clean_transcript(&text, 4);
        assert_eq!(cleaned, "TAIL");
    }

    #[test]
    fn is_idempotent() {
        let text = "Bob: um, this is   fine";
        let once = clean_transcript(text, 1000);
        let twice = clean_transcript(&once, 1000);
        assert_eq!(once, twice);
    }
}
