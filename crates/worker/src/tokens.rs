// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic token counting for prompt-budget arithmetic.
//!
//! Every component that partitions a token budget (ContextBuilder,
//! FactsBudgeter) goes through a single counter so the numbers they reason
//! about agree with each other.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// A per-string-chars heuristic used only when the real encoder fails to
/// initialize. `cl100k_base` averages roughly 4 characters per token across
/// English prose; this keeps budgeting conservative (it over-counts) rather
/// than silently under-budgeting.
fn heuristic_count(text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
}

fn bpe() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().ok()).as_ref()
}

/// Count tokens in `text` using the `cl100k_base` encoding.
///
/// Falls back to a character-based heuristic if the encoder's vocabulary
/// file can't be loaded (e.g. no network access in a sandboxed build), so
/// budgeting degrades gracefully instead of panicking.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    match bpe() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => heuristic_count(text),
    }
}

/// Per-message overhead tiktoken guidance attributes to chat-formatted
/// messages (role + delimiter tokens), applied on top of `count_tokens` of
/// the message body.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn longer_text_counts_more_tokens() {
        let short = count_tokens("hello");
        let long = count_tokens("hello there, this is a much longer sentence than the first one");
        assert!(long > short);
    }

    #[test]
    fn heuristic_matches_rough_ratio() {
        let text = "a".repeat(40);
        assert_eq!(heuristic_count(&text), 10);
    }
}
