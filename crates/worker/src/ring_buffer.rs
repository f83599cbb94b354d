// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, time-windowed, ordered store of finalized transcript chunks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A single finalized segment of speech transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptChunk {
    pub seq: u64,
    pub at_ms: i64,
    pub speaker: Option<String>,
    pub text: String,
    pub r#final: bool,
    pub transcript_id: Option<u64>,
}

/// Aggregate stats about the buffer's current contents.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RingBufferStats {
    pub total: usize,
    pub finalized: usize,
    pub oldest_seq: Option<u64>,
    pub newest_seq: Option<u64>,
}

/// Bounded ordered sequence of finalized transcript chunks.
///
/// Only `final` chunks are ever admitted. Entries are kept strictly
/// `seq`-increasing; capacity and time-window eviction both trim from the
/// front (oldest first).
pub struct RingBuffer {
    capacity: usize,
    window_ms: i64,
    entries: VecDeque<TranscriptChunk>,
}

impl RingBuffer {
    pub fn new(capacity: usize, window_ms: i64) -> Self {
        Self { capacity: capacity.max(1), window_ms, entries: VecDeque::new() }
    }

    /// Insert a finalized chunk, enforcing capacity and window eviction.
    ///
    /// Non-final chunks are silently ignored — callers are expected to have
    /// already filtered on `chunk.final` (this is a second line of defense).
    pub fn add(&mut self, chunk: TranscriptChunk) {
        if !chunk.r#final {
            return;
        }
        self.entries.push_back(chunk);

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        if self.window_ms > 0 {
            if let Some(newest_at) = self.entries.back().map(|c| c.at_ms) {
                let cutoff = newest_at - self.window_ms;
                while self.entries.front().is_some_and(|c| c.at_ms < cutoff) {
                    self.entries.pop_front();
                }
            }
        }
    }

    /// Concatenate the newest chunks' text, oldest-first, until `max_chars`
    /// would be exceeded.
    pub fn recent_text(&self, max_chars: usize) -> String {
        let mut picked: Vec<&str> = Vec::new();
        let mut total = 0usize;
        for chunk in self.entries.iter().rev() {
            let len = chunk.text.len() + 1;
            if total + len > max_chars && !picked.is_empty() {
                break;
            }
            picked.push(chunk.text.as_str());
            total += len;
        }
        picked.reverse();
        picked.join(" ")
    }

    pub fn stats(&self) -> RingBufferStats {
        RingBufferStats {
            total: self.entries.len(),
            finalized: self.entries.len(),
            oldest_seq: self.entries.front().map(|c| c.seq),
            newest_seq: self.entries.back().map(|c| c.seq),
        }
    }

    pub fn newest_seq(&self) -> Option<u64> {
        self.entries.back().map(|c| c.seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptChunk> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "ring_buffer_tests.rs"]
mod tests;
