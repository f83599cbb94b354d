use super::*;

fn chunk(seq: u64, at_ms: i64, text: &str, r#final: bool) -> TranscriptChunk {
    TranscriptChunk { seq, at_ms, speaker: None, text: text.to_string(), r#final, transcript_id: None }
}

#[test]
fn ignores_non_final_chunks() {
    let mut buf = RingBuffer::new(10, 0);
    buf.add(chunk(1, 0, "draft", false));
    assert!(buf.is_empty());
}

#[test]
fn evicts_oldest_beyond_capacity() {
    let mut buf = RingBuffer::new(2, 0);
    buf.add(chunk(1, 0, "a", true));
    buf.add(chunk(2, 1, "b", true));
    buf.add(chunk(3, 2, "c", true));
    assert_eq!(buf.stats().oldest_seq, Some(2));
    assert_eq!(buf.len(), 2);
}

#[test]
fn evicts_outside_time_window() {
    let mut buf = RingBuffer::new(100, 1000);
    buf.add(chunk(1, 0, "a", true));
    buf.add(chunk(2, 2000, "b", true));
    assert_eq!(buf.len(), 1);
    assert_eq!(buf.stats().oldest_seq, Some(2));
}

#[test]
fn recent_text_preserves_order() {
    let mut buf = RingBuffer::new(10, 0);
    buf.add(chunk(1, 0, "alpha", true));
    buf.add(chunk(2, 1, "beta", true));
    buf.add(chunk(3, 2, "gamma", true));
    assert_eq!(buf.recent_text(1000), "alpha beta gamma");
}

#[test]
fn recent_text_respects_char_cap_from_the_tail() {
    let mut buf = RingBuffer::new(10, 0);
    buf.add(chunk(1, 0, "alpha", true));
    buf.add(chunk(2, 1, "beta", true));
    let text = buf.recent_text(5);
    assert_eq!(text, "beta");
}

#[test]
fn seq_strictly_increases_after_any_insert_sequence() {
    let mut buf = RingBuffer::new(5, 0);
    for i in 0..20u64 {
        buf.add(chunk(i, i as i64, "x", true));
        let seqs: Vec<u64> = buf.iter().map(|c| c.seq).collect();
        for pair in seqs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
