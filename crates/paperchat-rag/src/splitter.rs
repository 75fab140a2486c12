/// Default chunk target size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Each window is cut back to the latest paragraph break, sentence end, or
/// word boundary in its second half, so chunks end on natural seams where
/// the text offers one. Consecutive chunks share roughly `overlap`
/// characters of context.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0, "chunk_size must be positive");
    assert!(overlap < chunk_size, "overlap must be smaller than chunk_size");

    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            break_point(&chars, start, hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Find the best boundary in `(mid, hard_end]`, preferring paragraph breaks,
/// then sentence ends, then whitespace. Falls back to the hard cut.
fn break_point(chars: &[char], start: usize, hard_end: usize) -> usize {
    let mid = start + (hard_end - start) / 2;

    let mut sentence = None;
    let mut word = None;

    for i in (mid..hard_end).rev() {
        let c = chars[i];
        if c == '\n' && i > 0 && chars[i - 1] == '\n' {
            return i + 1;
        }
        if sentence.is_none()
            && matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).is_none_or(|next| next.is_whitespace())
        {
            sentence = Some(i + 1);
        }
        if word.is_none() && c.is_whitespace() {
            word = Some(i + 1);
        }
    }

    sentence.or(word).unwrap_or(hard_end)
}
