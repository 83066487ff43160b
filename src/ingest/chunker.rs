#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
}

/// Split `text` into windows of `window` characters, consecutive windows
/// sharing `overlap` characters. The final chunk may be shorter than the
/// window. For a trimmed text of L chars this yields exactly
/// ceil((L - overlap) / (window - overlap)) chunks when L > window, and a
/// single chunk otherwise. Empty or whitespace-only text yields no chunks.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> Vec<TextChunk> {
    let text = text.trim();
    if text.is_empty() || window == 0 || overlap >= window {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the text, so
    // windows counted in chars slice cleanly through multibyte content.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;
    let step = window - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(char_len);
        chunks.push(TextChunk {
            text: text[bounds[start]..bounds[end]].to_string(),
            chunk_index: chunks.len(),
        });
        if end == char_len {
            break;
        }
        start += step;
    }
    chunks
}
