/// Split text into chunks of at most `size` characters.
///
/// Sizes count Unicode scalar values, so multi-byte characters are never cut.
/// Always returns at least one chunk; an empty input yields one empty chunk.
pub fn split_into_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while let Some((cut, _)) = rest.char_indices().nth(size) {
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);

    chunks
}
