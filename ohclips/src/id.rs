use nanoid::nanoid;

/// Identifier alphabet without ambiguous glyphs (no `I`, `O`, `l`, `0`, `1`).
const DOCUMENT_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const CLIP_ID_LENGTH: usize = 20;
const COMMENT_ID_LENGTH: usize = 16;

/// Opaque id for a newly ingested clip.
pub fn new_clip_id() -> String {
    nanoid!(CLIP_ID_LENGTH, DOCUMENT_ID_ALPHABET)
}

/// Opaque id for a comment; only unique within its parent clip.
pub fn new_comment_id() -> String {
    nanoid!(COMMENT_ID_LENGTH, DOCUMENT_ID_ALPHABET)
}
