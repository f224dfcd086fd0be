//! Reversible substitution of delimiter-like characters in library paths.
//!
//! The window host treats spaces and punctuation as word boundaries when the
//! user clicks on text, so a path such as `Live (1999)/01 - Intro.flac` would
//! be expanded to a single fragment. Before a path is written into a window
//! body every character from [`SUBSTITUTIONS`] is swapped for a look-alike
//! glyph the host considers part of a word; [`decode`] reverses it on the way
//! back in.

/// Source character → substitute glyph.
pub const SUBSTITUTIONS: [(char, char); 19] = [
    ('(', '〔'),
    (')', '〕'),
    ('&', '⊕'),
    ('?', '¿'),
    ('\'', '´'),
    ('[', '【'),
    (']', '】'),
    (':', '᛬'),
    ('<', '〈'),
    ('>', '〉'),
    ('+', '±'),
    ('.', '。'),
    ('-', '‒'),
    (',', '、'),
    (' ', '⋯'),
    ('!', '¡'),
    ('#', '﹟'),
    ('{', '﹛'),
    ('}', '﹜'),
];

fn substitute(c: char) -> char {
    SUBSTITUTIONS
        .iter()
        .find(|(plain, _)| *plain == c)
        .map(|(_, glyph)| *glyph)
        .unwrap_or(c)
}

fn restore(c: char) -> char {
    SUBSTITUTIONS
        .iter()
        .find(|(_, glyph)| *glyph == c)
        .map(|(plain, _)| *plain)
        .unwrap_or(c)
}

/// Encode text for display in a window body.
pub fn encode(text: &str) -> String {
    text.chars().map(substitute).collect()
}

/// Reverse [`encode`]. Characters that are not substitute glyphs pass through.
pub fn decode(text: &str) -> String {
    text.chars().map(restore).collect()
}
