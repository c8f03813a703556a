/// Outcome of comparing two decimal timestamp strings character by character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixMatch {
    /// Both strings are the same; there is nothing between them to scan.
    Identical,
    /// Index of the first differing character (length of the shared prefix).
    DiffersAt(usize),
    /// The strings have a different digit count, so no prefix narrows the scan.
    LengthMismatch,
}

/// Length of the shared leading substring of two equal-length timestamp strings.
///
/// Comparison is bytewise; timestamps are ASCII digits.
pub fn shared_prefix(a: &str, b: &str) -> PrefixMatch {
    if a.len() != b.len() {
        return PrefixMatch::LengthMismatch;
    }
    match a.bytes().zip(b.bytes()).position(|(x, y)| x != y) {
        Some(i) => PrefixMatch::DiffersAt(i),
        None => PrefixMatch::Identical,
    }
}
