//! Display-name sanitizing

/// Longest accepted identity, in characters.
pub const MAX_IDENTITY_CHARS: usize = 50;

/// Clean a raw display name: strip control characters, trim whitespace,
/// cap the length. Returns `None` when nothing usable remains.
///
/// Control characters are stripped before trimming so they cannot shield
/// edge whitespace from the trim.
pub fn sanitize_identity(raw: &str) -> Option<String> {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_IDENTITY_CHARS).collect())
}
