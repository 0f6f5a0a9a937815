//! Pattern synthesis for user-entered block strings
//!
//! Turns whatever the user typed into a safe `regexFilter` the rule host
//! will accept: anchored, label-boundary aware, subdomain-inclusive, and
//! path-aware. Pure functions, no side effects.
//!
//! The synthesized regexes stay inside the RE2 subset (no lookaround, no
//! backreferences) because that is all the host supports.

/// Characters with meaning in the host's regex dialect.
const REGEX_META: &[u8] = b".*+?^$()[]{}|\\/";

/// Normalize a raw user-entered block string into a match key.
///
/// Lowercases, trims, strips an `http://`/`https://` scheme, drops any
/// query or fragment, and strips a trailing slash. Returns `None` when
/// nothing usable remains; such entries are skipped, never fatal.
pub fn normalize_key(raw: &str) -> Option<String> {
    let mut key = raw.trim().to_ascii_lowercase();

    if let Some(rest) = key.strip_prefix("https://") {
        key = rest.to_string();
    } else if let Some(rest) = key.strip_prefix("http://") {
        key = rest.to_string();
    }

    // Queries and fragments never take part in matching; drop them even
    // when the add-UI failed to.
    if let Some(idx) = key.find(['?', '#']) {
        key.truncate(idx);
    }

    while key.ends_with('/') {
        key.pop();
    }

    if key.is_empty() || key.starts_with('/') {
        return None;
    }

    Some(key)
}

/// Escape every regex metacharacter in `literal`.
pub fn escape_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if ch.is_ascii() && REGEX_META.contains(&(ch as u8)) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Synthesize the `regexFilter` for a normalized website key.
///
/// A bare host matches itself and any subdomain, with a label boundary
/// right after the host (so `core` never matches `notcore.example`). A
/// host+path key additionally requires the literal path followed by a
/// path boundary, ignoring query and fragment.
pub fn website_pattern(key: &str) -> Option<String> {
    let key = normalize_key(key)?;

    let (host, path) = match key.find('/') {
        Some(idx) => (&key[..idx], Some(&key[idx..])),
        None => (&key[..], None),
    };
    if host.is_empty() {
        return None;
    }

    let mut pattern = String::from("^https?://(?:[^/:?#]*\\.)?");
    pattern.push_str(&escape_literal(host));

    match path {
        Some(path) => {
            // Optional port, then the literal path, then a path boundary.
            pattern.push_str("(?::\\d+)?");
            pattern.push_str(&escape_literal(path));
            pattern.push_str("(?:[/?#]|$)");
        }
        None => {
            // Port, path, query or fragment all count as a boundary.
            pattern.push_str("(?:[:/?#]|$)");
        }
    }

    Some(pattern)
}

/// Normalize a blocked-channel name for page-side equality matching.
pub fn channel_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    if key.is_empty() {
        return None;
    }
    Some(key.to_string())
}
