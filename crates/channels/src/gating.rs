/// Check whether posts from a channel should be ingested.
///
/// An empty allowlist admits every channel the bot can see. Entries are
/// matched case-insensitively against the `@handle` (a missing leading `@` on
/// either side is tolerated) and support glob-style `*` wildcards. A channel
/// with no public handle only passes an empty allowlist or an entry equal to
/// its numeric chat id.
pub fn is_channel_allowed(handle: Option<&str>, chat_id: i64, allowlist: &[String]) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    let chat_id = chat_id.to_string();
    let handle = handle.map(|h| format!("@{}", h.trim_start_matches('@').to_lowercase()));

    allowlist.iter().any(|entry| {
        let entry = entry.trim();
        if entry == chat_id {
            return true;
        }
        let Some(ref handle) = handle else {
            return false;
        };
        let pat = format!("@{}", entry.trim_start_matches('@').to_lowercase());
        if pat.contains('*') {
            glob_match(&pat, handle)
        } else {
            pat == *handle
        }
    })
}

/// Glob match where `*` stands for any run of characters.
///
/// The first and last segments are anchored to the ends of `text`; the
/// middle segments are found left to right in what remains between them.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == text;
    };
    if first.len() + last.len() > text.len() || !text.starts_with(first) || !text.ends_with(last)
    {
        return false;
    }

    let mut rest = &text[first.len()..text.len() - last.len()];
    for part in middle.iter().filter(|p| !p.is_empty()) {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}
