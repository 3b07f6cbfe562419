//! Home names are free text chosen by players; this keeps them to one short
//! log line.

/// Characters of a home name kept in a log line.
const LOGGED_NAME_CHARS: usize = 48;

/// Render a player-supplied name for logging. Control characters use Rust's
/// escape syntax (`\n`, `\u{7}`); everything else, including non-ASCII
/// letters, is kept as typed. Long names are cut with a trailing `…`.
pub fn escape_log(name: &str) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len().min(LOGGED_NAME_CHARS * 4) + 3);
    for c in chars.by_ref().take(LOGGED_NAME_CHARS) {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    if chars.next().is_some() {
        out.push('…');
    }
    out
}
