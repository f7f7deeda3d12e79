//! Field canonicalisation.
//!
//! Oracles disagree on incidental formatting: header folding, NUL padding,
//! quoting, and re-serialised address lists. Both functions here are pure and
//! idempotent, and are applied when rows are decoded and again at compare time.

/// Characters kept in a `*_preview` field.
pub const PREVIEW_CHARS: usize = 160;

/// Remove NUL bytes, collapse whitespace runs to one space, and trim.
pub fn normalize_text(value: &str) -> String {
    value
        .replace('\0', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalised text truncated to [`PREVIEW_CHARS`] characters.
pub fn preview(value: &str) -> String {
    normalize_text(value).chars().take(PREVIEW_CHARS).collect()
}

/// Characters that force a display name into a quoted string.
const NAME_SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// One entry of a header-style address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: String,
    pub address: String,
}

impl Mailbox {
    /// `Name <address>`, bare `address`, or `None` when there is no address.
    ///
    /// A name containing a special is quoted so the rendered list parses
    /// back to the same mailboxes.
    pub fn render(&self) -> Option<String> {
        match (self.name.is_empty(), self.address.is_empty()) {
            (_, true) => None,
            (true, false) => Some(self.address.clone()),
            (false, false) => Some(format!("{} <{}>", quote_name(&self.name), self.address)),
        }
    }
}

fn quote_name(name: &str) -> String {
    if !name.contains(NAME_SPECIALS) {
        return name.to_string();
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Parse a header-style address list into mailboxes, preserving order.
///
/// Handles quoted display names (which may contain commas), angle-bracket
/// routes, parenthesised comments (used as the name when no phrase is given),
/// and group syntax (`Team: a@x, b@y;`, where the group label is dropped).
pub fn parse_address_list(value: &str) -> Vec<Mailbox> {
    split_top_level(value)
        .iter()
        .map(|token| parse_mailbox(token))
        .filter(|m| !m.name.is_empty() || !m.address.is_empty())
        .collect()
}

/// Canonical `"Name <addr>, addr, ..."` form of an address list.
///
/// Order is preserved: two lists that differ only in recipient order do not
/// normalise to the same string.
pub fn normalize_address_list(value: &str) -> String {
    parse_address_list(value)
        .iter()
        .filter_map(Mailbox::render)
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_top_level(value: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0usize;
    let mut paren = 0usize;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || paren > 0 => {
                current.push(c);
                escaped = true;
            }
            '"' if paren == 0 => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' if !in_quotes => {
                paren += 1;
                current.push(c);
            }
            ')' if !in_quotes && paren > 0 => {
                paren -= 1;
                current.push(c);
            }
            '<' if !in_quotes && paren == 0 => {
                angle += 1;
                current.push(c);
            }
            '>' if !in_quotes && paren == 0 && angle > 0 => {
                angle -= 1;
                current.push(c);
            }
            ',' | ';' if !in_quotes && paren == 0 && angle == 0 => {
                tokens.push(std::mem::take(&mut current));
            }
            // group label
            ':' if !in_quotes && paren == 0 && angle == 0 => current.clear(),
            _ => current.push(c),
        }
    }
    tokens.push(current);
    tokens
}

fn parse_mailbox(token: &str) -> Mailbox {
    let mut phrase = String::new();
    let mut route = String::new();
    let mut comment = String::new();
    let mut saw_route = false;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut in_angle = false;
    let mut paren = 0usize;

    for c in token.chars() {
        if !escaped {
            match c {
                '\\' if in_quotes || paren > 0 => {
                    escaped = true;
                    continue;
                }
                '"' if paren == 0 && !in_angle => {
                    in_quotes = !in_quotes;
                    continue;
                }
                '(' if !in_quotes => {
                    paren += 1;
                    if paren > 1 {
                        comment.push(c);
                    }
                    continue;
                }
                ')' if !in_quotes && paren > 0 => {
                    paren -= 1;
                    comment.push(if paren > 0 { c } else { ' ' });
                    continue;
                }
                '<' if !in_quotes && paren == 0 => {
                    in_angle = true;
                    saw_route = true;
                    continue;
                }
                '>' if !in_quotes && paren == 0 && in_angle => {
                    in_angle = false;
                    continue;
                }
                _ => {}
            }
        }
        escaped = false;
        let sink = if paren > 0 {
            &mut comment
        } else if in_angle {
            &mut route
        } else {
            &mut phrase
        };
        sink.push(c);
    }

    if saw_route {
        Mailbox {
            name: normalize_text(&phrase),
            address: normalize_text(&route),
        }
    } else {
        Mailbox {
            name: normalize_text(&comment),
            address: normalize_text(&phrase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_whitespace() {
        assert_eq!(normalize_text("  Hello \n\t world  "), "Hello world");
        assert_eq!(normalize_text("Hello  \n"), "Hello");
    }

    #[test]
    fn test_normalize_text_strips_nul() {
        assert_eq!(normalize_text("Sub\0ject\0"), "Subject");
        assert_eq!(normalize_text("\0\0"), "");
    }

    #[test]
    fn test_preview_truncates_after_normalizing() {
        let long = "a  ".repeat(200);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
        assert!(p.starts_with("a a a"));
    }

    #[test]
    fn test_preview_counts_chars_not_bytes() {
        let text = "é".repeat(300);
        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn test_address_name_and_route() {
        let list = parse_address_list("Alice Smith <alice@example.com>");
        assert_eq!(
            list,
            vec![Mailbox {
                name: "Alice Smith".to_string(),
                address: "alice@example.com".to_string(),
            }]
        );
    }

    #[test]
    fn test_address_quoted_name_with_comma() {
        assert_eq!(
            normalize_address_list("\"Doe, John\" <john@example.com>, jane@example.com"),
            "\"Doe, John\" <john@example.com>, jane@example.com"
        );
    }

    #[test]
    fn test_address_comment_becomes_name() {
        assert_eq!(
            normalize_address_list("bob@example.com (Bob Jones)"),
            "Bob Jones <bob@example.com>"
        );
    }

    #[test]
    fn test_address_whitespace_insensitive() {
        let canonical = normalize_address_list("A <a@x>, B <b@x>");
        let folded = normalize_address_list("  A   <a@x>,\r\n\t B\n<b@x>  ");
        assert_eq!(canonical, "A <a@x>, B <b@x>");
        assert_eq!(folded, canonical);
    }

    #[test]
    fn test_address_order_is_preserved() {
        let ab = normalize_address_list("A <a@x>, B <b@x>");
        let ba = normalize_address_list("B <b@x>, A <a@x>");
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_address_group_label_dropped() {
        assert_eq!(
            normalize_address_list("Team: a@x, B <b@x>;"),
            "a@x, B <b@x>"
        );
    }

    #[test]
    fn test_address_empty_and_name_only_entries_dropped() {
        assert_eq!(normalize_address_list(""), "");
        assert_eq!(normalize_address_list(" , ,"), "");
        assert_eq!(normalize_address_list("Nobody <>"), "");
    }

    #[test]
    fn test_address_name_with_specials_survives_renormalizing() {
        for raw in [
            "\"a:b\" <x@y>",
            "\"a;b\" <x@y>",
            "\"J. R. \\\"Bob\\\" (Jr)\" <bob@y>",
            "\"back\\\\slash <1>\" <s@y>, t@y",
        ] {
            let once = normalize_address_list(raw);
            assert_eq!(normalize_address_list(&once), once, "{raw}");
        }
        assert_eq!(normalize_address_list("\"a:b\" <x@y>"), "\"a:b\" <x@y>");
        assert_eq!(
            normalize_address_list("\"Say \\\"hi\\\"\" <x@y>"),
            "\"Say \\\"hi\\\"\" <x@y>"
        );
    }

    #[test]
    fn test_address_list_normalization_idempotent() {
        let once = normalize_address_list("\"X  Y\" <x@y>,  z@w (Zed)");
        assert_eq!(normalize_address_list(&once), once);
    }
}
