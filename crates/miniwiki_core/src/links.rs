//! Bracket-link scanning for page content.
//!
//! A link span is `[Title]`: a single opening bracket up to the first
//! closing bracket. The interior may not be empty and may not contain `]`.
//! The deprecated `[[Title]]` form is only understood by the legacy
//! rewrite below; everything else treats it as two nested spans.

/// Replace every well-formed `[Title]` span in `text` with the value
/// returned by `on_link`, which receives the trimmed interior.
///
/// Malformed spans are not errors: an empty pair `[]` and an unterminated
/// `[` pass through verbatim. Text outside spans is copied unchanged.
pub fn parse_wiki_links<F>(text: &str, mut on_link: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        match rest[open + 1..].find(']') {
            Some(len) if len > 0 => {
                let inner = &rest[open + 1..open + 1 + len];
                out.push_str(&rest[..open]);
                out.push_str(&on_link(inner.trim()));
                rest = &rest[open + 1 + len + 1..];
            }
            _ => {
                // `[]` or no closing bracket: keep the bracket and rescan
                // from the next character.
                out.push_str(&rest[..=open]);
                rest = &rest[open + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Rewrite every legacy `[[Title]]` occurrence to the current `[Title]`
/// form. The interior must be non-empty and free of `]`, matching what the
/// parser accepts; anything else is left alone.
pub fn rewrite_legacy_links(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(open) = rest.find("[[") {
        let after = &rest[open + 2..];
        let matched = match after.find(']') {
            Some(len) if len > 0 && after.as_bytes().get(len + 1) == Some(&b']') => Some(len),
            _ => None,
        };
        match matched {
            Some(len) => {
                out.push_str(&rest[..open]);
                out.push('[');
                out.push_str(&after[..len]);
                out.push(']');
                rest = &after[len + 2..];
            }
            None => {
                out.push_str(&rest[..=open]);
                rest = &rest[open + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Collect the trimmed titles of every well-formed span, left to right.
pub fn collect_link_titles(text: &str) -> Vec<String> {
    let mut titles = Vec::new();
    parse_wiki_links(text, |title| {
        titles.push(title.to_string());
        String::new()
    });
    titles
}

#[cfg(test)]
mod tests {
    use super::{collect_link_titles, parse_wiki_links, rewrite_legacy_links};

    #[test]
    fn parses_a_single_link() {
        let result = parse_wiki_links("Check out [Documentation]", |title| {
            format!("<link>{title}</link>")
        });
        assert_eq!(result, "Check out <link>Documentation</link>");
    }

    #[test]
    fn parses_multiple_links() {
        let result = parse_wiki_links("See [Documentation] and [Projects] for more info", |title| {
            format!("[{title}]")
        });
        assert_eq!(result, "See [Documentation] and [Projects] for more info");
    }

    #[test]
    fn handles_titles_with_spaces() {
        let result = parse_wiki_links("Visit [My Page Title]", |title| format!("LINK:{title}"));
        assert_eq!(result, "Visit LINK:My Page Title");
    }

    #[test]
    fn trims_whitespace_around_titles() {
        let result = parse_wiki_links("Check [ Documentation ]", |title| {
            format!("<link>{title}</link>")
        });
        assert_eq!(result, "Check <link>Documentation</link>");
    }

    #[test]
    fn leaves_unclosed_bracket_verbatim() {
        let result = parse_wiki_links("Text with [unclosed bracket", |title| {
            format!("<link>{title}</link>")
        });
        assert_eq!(result, "Text with [unclosed bracket");
    }

    #[test]
    fn leaves_empty_brackets_verbatim() {
        let result = parse_wiki_links("Text with []", |title| format!("<link>{title}</link>"));
        assert_eq!(result, "Text with []");
    }

    #[test]
    fn empty_pair_does_not_block_later_spans() {
        let result = parse_wiki_links("[][X]", |title| format!("<{title}>"));
        assert_eq!(result, "[]<X>");
    }

    #[test]
    fn handles_special_characters_in_titles() {
        let result = parse_wiki_links("Check [O'Brien's Page]", |title| format!("LINK:{title}"));
        assert_eq!(result, "Check LINK:O'Brien's Page");
    }

    #[test]
    fn preserves_text_outside_links() {
        let result = parse_wiki_links("Start [Link] middle [Another] end", |title| {
            format!("<{title}>")
        });
        assert_eq!(result, "Start <Link> middle <Another> end");
    }

    #[test]
    fn callback_sees_each_title_independently() {
        let result = parse_wiki_links("Links: [Page1] [Page2]", |title| {
            if title == "Page1" {
                "FIRST".to_string()
            } else {
                "SECOND".to_string()
            }
        });
        assert_eq!(result, "Links: FIRST SECOND");
    }

    #[test]
    fn identity_callback_strips_brackets_only() {
        let result = parse_wiki_links("a [B] c [] [D] [e", |title| title.to_string());
        assert_eq!(result, "a B c [] D [e");
    }

    #[test]
    fn whitespace_only_interior_matches_with_empty_title() {
        let mut seen = Vec::new();
        let result = parse_wiki_links("pad [ ] pad", |title| {
            seen.push(title.to_string());
            "X".to_string()
        });
        assert_eq!(result, "pad X pad");
        assert_eq!(seen, vec![String::new()]);
    }

    #[test]
    fn rewrites_legacy_links() {
        assert_eq!(
            rewrite_legacy_links("See [[Docs]] and [[Projects]]"),
            "See [Docs] and [Projects]"
        );
    }

    #[test]
    fn rewrite_is_a_noop_on_current_syntax() {
        let content = "Welcome! Check [Documentation]";
        assert_eq!(rewrite_legacy_links(content), content);
    }

    #[test]
    fn rewrites_many_occurrences_in_one_string() {
        assert_eq!(
            rewrite_legacy_links("[[First]] link and [[Second]] link and [[Third]]"),
            "[First] link and [Second] link and [Third]"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_legacy_links("Intro [[A]] middle [[B C]] end");
        assert_eq!(rewrite_legacy_links(&once), once);
    }

    #[test]
    fn rewrite_leaves_unterminated_legacy_span_alone() {
        assert_eq!(rewrite_legacy_links("broken [[Title"), "broken [[Title");
    }

    #[test]
    fn collects_titles_in_order() {
        let titles = collect_link_titles("a [B] c [ D ] [] [E");
        assert_eq!(titles, vec!["B".to_string(), "D".to_string()]);
    }
}
