//! Best-effort HTML shrinking for prompts.
//!
//! Snapshots are full body markup and blow past context windows; the model
//! only needs tag structure, text, and a handful of attributes. This is a
//! scrubber, not a parser: malformed markup passes through unharmed.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap());
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<([a-zA-Z][a-zA-Z0-9-]*)((?:"[^"]*"|'[^']*'|[^'">])*?)(/?)>"#).unwrap());
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap());

/// Remove scripts, styles and comments, and drop every attribute whose name
/// is not in `keep_attrs`. All tags survive; only attribute noise goes.
pub fn clean_html(html: &str, keep_attrs: &[&str]) -> String {
    let html = SCRIPT_RE.replace_all(html, "");
    let html = STYLE_RE.replace_all(&html, "");
    let html = COMMENT_RE.replace_all(&html, "");

    TAG_RE
        .replace_all(&html, |caps: &regex::Captures<'_>| {
            let tag = &caps[1];
            let attrs = &caps[2];
            let self_close = &caps[3];

            let mut kept = String::new();
            for attr in ATTR_RE.captures_iter(attrs) {
                let name = attr[1].to_ascii_lowercase();
                if keep_attrs.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
                    kept.push(' ');
                    kept.push_str(&attr[1]);
                    kept.push('=');
                    kept.push_str(&attr[2]);
                }
            }
            format!("<{tag}{kept}{self_close}>")
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_comments() {
        let html = "<div><script>alert(1)</script><style>.x{}</style><!-- hi --><p>text</p></div>";
        assert_eq!(clean_html(html, &[]), "<div><p>text</p></div>");
    }

    #[test]
    fn drops_attributes_not_in_allowlist() {
        let html = r#"<input class="big" id="user" placeholder="Name" value="x">"#;
        assert_eq!(clean_html(html, &["id"]), r#"<input id="user">"#);
    }

    #[test]
    fn keeps_requested_attributes_including_marker() {
        let html = r#"<label for="user" class="lbl">User</label><input node-id-for-tests-only="u-1" class="inp">"#;
        let cleaned = clean_html(html, &["for", "node-id-for-tests-only"]);
        assert_eq!(
            cleaned,
            r#"<label for="user">User</label><input node-id-for-tests-only="u-1">"#
        );
    }

    #[test]
    fn closing_tags_and_text_pass_through() {
        let html = "<ul><li data-x='1'>one</li><li>two</li></ul>";
        assert_eq!(clean_html(html, &[]), "<ul><li>one</li><li>two</li></ul>");
    }
}
