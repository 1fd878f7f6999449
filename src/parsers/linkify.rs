//! 纯文本链接化
//!
//! 在纯文本中识别 `http://`、`https://`、`mailto:` 以及 `www.` 开头的地址，包装成锚点，
//! 其余文本按 HTML 文本转义。其他 scheme（`skype:`、`javascript:`、`about:` 等）不会被识别，
//! 原样作为文本输出。

use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::html::utils::{escape_attribute, escape_text};
use crate::utils::url::Url;

const URL_PATTERN: &str = r#"(?i)\b(?:https?://|mailto:|www\.)[^\s<>"'`]+"#;

const LINKABLE_SCHEMES: &[&str] = &["http", "https", "mailto"];

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(URL_PATTERN).ok()).as_ref()
}

/// 把纯文本中的安全链接包装成锚点
///
/// `comment_marker` 非空时，每个生成的锚点前后分别加上 `<!--marker-->` 与 `<!--/marker-->`，
/// 便于下游识别哪些锚点是生成的。
pub fn format_urls(text: &str, comment_marker: &str) -> String {
    let mut out = String::with_capacity(text.len());
    linkify_into(text, comment_marker, &mut out);
    out
}

pub(crate) fn linkify_into(text: &str, comment_marker: &str, out: &mut String) {
    let Some(pattern) = url_pattern() else {
        escape_text(text, out);
        return;
    };

    let mut last = 0;
    for found in pattern.find_iter(text) {
        let candidate = trim_trailing_punctuation(found.as_str());
        let Some(href) = linkable_href(candidate) else {
            continue;
        };

        escape_text(&text[last..found.start()], out);
        push_anchor(&href, candidate, comment_marker, out);
        last = found.start() + candidate.len();
    }
    escape_text(&text[last..], out);
}

/// 去掉被正则一并吞进来的句末标点；不成对的右括号也去掉
fn trim_trailing_punctuation(candidate: &str) -> &str {
    let mut end = candidate;
    loop {
        let trimmed = end.trim_end_matches(['.', ',', ';', ':', '!', '?']);
        let trimmed = if trimmed.ends_with(')')
            && trimmed.matches('(').count() < trimmed.matches(')').count()
        {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };
        if trimmed.len() == end.len() {
            return end;
        }
        end = trimmed;
    }
}

/// 候选文本能否链接化；能则返回用作 `href` 的地址
fn linkable_href(candidate: &str) -> Option<String> {
    let href = if candidate
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("www."))
    {
        format!("http://{}", candidate)
    } else {
        candidate.to_string()
    };

    let parsed = Url::parse(&href).ok()?;
    if !LINKABLE_SCHEMES.contains(&parsed.scheme()) {
        return None;
    }
    match parsed.scheme() {
        "mailto" => parsed.path().contains('@').then_some(href),
        _ => parsed.host_str().is_some_and(|h| !h.is_empty()).then_some(href),
    }
}

fn push_anchor(href: &str, label: &str, comment_marker: &str, out: &mut String) {
    if !comment_marker.is_empty() {
        out.push_str("<!--");
        out.push_str(comment_marker);
        out.push_str("-->");
    }
    out.push_str("<a href=\"");
    escape_attribute(href, out);
    out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
    escape_text(label, out);
    out.push_str("</a>");
    if !comment_marker.is_empty() {
        out.push_str("<!--/");
        out.push_str(comment_marker);
        out.push_str("-->");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_safe_schemes() {
        assert_eq!(
            format_urls("see https://example.com/a?b=1&c=2.", ""),
            "see <a href=\"https://example.com/a?b=1&amp;c=2\" target=\"_blank\" rel=\"noopener noreferrer\">https://example.com/a?b=1&amp;c=2</a>."
        );
        assert_eq!(
            format_urls("www.example.com", ""),
            "<a href=\"http://www.example.com\" target=\"_blank\" rel=\"noopener noreferrer\">www.example.com</a>"
        );
        assert!(format_urls("write to mailto:a@b.example", "").contains("href=\"mailto:a@b.example\""));
    }

    #[test]
    fn leaves_other_schemes_alone() {
        for text in [
            "call skype:echo123?call",
            "javascript:alert(1)",
            "about:blank",
            "mailto:nobody",
        ] {
            assert_eq!(format_urls(text, ""), text);
        }
    }

    #[test]
    fn escapes_surrounding_text() {
        assert_eq!(format_urls("<b>http</b>", ""), "&lt;b&gt;http&lt;/b&gt;");
    }

    #[test]
    fn parentheses_and_markers() {
        let out = format_urls("(see http://example.com/x)", "lnk");
        assert_eq!(
            out,
            "(see <!--lnk--><a href=\"http://example.com/x\" target=\"_blank\" rel=\"noopener noreferrer\">http://example.com/x</a><!--/lnk-->)"
        );
        let wiki = format_urls("http://en.wikipedia.org/wiki/Rust_(language)", "");
        assert!(wiki.contains("href=\"http://en.wikipedia.org/wiki/Rust_(language)\""));
    }
}
