//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use htmlscrub::{format_urls, html_format, sanitize_with_options, ContentMode, SanitizeOptions};

    const REPLY: &str = "Thanks, see below.\n\
                         <!--prefixA: <a href=\"https://example.com/\" class=\"anchor\">jump</a>-->\n\
                         > earlier message\n\
                         > with <b>markup</b>";

    #[test]
    fn matching_anchor_marker_is_preserved() {
        let result = html_format(REPLY, true, "prefixA:", 72);
        assert!(result
            .content
            .contains("<!--prefixA: <a href=\"https://example.com/\" class=\"anchor\">jump</a>-->"));
        assert!(result.content.contains("<blockquote type=\"cite\">"));
        assert!(result.content.contains("with &lt;b&gt;markup&lt;/b&gt;"));
    }

    #[test]
    fn foreign_anchor_marker_is_escaped() {
        let result = html_format(REPLY, true, "prefixB:", 72);
        assert!(!result.content.contains("<!--prefixA:"));
        assert!(!result.content.contains("<a href=\"https://example.com/\" class"));
        assert!(result.content.contains("&lt;!--prefixA:"));
    }

    #[test]
    fn empty_or_hostile_prefixes_never_match() {
        for prefix in ["", ">", "-->", "--"] {
            let text = format!("<!--{}<script>alert(1)</script>-->", prefix);
            let result = html_format(&text, false, prefix, 0);
            assert!(!result.content.contains("<script>"), "{:?}", prefix);
        }
    }

    #[test]
    fn plain_text_mode_through_sanitizer() {
        let options = SanitizeOptions {
            mode: ContentMode::PlainText,
            quote_markers: true,
            anchor_marker_prefix: "prefixA:".to_string(),
            line_length: 72,
            ..SanitizeOptions::default()
        };
        let direct = html_format(REPLY, true, "prefixA:", 72);
        let through = sanitize_with_options(REPLY, &options).unwrap();
        assert_eq!(direct.content, through.content);
    }

    #[test]
    fn urls_are_linkified_and_text_escaped() {
        let out = format_urls("Go to www.example.com/docs, or mail me@example.com <now>", "");
        assert!(out.starts_with(
            "Go to <a href=\"http://www.example.com/docs\" target=\"_blank\" rel=\"noopener noreferrer\">www.example.com/docs</a>,"
        ));
        assert!(out.ends_with("&lt;now&gt;"));
        // 裸邮件地址只有带 `mailto:` 时才生成链接
        assert!(out.contains(" mail me@example.com "));
        assert!(format_urls("mailto:me@example.com", "").contains("href=\"mailto:me@example.com\""));
    }

    #[test]
    fn comment_marker_wraps_generated_anchors() {
        let out = format_urls("https://example.com", "moz-txt-link");
        assert!(out.starts_with("<!--moz-txt-link--><a href=\"https://example.com\""));
        assert!(out.ends_with("</a><!--/moz-txt-link-->"));
    }

    #[test]
    fn long_lines_wrap_without_splitting_words() {
        let result = html_format("one two three four five", false, "", 9);
        assert_eq!(result.content, "one two<br>three<br>four five");
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use htmlscrub::format_urls;

    #[test]
    fn script_schemes_are_not_linkified() {
        for text in ["javascript:alert(1)", "data:text/html,<b>x</b>", "http://", "mailto:nobody"] {
            let out = format_urls(text, "");
            assert!(!out.contains("<a "), "{:?} -> {:?}", text, out);
        }
    }
}
