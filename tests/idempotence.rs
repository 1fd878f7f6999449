//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

#[cfg(test)]
mod passing {
    use htmlscrub::core::{SanitizeOptions, Sanitizer};
    use htmlscrub::parsers::html::backend::ParserBackend;

    use super::common::scrub_with;

    const DOCUMENTS: &[&str] = &[
        "<p>plain &amp; simple</p>",
        "<a href=\"java&#9;script:alert(1)\" target=_blank>t</a>",
        "<div style=\"color:red;background:url(a.png);width:expression(1)\">x</div>",
        "<style>p{color:red} .x{background:url(http://e.example/a.png)} @import 'y.css';</style><p class=x>y</p>",
        "<style>@media screen { .a, body p { margin: 0 } }</style>",
        "<b>unclosed <i>nesting",
        "</p>stray<blink>tags</blink><!-- gone -->",
        "<img src=\"data:image/png;base64,iVBORw0KGgo=\" alt=\"a &lt; b\">",
        "<p title=\"&quot;quoted&quot; &#x27;single&#x27;\">&lt;not a tag&gt;</p>",
        "<style>x { content: '\\'<' }</style>",
        "<q cite=\"https://example.com/?a=1&b=2\">quote</q>",
    ];

    fn assert_idempotent(options: &SanitizeOptions) {
        for backend in ParserBackend::ALL {
            for document in DOCUMENTS {
                let once = scrub_with(document, backend, options).unwrap();
                let twice = scrub_with(&once.content, backend, options).unwrap();
                assert_eq!(
                    once.content, twice.content,
                    "[{}] 二次净化改变了输出，输入 {:?}",
                    backend, document
                );
                assert!(!twice.modified, "[{}] {:?} -> {:?}", backend, document, twice.report);
            }
        }
    }

    #[test]
    fn default_policy() {
        assert_idempotent(&SanitizeOptions::default());
    }

    #[test]
    fn strict_policy() {
        assert_idempotent(&SanitizeOptions {
            policy: Some("strict".to_string()),
            ..SanitizeOptions::default()
        });
    }

    #[test]
    fn with_css_prefix_and_dropped_images() {
        assert_idempotent(&SanitizeOptions {
            css_prefix: Some("msg".to_string()),
            drop_external_images: true,
            ..SanitizeOptions::default()
        });
    }

    #[test]
    fn batch_is_idempotent_too() {
        let sanitizer = Sanitizer::default();
        let options = SanitizeOptions::default();
        let once: Vec<String> = sanitizer
            .sanitize_batch(DOCUMENTS, &options)
            .into_iter()
            .map(|r| r.unwrap().content)
            .collect();
        let twice: Vec<String> = sanitizer
            .sanitize_batch(once.as_slice(), &options)
            .into_iter()
            .map(|r| r.unwrap().content)
            .collect();
        assert_eq!(once, twice);
    }
}
