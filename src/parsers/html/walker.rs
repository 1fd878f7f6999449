//! token 流遍历器
//!
//! 把后端产生的 token 流按策略逐个处理，得到可以直接交给序列化器的、结构平衡的 token 序列。
//!
//! # 主要功能
//!
//! - **策略应用**: 每个 token 交给 `policy::evaluate_with_report` 决定去留
//! - **子树删除**: `StripSubtree` 的元素连同内容一起跳过，同名嵌套按深度计数
//! - **结构修复**: 只为真正输出过的开始标签输出结束标签，孤立的结束标签丢弃，输入结束时补齐
//! - **样式块**: `<style>` 内的原始文本交给 CSS 子净化器
//! - **元素处理器**: 保留下来的开始标签再经过 `ElementHandlerRegistry`
//!
//! # 使用示例
//!
//! ```rust
//! use htmlscrub::core::SanitizeOptions;
//! use htmlscrub::parsers::html::backend::{select_backend, ParserBackend};
//! use htmlscrub::parsers::html::walker::walk;
//! use htmlscrub::policy::default_policy;
//!
//! let table = default_policy();
//! let options = SanitizeOptions::default();
//! let tokens = select_backend(ParserBackend::Streaming)
//!     .tokenize("<p onclick=x>hi<script>alert(1)</script>")
//!     .unwrap();
//!
//! let output = walk(tokens, &table, &options).unwrap();
//! assert_eq!(output.report.attributes_removed, 1);
//! assert_eq!(output.report.tags_removed, 1);
//! ```

use tracing::debug;

use crate::core::SanitizeOptions;
use crate::error::ScrubResult;
use crate::parsers::css::{sanitize_css, CssContext, CssOptions};
use crate::policy::{evaluate_with_report, Action, PolicyTable, Report};

use super::element_handlers::{ElementHandlerRegistry, HandlerOutcome};
use super::token::{StartTag, Token};
use super::utils::{is_raw_text_element, is_void_element};

/// 文档骨架元素：DOM 后端总会补出它们，删除时不计入报告
const DOCUMENT_ELEMENTS: &[&str] = &["html", "head", "body"];

/// 遍历结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOutput {
    pub tokens: Vec<Token>,
    pub report: Report,
}

/// 使用默认元素处理器遍历 token 流
pub fn walk<I>(tokens: I, table: &PolicyTable, options: &SanitizeOptions) -> ScrubResult<WalkOutput>
where
    I: IntoIterator<Item = ScrubResult<Token>>,
{
    let handlers = ElementHandlerRegistry::new();
    PolicyWalker::new(table, options, &handlers).walk(tokens)
}

/// 正在跳过的子树
#[derive(Debug)]
struct SkippedSubtree {
    name: String,
    depth: usize,
}

/// 按策略处理 token 流
pub struct PolicyWalker<'a> {
    table: &'a PolicyTable,
    options: &'a SanitizeOptions,
    handlers: &'a ElementHandlerRegistry,
    report: Report,
    /// 已输出且尚未关闭的元素
    open: Vec<String>,
    skipping: Option<SkippedSubtree>,
    output: Vec<Token>,
}

impl<'a> PolicyWalker<'a> {
    pub fn new(
        table: &'a PolicyTable,
        options: &'a SanitizeOptions,
        handlers: &'a ElementHandlerRegistry,
    ) -> Self {
        Self {
            table,
            options,
            handlers,
            report: Report::default(),
            open: Vec::new(),
            skipping: None,
            output: Vec::new(),
        }
    }

    /// 消费整个 token 流；流中的第一个错误会立即返回
    pub fn walk<I>(mut self, tokens: I) -> ScrubResult<WalkOutput>
    where
        I: IntoIterator<Item = ScrubResult<Token>>,
    {
        for token in tokens {
            self.visit(token?);
        }

        while let Some(name) = self.open.pop() {
            self.output.push(Token::EndTag(name));
        }

        Ok(WalkOutput {
            tokens: self.output,
            report: self.report,
        })
    }

    fn visit(&mut self, token: Token) {
        if self.skipping.is_some() {
            self.visit_skipped(&token);
            return;
        }

        match token {
            Token::StartTag(tag) => self.visit_start_tag(tag),
            Token::EndTag(name) => self.visit_end_tag(name),
            Token::Comment(_) => {
                self.report.comments_removed += 1;
            }
            Token::Doctype(_) => {}
            Token::Text(text) => {
                if !text.is_empty() {
                    self.output.push(Token::Text(text));
                }
            }
            Token::CData(data) => self.visit_cdata(data),
        }
    }

    fn visit_skipped(&mut self, token: &Token) {
        let Some(skipped) = self.skipping.as_mut() else {
            return;
        };

        match token {
            Token::StartTag(tag) if tag.name == skipped.name && !is_void_element(&tag.name) => {
                skipped.depth += 1;
            }
            Token::EndTag(name) if *name == skipped.name => {
                skipped.depth -= 1;
                if skipped.depth == 0 {
                    self.skipping = None;
                }
            }
            _ => {}
        }
    }

    fn visit_start_tag(&mut self, tag: StartTag) {
        let token = Token::StartTag(tag);
        let (action, report) = evaluate_with_report(&token, self.table, self.options);
        self.report.merge(&report);
        let Token::StartTag(tag) = token else {
            return;
        };

        match action {
            Action::Keep => self.keep_start_tag(tag),
            Action::KeepWithAttributesFiltered(filtered) => {
                let tag = filtered.apply(&tag);
                self.keep_start_tag(tag);
            }
            Action::Strip => {
                if !DOCUMENT_ELEMENTS.contains(&tag.name.as_str()) {
                    debug!("删除标签 <{}>，保留子节点", tag.name);
                    self.report.tags_removed += 1;
                }
            }
            Action::StripSubtree => {
                debug!("删除元素 <{}> 及其子树", tag.name);
                self.report.tags_removed += 1;
                // 自闭合只在外来内容（svg、math）里生效，raw text 元素无论如何都有内容
                let has_content = !is_void_element(&tag.name)
                    && !(tag.self_closing && !is_raw_text_element(&tag.name));
                if has_content {
                    self.skipping = Some(SkippedSubtree {
                        name: tag.name,
                        depth: 1,
                    });
                }
            }
            Action::ReplaceWithText(text) => {
                debug!("以文本替换 <{}>", tag.name);
                if !text.is_empty() {
                    self.output.push(Token::Text(text));
                }
            }
        }
    }

    fn keep_start_tag(&mut self, mut tag: StartTag) {
        if self.handlers.handle_element(&mut tag, self.options) == HandlerOutcome::Drop {
            self.report.tags_removed += 1;
            return;
        }

        // HTML 中非空元素上的自闭合标记没有意义，元素照常打开
        tag.self_closing = false;
        if !is_void_element(&tag.name) {
            self.open.push(tag.name.clone());
        }
        self.output.push(Token::StartTag(tag));
    }

    fn visit_end_tag(&mut self, name: String) {
        let token = Token::EndTag(name);
        let (action, _) = evaluate_with_report(&token, self.table, self.options);
        let Token::EndTag(name) = token else {
            return;
        };
        if action != Action::Keep {
            return;
        }

        // 只关闭真正打开过的元素；中间未关闭的元素一并关闭
        let Some(position) = self.open.iter().rposition(|open| *open == name) else {
            debug!("丢弃孤立的结束标签 </{}>", name);
            return;
        };
        while self.open.len() > position {
            if let Some(open) = self.open.pop() {
                self.output.push(Token::EndTag(open));
            }
        }
    }

    fn visit_cdata(&mut self, data: String) {
        if self.open.last().map(String::as_str) != Some("style") {
            // 被拆掉外层元素的原始文本按普通文本转义输出
            if !data.is_empty() {
                self.output.push(Token::Text(data));
            }
            return;
        }

        let css_options = CssOptions {
            prefix: self.options.css_prefix.as_deref(),
            drop_external_images: self.options.drop_external_images,
        };
        let output = sanitize_css(&data, CssContext::Block, self.table, &css_options);
        self.report.merge(&output.report);

        let css = output.css.replace("</", "<\\/");
        if !css.is_empty() {
            self.output.push(Token::CData(css));
        } else if !output.report.is_clean() {
            self.drop_emptied_style();
        }
    }

    /// 样式内容被净化删空时去掉整个 `<style>`，随后的 `</style>` 没有对应的开始标签而被丢弃
    fn drop_emptied_style(&mut self) {
        if matches!(self.output.last(), Some(Token::StartTag(tag)) if tag.name == "style") {
            debug!("<style> 净化后为空，整体删除");
            self.output.pop();
            self.open.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::backend::{select_backend, ParserBackend};
    use crate::policy::default_policy;

    fn run(input: &str) -> WalkOutput {
        run_with(input, &SanitizeOptions::default())
    }

    fn run_with(input: &str, options: &SanitizeOptions) -> WalkOutput {
        let table = default_policy();
        let tokens = select_backend(ParserBackend::Streaming)
            .tokenize(input)
            .unwrap();
        walk(tokens, &table, options).unwrap()
    }

    #[test]
    fn strips_subtrees_with_nesting() {
        let out = run("<p>a<object><object>x</object>y</object>b</p>");
        assert_eq!(
            out.tokens,
            vec![
                Token::start("p"),
                Token::Text("a".to_string()),
                Token::Text("b".to_string()),
                Token::end("p"),
            ]
        );
        assert_eq!(out.report.tags_removed, 1);
    }

    #[test]
    fn strips_unknown_tags_but_keeps_children() {
        let out = run("<blink>hi</blink>");
        assert_eq!(out.tokens, vec![Token::Text("hi".to_string())]);
        assert_eq!(out.report.tags_removed, 1);
    }

    #[test]
    fn closes_open_elements_and_drops_stray_end_tags() {
        let out = run("</div><div><b>x");
        assert_eq!(
            out.tokens,
            vec![
                Token::start("div"),
                Token::start("b"),
                Token::Text("x".to_string()),
                Token::end("b"),
                Token::end("div"),
            ]
        );

        let out = run("<div><b>x</div>");
        assert_eq!(out.tokens.last(), Some(&Token::end("div")));
        assert_eq!(out.tokens.len(), 5);
    }

    #[test]
    fn void_strip_subtree_elements_do_not_swallow_content() {
        let out = run("<input type=text>after<meta http-equiv=refresh>tail");
        assert_eq!(
            out.tokens,
            vec![
                Token::Text("after".to_string()),
                Token::Text("tail".to_string())
            ]
        );
    }

    #[test]
    fn comments_are_counted_not_emitted() {
        let out = run("a<!-- x -->b");
        assert_eq!(out.report.comments_removed, 1);
        assert_eq!(out.tokens.len(), 2);
    }

    #[test]
    fn style_blocks_are_sanitized() {
        let out = run("<style>@import 'x.css'; p { color: red }</style>");
        assert_eq!(
            out.tokens,
            vec![
                Token::start("style"),
                Token::CData("p { color: red }".to_string()),
                Token::end("style"),
            ]
        );
        assert_eq!(out.report.css_removed, 1);
    }

    #[test]
    fn emptied_style_blocks_are_dropped() {
        let out = run("<style>@font-face{src:url(javascript:alert(1))}</style><p>x</p>");
        assert_eq!(
            out.tokens,
            vec![Token::start("p"), Token::Text("x".to_string()), Token::end("p")]
        );
        assert!(out.report.css_removed > 0);

        let out = run("<style>@import 'x.css';</style>");
        assert!(out.tokens.is_empty());
    }

    #[test]
    fn external_image_becomes_alt_text() {
        let options = SanitizeOptions {
            drop_external_images: true,
            ..SanitizeOptions::default()
        };
        let out = run_with("<img src=\"http://t.example/p.gif\" alt=\"logo\">", &options);
        assert_eq!(out.tokens, vec![Token::Text("logo".to_string())]);
        assert_eq!(out.report.images_dropped, 1);
    }

    #[test]
    fn stream_errors_propagate() {
        let table = default_policy();
        let options = SanitizeOptions::default();
        let tokens = vec![
            Ok(Token::start("p")),
            Err(crate::error::SanitizeError::malformed(3, "test")),
        ];
        assert!(walk(tokens, &table, &options).is_err());
    }
}
