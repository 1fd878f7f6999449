//! CSS 子净化器
//!
//! CSS 本身就是第二个注入面：`url()`、`@import`、`expression()`，以及借助 `</style>` 跳回 HTML 的各种写法。
//! 这里用 cssparser 把样式文本分词成一棵小树（函数与括号块带子节点），再按声明和规则整体取舍：
//!
//! - `@import` 与未列入允许表的 at-rule 整条删除；
//! - 声明中出现 `<`、坏 token（`BadUrl`/`BadString`）、被拒绝的函数、被拒绝的属性，
//!   或 `url()` 指向不允许的地址时，整条声明删除；
//! - 注释一律替换为一个空格，因此 `</styl/**/e>` 只能是 `</styl e>`，不可能重新拼出结束标签；
//! - 字符串中的 `<`、`>` 输出为 CSS 转义。
//!
//! `<style>` 块与 `style="..."` 属性共用同一份策略表，两处的规则不会各自漂移。

use std::borrow::Borrow;

use cssparser::{serialize_identifier, serialize_string, CowRcStr, ParseError, Parser, ParserInput, ToCss, Token};
use tracing::debug;

use crate::parsers::html::entities::DecodedValue;
use crate::policy::{PolicyTable, Report, StripReason};

/// 包含图片URL的CSS属性列表
const CSS_PROPS_WITH_IMAGE_URLS: &[&str] = &[
    // Universal
    "background",
    "background-image",
    "border-image",
    "border-image-source",
    "content",
    "cursor",
    "list-style",
    "list-style-image",
    "mask",
    "mask-image",
    // Specific to @counter-style
    "additive-symbols",
    "negative",
    "pad",
    "prefix",
    "suffix",
    "symbols",
];

/// 嵌套块的最大深度，更深的内容直接丢弃
const MAX_NESTING_DEPTH: usize = 32;

/// 样式文本出现的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssContext {
    /// `style="..."` 属性：声明列表
    Inline,
    /// `<style>` 块：规则列表
    Block,
}

/// 与单次调用相关的 CSS 选项
#[derive(Debug, Clone, Copy, Default)]
pub struct CssOptions<'a> {
    /// 类名前缀
    pub prefix: Option<&'a str>,
    pub drop_external_images: bool,
}

/// 净化结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssOutput {
    pub css: String,
    pub report: Report,
}

/// 格式化CSS标识符
pub fn format_ident(ident: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_identifier(ident, &mut res);
    res = res.trim_end().to_string();
    res
}

/// 格式化带引号的CSS字符串，`<` 与 `>` 以转义形式输出
pub fn format_quoted_string(string: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_string(string, &mut res);
    res.replace('<', "\\3c ").replace('>', "\\3e ")
}

/// 检查CSS属性是否可能包含图片URL
pub fn is_image_url_prop(prop_name: &str) -> bool {
    CSS_PROPS_WITH_IMAGE_URLS
        .iter()
        .any(|p| prop_name.eq_ignore_ascii_case(p))
}

/// CSS 前缀必须是 `[A-Za-z][A-Za-z0-9_-]*`
pub fn is_valid_css_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// 给 `class` 属性中的每个类名加上前缀，已带前缀的保持不变
pub fn prefix_class_list(value: &str, prefix: &str) -> String {
    let marker = format!("{}-", prefix);
    value
        .split_ascii_whitespace()
        .map(|class| {
            if class.starts_with(&marker) {
                class.to_string()
            } else {
                format!("{}{}", marker, class)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 净化样式文本
pub fn sanitize_css(
    css: &str,
    context: CssContext,
    table: &PolicyTable,
    options: &CssOptions<'_>,
) -> CssOutput {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let nodes = parse_nodes(&mut parser, 0);

    let mut sanitizer = CssSanitizer {
        table,
        options,
        report: Report::default(),
    };
    let css = match context {
        CssContext::Inline => sanitizer.declarations(&nodes),
        CssContext::Block => sanitizer.rules(&nodes, RuleMode::Scoped),
    };

    CssOutput {
        css,
        report: sanitizer.report,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Parenthesis,
    Square,
    Curly,
}

/// 分词树的节点
#[derive(Debug, Clone)]
enum CssNode<'i> {
    Token(Token<'i>),
    Function(CowRcStr<'i>, Vec<CssNode<'i>>),
    Block(BlockKind, Vec<CssNode<'i>>),
}

impl CssNode<'_> {
    fn is_trivia(&self) -> bool {
        matches!(
            self,
            CssNode::Token(Token::WhiteSpace(_) | Token::Comment(_) | Token::CDO | Token::CDC)
        )
    }
}

fn parse_nodes<'i>(parser: &mut Parser<'i, '_>, depth: usize) -> Vec<CssNode<'i>> {
    let mut nodes = Vec::new();

    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        let node = match token {
            Token::Function(name) => CssNode::Function(name, parse_block(parser, depth)),
            Token::ParenthesisBlock => {
                CssNode::Block(BlockKind::Parenthesis, parse_block(parser, depth))
            }
            Token::SquareBracketBlock => CssNode::Block(BlockKind::Square, parse_block(parser, depth)),
            Token::CurlyBracketBlock => CssNode::Block(BlockKind::Curly, parse_block(parser, depth)),
            other => CssNode::Token(other),
        };
        nodes.push(node);
    }

    nodes
}

fn parse_block<'i>(parser: &mut Parser<'i, '_>, depth: usize) -> Vec<CssNode<'i>> {
    if depth >= MAX_NESTING_DEPTH {
        // 不进入块时 cssparser 会自动跳过它
        return Vec::new();
    }
    parser
        .parse_nested_block(|nested| Ok::<_, ParseError<'i, ()>>(parse_nodes(nested, depth + 1)))
        .unwrap_or_default()
}

/// 规则列表的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleMode {
    /// 普通规则：选择器按前缀限定作用域
    Scoped,
    /// `@keyframes` 内部：`from`/`to`/百分比，不做前缀处理
    Keyframes,
}

/// 声明被删除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    Markup,
    BadToken,
    DeniedProperty,
    DeniedFunction,
    Url(StripReason),
    Malformed,
}

struct CssSanitizer<'a> {
    table: &'a PolicyTable,
    options: &'a CssOptions<'a>,
    report: Report,
}

impl CssSanitizer<'_> {
    fn record(&mut self, what: &str, violation: Violation) {
        debug!("丢弃 CSS {} ({:?})", what, violation);
        self.report.css_removed += 1;
        if let Violation::Url(reason) = violation {
            self.report.urls_removed += 1;
            if reason == StripReason::ExternalImage {
                self.report.images_dropped += 1;
            }
        }
    }

    /// 规则列表
    fn rules(&mut self, nodes: &[CssNode<'_>], mode: RuleMode) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut prelude: Vec<&CssNode<'_>> = Vec::new();

        for node in nodes {
            match node {
                CssNode::Block(BlockKind::Curly, body) => {
                    if let Some(rule) = self.rule(&prelude, body, mode) {
                        out.push(rule);
                    }
                    prelude.clear();
                }
                CssNode::Token(Token::Semicolon) => {
                    // 语句形式的 at-rule（`@import`、`@charset`、`@namespace`）一律删除
                    if prelude.iter().any(|n| !n.is_trivia()) {
                        let text = serialize_nodes(&prelude);
                        self.record(&text, Violation::Malformed);
                    }
                    prelude.clear();
                }
                CssNode::Token(Token::CDO | Token::CDC) => {}
                other => prelude.push(other),
            }
        }

        if prelude.iter().any(|n| !n.is_trivia()) {
            let text = serialize_nodes(&prelude);
            self.record(&text, Violation::Malformed);
        }

        out.join("\n")
    }

    fn rule(
        &mut self,
        prelude: &[&CssNode<'_>],
        body: &[CssNode<'_>],
        mode: RuleMode,
    ) -> Option<String> {
        let mut significant = prelude.iter().skip_while(|n| n.is_trivia());

        if let Some(CssNode::Token(Token::AtKeyword(name))) = significant.clone().next() {
            significant.next();
            let rest: Vec<&CssNode<'_>> = significant.copied().collect();
            return self.at_rule(name, &rest, body, mode);
        }

        let selector = match self.selector(prelude, mode) {
            Ok(selector) if !selector.is_empty() => selector,
            Ok(_) => {
                self.record("空选择器", Violation::Malformed);
                return None;
            }
            Err(violation) => {
                self.record("选择器", violation);
                return None;
            }
        };

        let before = self.report.css_removed;
        let declarations = self.declarations(body);
        self.non_empty_block(&selector, &declarations, before)
    }

    /// 内容被净化删空的规则整体去掉；原本就是空的规则保持原样
    fn non_empty_block(&self, head: &str, inner: &str, removed_before: usize) -> Option<String> {
        if inner.is_empty() && self.report.css_removed > removed_before {
            debug!("规则 {} 净化后为空，整体删除", head);
            return None;
        }
        Some(wrap_block(head, inner))
    }

    fn at_rule(
        &mut self,
        name: &str,
        prelude: &[&CssNode<'_>],
        body: &[CssNode<'_>],
        mode: RuleMode,
    ) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let base = ["-webkit-", "-moz-", "-o-", "-ms-"]
            .iter()
            .find_map(|vendor| name.strip_prefix(vendor))
            .unwrap_or(&name);

        if !self.table.allows_at_rule(base) {
            self.record(&format!("@{}", name), Violation::DeniedFunction);
            return None;
        }

        let prelude_css = match self.value(prelude, "") {
            Ok(css) => css,
            Err(violation) => {
                self.record(&format!("@{}", name), violation);
                return None;
            }
        };

        let before = self.report.css_removed;
        let inner = match base {
            "keyframes" => self.rules(body, RuleMode::Keyframes),
            "font-face" | "page" => self.declarations(body),
            _ => self.rules(body, mode),
        };

        let head = if prelude_css.is_empty() {
            format!("@{}", name)
        } else {
            format!("@{} {}", name, prelude_css)
        };
        self.non_empty_block(&head, &inner, before)
    }

    /// 声明列表
    fn declarations(&mut self, nodes: &[CssNode<'_>]) -> String {
        let mut kept = Vec::new();

        for segment in nodes.split(|n| matches!(n, CssNode::Token(Token::Semicolon))) {
            if segment.iter().all(CssNode::is_trivia) {
                continue;
            }
            match self.declaration(segment) {
                Ok(declaration) => kept.push(declaration),
                Err((what, violation)) => self.record(&what, violation),
            }
        }

        kept.join("; ")
    }

    fn declaration(&self, segment: &[CssNode<'_>]) -> Result<String, (String, Violation)> {
        let name = match segment.iter().find(|n| !n.is_trivia()) {
            Some(CssNode::Token(Token::Ident(name))) => (**name).to_string(),
            _ => return Err((serialize_nodes(segment), Violation::Malformed)),
        };
        let colon = segment
            .iter()
            .position(|n| matches!(n, CssNode::Token(Token::Colon)));
        let Some(colon) = colon else {
            return Err((name, Violation::Malformed));
        };
        // 名字与冒号之间只能有空白
        let between_ok = segment[..colon]
            .iter()
            .filter(|n| !n.is_trivia())
            .count()
            == 1;
        if !between_ok {
            return Err((name, Violation::Malformed));
        }

        if self.table.denies_css_property(&name) {
            return Err((name, Violation::DeniedProperty));
        }

        let value_nodes: Vec<&CssNode<'_>> = segment[colon + 1..].iter().collect();
        let value = self
            .value(&value_nodes, &name)
            .map_err(|violation| (name.clone(), violation))?;
        if value.is_empty() {
            return Err((name, Violation::Malformed));
        }

        Ok(format!("{}: {}", format_ident(&name), value))
    }

    /// 校验并序列化一个值（声明值或 at-rule 前导）
    fn value(&self, nodes: &[&CssNode<'_>], property: &str) -> Result<String, Violation> {
        let flat = flatten(nodes);
        if self
            .table
            .denied_css_functions
            .iter()
            .any(|f| flat.contains(&format!("{}(", f)))
            || flat.contains("expression(")
        {
            return Err(Violation::DeniedFunction);
        }

        let mut out = String::new();
        for node in nodes {
            self.value_node(node, property, &mut out)?;
        }
        Ok(out.trim().to_string())
    }

    fn value_node(&self, node: &CssNode<'_>, property: &str, out: &mut String) -> Result<(), Violation> {
        match node {
            CssNode::Token(token) => match token {
                Token::Delim('<') => return Err(Violation::Markup),
                Token::BadUrl(_) => return Err(Violation::Url(StripReason::Suspicious)),
                Token::BadString(_)
                | Token::CloseParenthesis
                | Token::CloseSquareBracket
                | Token::CloseCurlyBracket => return Err(Violation::BadToken),
                Token::UnquotedUrl(url) => {
                    self.check_url(url, property)?;
                    out.push_str("url(");
                    out.push_str(&format_quoted_string(url));
                    out.push(')');
                }
                _ => push_token(token, out),
            },
            CssNode::Function(name, args) => {
                if self.table.denies_css_function(name) {
                    return Err(Violation::DeniedFunction);
                }
                let lower = name.to_ascii_lowercase();
                let url_function = matches!(lower.as_str(), "url" | "src");
                let image_function = matches!(lower.as_str(), "image" | "image-set" | "-webkit-image-set");

                out.push_str(&format_ident(name));
                out.push('(');
                for arg in args {
                    if let CssNode::Token(Token::QuotedString(url)) = arg {
                        if url_function || image_function {
                            self.check_url(url, property)?;
                        }
                    }
                    self.value_node(arg, property, out)?;
                }
                if url_function && !args.iter().any(|a| !a.is_trivia()) {
                    return Err(Violation::Malformed);
                }
                trim_trailing_space(out);
                out.push(')');
            }
            CssNode::Block(BlockKind::Curly, _) => return Err(Violation::Malformed),
            CssNode::Block(kind, children) => {
                let (open, close) = match kind {
                    BlockKind::Square => ('[', ']'),
                    _ => ('(', ')'),
                };
                out.push(open);
                for child in children {
                    self.value_node(child, property, out)?;
                }
                trim_trailing_space(out);
                out.push(close);
            }
        }
        Ok(())
    }

    fn check_url(&self, url: &str, property: &str) -> Result<(), Violation> {
        let decoded = DecodedValue::from_decoded(url);
        let image_context = property.is_empty() || is_image_url_prop(property);
        self.table
            .check_uri(&decoded, image_context, self.options.drop_external_images && image_context)
            .map_err(Violation::Url)
    }

    /// 选择器：逐个逗号分隔的部分序列化、改写类名，并按前缀限定作用域
    fn selector(&self, prelude: &[&CssNode<'_>], mode: RuleMode) -> Result<String, Violation> {
        let prefix = match mode {
            RuleMode::Scoped => self.options.prefix,
            RuleMode::Keyframes => None,
        };

        let mut parts = Vec::new();
        for part in prelude.split(|n| matches!(n, CssNode::Token(Token::Comma))) {
            let mut out = String::new();
            let mut type_position = true;
            serialize_selector(part, prefix, &mut out, &mut type_position)?;
            let text = out.trim().to_string();
            if text.is_empty() {
                return Err(Violation::Malformed);
            }
            parts.push(scope_selector(text, prefix));
        }

        Ok(parts.join(", "))
    }
}

fn serialize_selector(
    nodes: &[&CssNode<'_>],
    prefix: Option<&str>,
    out: &mut String,
    type_position: &mut bool,
) -> Result<(), Violation> {
    let mut i = 0;
    while i < nodes.len() {
        match nodes[i] {
            CssNode::Token(Token::Delim('<')) => return Err(Violation::Markup),
            CssNode::Token(
                Token::BadUrl(_)
                | Token::BadString(_)
                | Token::UnquotedUrl(_)
                | Token::CloseParenthesis
                | Token::CloseSquareBracket
                | Token::CloseCurlyBracket
                | Token::AtKeyword(_)
                | Token::Semicolon,
            ) => return Err(Violation::BadToken),
            CssNode::Token(Token::Delim('.')) => {
                let Some(CssNode::Token(Token::Ident(class))) = nodes.get(i + 1) else {
                    return Err(Violation::Malformed);
                };
                out.push('.');
                match prefix {
                    Some(prefix) if !class.starts_with(&format!("{}-", prefix)) => {
                        out.push_str(&format_ident(&format!("{}-{}", prefix, &**class)));
                    }
                    _ => out.push_str(&format_ident(class)),
                }
                *type_position = false;
                i += 2;
                continue;
            }
            CssNode::Token(Token::Ident(name)) if *type_position => {
                let is_root = name.eq_ignore_ascii_case("body") || name.eq_ignore_ascii_case("html");
                match prefix {
                    Some(prefix) if is_root => {
                        out.push('#');
                        out.push_str(&format_ident(prefix));
                    }
                    _ => out.push_str(&format_ident(name)),
                }
                *type_position = false;
            }
            CssNode::Token(Token::WhiteSpace(_) | Token::Comment(_)) => {
                push_space(out);
                *type_position = true;
            }
            CssNode::Token(token @ Token::Delim('>' | '+' | '~')) => {
                push_token(token, out);
                *type_position = true;
            }
            CssNode::Token(Token::QuotedString(value)) => {
                out.push_str(&format_quoted_string(value));
                *type_position = false;
            }
            CssNode::Token(token) => {
                push_token(token, out);
                *type_position = false;
            }
            CssNode::Function(name, args) => {
                let lower = name.to_ascii_lowercase();
                if lower == "url" || lower.contains("expression") {
                    return Err(Violation::DeniedFunction);
                }
                out.push_str(&format_ident(name));
                out.push('(');
                let args: Vec<&CssNode<'_>> = args.iter().collect();
                let mut inner_type_position = true;
                serialize_selector(&args, prefix, out, &mut inner_type_position)?;
                trim_trailing_space(out);
                out.push(')');
                *type_position = false;
            }
            CssNode::Block(BlockKind::Square, children) => {
                // 属性选择器内部不做类名改写
                let children: Vec<&CssNode<'_>> = children.iter().collect();
                out.push('[');
                let mut inner_type_position = false;
                serialize_selector(&children, None, out, &mut inner_type_position)?;
                trim_trailing_space(out);
                out.push(']');
                *type_position = false;
            }
            CssNode::Block(_, _) => return Err(Violation::Malformed),
        }
        i += 1;
    }
    Ok(())
}

/// 给选择器加上 `#prefix ` 作用域；已经以 `#prefix` 开头的保持不变
fn scope_selector(selector: String, prefix: Option<&str>) -> String {
    let Some(prefix) = prefix else {
        return selector;
    };
    let scope = format!("#{}", format_ident(prefix));
    let scoped = selector
        .strip_prefix(&scope)
        .is_some_and(|rest| rest.is_empty() || !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    if scoped {
        selector
    } else {
        format!("{} {}", scope, selector)
    }
}

fn wrap_block(head: &str, inner: &str) -> String {
    if inner.is_empty() {
        format!("{} {{}}", head)
    } else {
        format!("{} {{ {} }}", head, inner)
    }
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('(') && !out.ends_with('[') {
        out.push(' ');
    }
}

fn trim_trailing_space(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

fn push_token(token: &Token<'_>, out: &mut String) {
    match token {
        Token::WhiteSpace(_) | Token::Comment(_) | Token::CDO | Token::CDC => push_space(out),
        Token::QuotedString(value) => out.push_str(&format_quoted_string(value)),
        other => out.push_str(&other.to_css_string()),
    }
}

/// 去掉注释与空白后的小写文本，用于识别被注释拆开的关键字
fn flatten(nodes: &[&CssNode<'_>]) -> String {
    let mut out = String::new();
    for node in nodes {
        flatten_node(node, &mut out);
    }
    out.to_ascii_lowercase()
}

fn flatten_node(node: &CssNode<'_>, out: &mut String) {
    match node {
        CssNode::Token(Token::WhiteSpace(_) | Token::Comment(_)) => {}
        CssNode::Token(Token::Ident(value)) => out.push_str(value),
        CssNode::Token(Token::QuotedString(value)) => out.push_str(value),
        CssNode::Token(Token::UnquotedUrl(value)) => out.push_str(value),
        CssNode::Token(token) => out.push_str(&token.to_css_string()),
        CssNode::Function(name, args) => {
            out.push_str(name);
            out.push('(');
            for arg in args {
                flatten_node(arg, out);
            }
            out.push(')');
        }
        CssNode::Block(_, children) => {
            out.push('(');
            for child in children {
                flatten_node(child, out);
            }
            out.push(')');
        }
    }
}

fn serialize_nodes<'i, N: Borrow<CssNode<'i>>>(nodes: &[N]) -> String {
    let mut out = String::new();
    for node in nodes {
        flatten_node(node.borrow(), &mut out);
    }
    out
}
