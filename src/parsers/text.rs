//! 纯文本转 HTML
//!
//! 用于把纯文本邮件（包括带 `>` 引用标记的回复）转换为可以直接显示的 HTML：
//!
//! - 文本一律转义，安全的链接包装成锚点（见 `linkify`）；
//! - 开启引用标记时，`>` 前缀按层级转换为嵌套的 `<blockquote type="cite">`；
//! - 整行是 `<!--前缀...-->` 且前缀与本次调用给出的前缀完全一致时，该行原样输出；
//!   前缀不一致的标记行和普通文本一样转义；
//! - `line_length` 大于 0 时，超长的行在空白处软换行（插入 `<br>`），单词本身不拆开。

use crate::core::SanitizeResult;

use super::linkify::linkify_into;

/// `html_format` 的选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// 把行首的 `>` 当作引用标记
    pub quote_markers: bool,
    /// 锚点注释的前缀；为空时不识别任何锚点注释
    pub anchor_marker_prefix: String,
    /// 软换行宽度（字符数），0 表示不换行
    pub line_length: usize,
}

/// 把纯文本转换为 HTML
pub fn html_format(
    plain: &str,
    with_quote_markers: bool,
    anchor_marker_prefix: &str,
    line_length: usize,
) -> SanitizeResult {
    let options = FormatOptions {
        quote_markers: with_quote_markers,
        anchor_marker_prefix: anchor_marker_prefix.to_string(),
        line_length,
    };
    html_format_with(plain, &options)
}

pub fn html_format_with(plain: &str, options: &FormatOptions) -> SanitizeResult {
    let mut out = String::with_capacity(plain.len() + plain.len() / 4);
    let mut depth = 0usize;
    let mut first_in_group = true;

    for raw_line in plain.lines() {
        let (line_depth, body) = if options.quote_markers {
            split_quote(raw_line)
        } else {
            (0, raw_line)
        };

        while depth < line_depth {
            out.push_str("<blockquote type=\"cite\">");
            depth += 1;
            first_in_group = true;
        }
        while depth > line_depth {
            out.push_str("</blockquote>");
            depth -= 1;
            first_in_group = true;
        }

        if !first_in_group {
            out.push_str("<br>");
        }
        first_in_group = false;

        format_line(body, options, &mut out);
    }

    while depth > 0 {
        out.push_str("</blockquote>");
        depth -= 1;
    }

    SanitizeResult {
        modified: out != plain,
        content: out,
        ..SanitizeResult::default()
    }
}

/// 拆出行首的引用层级；`> > x` 与 `>>x` 都是两层
fn split_quote(line: &str) -> (usize, &str) {
    let mut depth = 0;
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start_matches(' ');
        match trimmed.strip_prefix('>') {
            Some(after) => {
                depth += 1;
                rest = after;
            }
            None => break,
        }
    }
    if depth == 0 {
        return (0, line);
    }
    (depth, rest.strip_prefix(' ').unwrap_or(rest))
}

fn format_line(line: &str, options: &FormatOptions, out: &mut String) {
    if let Some(block) = anchor_block(line, &options.anchor_marker_prefix) {
        out.push_str(block);
        return;
    }

    for (i, segment) in soft_wrap(line, options.line_length).into_iter().enumerate() {
        if i > 0 {
            out.push_str("<br>");
        }
        linkify_into(segment, "", out);
    }
}

/// 整行是否是前缀匹配的锚点注释
fn anchor_block<'l>(line: &'l str, prefix: &str) -> Option<&'l str> {
    if prefix.is_empty() || prefix.starts_with(['>', '-']) {
        return None;
    }
    let block = line.trim();
    let inner = block.strip_prefix("<!--")?.strip_suffix("-->")?;
    if !inner.starts_with(prefix) || inner.contains("-->") || inner.contains("--!>") {
        return None;
    }
    Some(block)
}

/// 在空白处把超长的行切开
fn soft_wrap(line: &str, width: usize) -> Vec<&str> {
    if width == 0 || line.chars().count() <= width {
        return vec![line];
    }

    let mut parts = Vec::new();
    let mut rest = line;
    while rest.chars().count() > width {
        let limit = rest
            .char_indices()
            .nth(width)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let split = if rest[limit..].starts_with(' ') {
            Some(limit)
        } else {
            rest[..limit]
                .rfind(' ')
                .filter(|&i| i > 0)
                .or_else(|| rest[limit..].find(' ').map(|i| i + limit))
        };

        let Some(split) = split else {
            break;
        };
        parts.push(&rest[..split]);
        rest = rest[split + 1..].trim_start_matches(' ');
    }
    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest);
    }
    parts
}
