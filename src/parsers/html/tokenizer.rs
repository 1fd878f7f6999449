//! 流式标签扫描器
//!
//! 宽松的流式解析后端。扫描器是一个显式的有限状态机（`State`），每个浏览器怪癖
//! 都是一个有名字、可测试的状态，而不是散落在各处的标志位：
//!
//! - `<!-->` 与 `<!--->` 是完整的空注释，其后的内容是活动标记（与浏览器一致）；
//! - 注释在第一个 `-->` 或 `--!>` 处结束，未终止的注释一直延伸到输入结尾；
//! - `<!foo>`、`<?foo>`、`</ foo>`、`<![CDATA[..]]>` 都是伪注释（bogus comment），在第一个 `>` 处结束；
//! - raw text 元素（`<style>`、`<script>` 等）的内容只在匹配的结束标签处终止，
//!   内部的 `<![CDATA[`、`</script` 相似串都当作普通字符；
//! - 输入结尾处未闭合的标签被丢弃。
//!
//! 唯一的致命情况是带歧义的服务端脚本块，见 [`check_server_block`]。

use std::collections::VecDeque;

use crate::error::{SanitizeError, ScrubResult};

use super::entities::decode_text;
use super::token::{Attribute, QuoteStyle, StartTag, Token};
use super::utils::{is_raw_text_element, is_rcdata_element, is_whitespace_byte};

/// 扫描器状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Data,
    TagOpen,
    EndTagOpen,
    TagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValue(QuoteStyle),
    AfterAttributeValueQuoted,
    SelfClosingStartTag,
    MarkupDeclarationOpen,
    Comment,
    BogusComment,
    Doctype,
    RawText,
    Plaintext,
    Done,
    Failed,
}

/// 流式扫描器，惰性地产出 token；每次调用 `tokenize` 都从头开始
pub struct StreamingTokenizer<'a> {
    input: &'a str,
    pos: usize,
    state: State,
    queue: VecDeque<Token>,
    /// 尚未输出的文本起点
    text_start: usize,
    /// 当前 `<` 的位置
    tag_start: usize,
    name_start: usize,
    is_end_tag: bool,
    tag: StartTag,
    attr_name: String,
    value_start: usize,
    raw_text_element: String,
}

impl<'a> StreamingTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            state: State::Data,
            queue: VecDeque::new(),
            text_start: 0,
            tag_start: 0,
            name_start: 0,
            is_end_tag: false,
            tag: StartTag::new(""),
            attr_name: String::new(),
            value_start: 0,
            raw_text_element: String::new(),
        }
    }

    /// 当前状态（测试与调试用）
    pub fn state(&self) -> State {
        self.state
    }

    /// 只做结构校验：完整扫描一遍输入，报告第一个致命错误
    pub fn validate(input: &str) -> ScrubResult<()> {
        for token in StreamingTokenizer::new(input) {
            token?;
        }
        Ok(())
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.input.as_bytes().get(at).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn flush_text(&mut self, end: usize) {
        if self.text_start < end {
            let text = decode_text(&self.input[self.text_start..end]);
            self.queue.push_back(Token::Text(text));
        }
        self.text_start = end;
    }

    /// 把 `[text_start..]` 全部作为文本输出并结束
    fn finish_with_text(&mut self) {
        self.flush_text(self.input.len());
        self.pos = self.input.len();
        self.state = State::Done;
    }

    /// 输入在标签内部结束：浏览器丢弃这个标签
    fn drop_unterminated_tag(&mut self) {
        self.text_start = self.input.len();
        self.pos = self.input.len();
        self.state = State::Done;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.byte(self.pos), Some(b) if is_whitespace_byte(b)) {
            self.pos += 1;
        }
    }

    fn commit_attribute(&mut self, raw: &str, quote: QuoteStyle) {
        if self.attr_name.is_empty() {
            return;
        }
        let name = std::mem::take(&mut self.attr_name);
        if !self.is_end_tag {
            self.tag.push_attr(Attribute::from_raw(&name, raw, quote));
        }
    }

    fn emit_tag(&mut self) {
        // 越过 '>'
        self.pos += 1;
        self.text_start = self.pos;

        let tag = std::mem::replace(&mut self.tag, StartTag::new(""));
        if self.is_end_tag {
            self.queue.push_back(Token::EndTag(tag.name));
            self.state = State::Data;
            return;
        }

        let name = tag.name.clone();
        self.queue.push_back(Token::StartTag(tag));

        // 自闭合标志对非空元素无效，raw text 状态照常进入
        if name == "plaintext" {
            self.state = State::Plaintext;
        } else if is_raw_text_element(&name) || is_rcdata_element(&name) {
            self.raw_text_element = name;
            self.state = State::RawText;
        } else {
            self.state = State::Data;
        }
    }

    fn emit_comment(&mut self, content_start: usize, content_end: usize, resume_at: usize) {
        let content = self.input[content_start..content_end].to_string();
        self.queue.push_back(Token::Comment(content));
        self.pos = resume_at;
        self.text_start = resume_at;
        self.state = if resume_at >= self.input.len() {
            State::Done
        } else {
            State::Data
        };
    }

    /// 执行一次状态转移
    fn step(&mut self) -> ScrubResult<()> {
        match self.state {
            State::Data => match self.rest().find('<') {
                Some(offset) => {
                    self.tag_start = self.pos + offset;
                    self.pos = self.tag_start + 1;
                    self.state = State::TagOpen;
                }
                None => self.finish_with_text(),
            },

            State::TagOpen => match self.byte(self.pos) {
                Some(b'!') => {
                    self.pos += 1;
                    self.state = State::MarkupDeclarationOpen;
                }
                Some(b'/') => {
                    self.pos += 1;
                    self.state = State::EndTagOpen;
                }
                Some(b) if b.is_ascii_alphabetic() => {
                    self.flush_text(self.tag_start);
                    self.is_end_tag = false;
                    self.name_start = self.pos;
                    self.state = State::TagName;
                }
                Some(b'?') => {
                    self.flush_text(self.tag_start);
                    self.state = State::BogusComment;
                }
                Some(b'%') => {
                    check_server_block(self.input, self.tag_start)?;
                    // 浏览器把 `<%` 当作普通文本
                    self.state = State::Data;
                }
                Some(_) => self.state = State::Data,
                None => self.finish_with_text(),
            },

            State::EndTagOpen => match self.byte(self.pos) {
                Some(b) if b.is_ascii_alphabetic() => {
                    self.flush_text(self.tag_start);
                    self.is_end_tag = true;
                    self.name_start = self.pos;
                    self.state = State::TagName;
                }
                Some(b'>') => {
                    // `</>` 被整体忽略
                    self.flush_text(self.tag_start);
                    self.pos += 1;
                    self.text_start = self.pos;
                    self.state = State::Data;
                }
                Some(_) => {
                    self.flush_text(self.tag_start);
                    self.state = State::BogusComment;
                }
                None => self.finish_with_text(),
            },

            State::TagName => {
                let input = self.input;
                let bytes = input.as_bytes();
                while self.pos < bytes.len()
                    && !is_whitespace_byte(bytes[self.pos])
                    && bytes[self.pos] != b'/'
                    && bytes[self.pos] != b'>'
                {
                    self.pos += 1;
                }
                if self.pos >= bytes.len() {
                    self.drop_unterminated_tag();
                    return Ok(());
                }

                self.tag = StartTag::new(&input[self.name_start..self.pos]);
                self.state = match bytes[self.pos] {
                    b'/' => {
                        self.pos += 1;
                        State::SelfClosingStartTag
                    }
                    b'>' => {
                        self.emit_tag();
                        return Ok(());
                    }
                    _ => State::BeforeAttributeName,
                };
            }

            State::BeforeAttributeName => {
                self.skip_whitespace();
                match self.byte(self.pos) {
                    None => self.drop_unterminated_tag(),
                    Some(b'/') => {
                        self.pos += 1;
                        self.state = State::SelfClosingStartTag;
                    }
                    Some(b'>') => self.emit_tag(),
                    Some(_) => {
                        // 以 '=' 开头的属性名把 '=' 算作名字的一部分
                        self.name_start = self.pos;
                        self.pos += 1;
                        self.state = State::AttributeName;
                    }
                }
            }

            State::AttributeName => {
                let input = self.input;
                let bytes = input.as_bytes();
                while self.pos < bytes.len()
                    && !is_whitespace_byte(bytes[self.pos])
                    && !matches!(bytes[self.pos], b'/' | b'>' | b'=')
                {
                    self.pos += 1;
                }
                if self.pos >= bytes.len() {
                    self.drop_unterminated_tag();
                    return Ok(());
                }

                self.attr_name = input[self.name_start..self.pos].to_ascii_lowercase();
                match bytes[self.pos] {
                    b'=' => {
                        self.pos += 1;
                        self.state = State::BeforeAttributeValue;
                    }
                    b'/' => {
                        self.commit_attribute("", QuoteStyle::Empty);
                        self.pos += 1;
                        self.state = State::SelfClosingStartTag;
                    }
                    b'>' => {
                        self.commit_attribute("", QuoteStyle::Empty);
                        self.emit_tag();
                    }
                    _ => self.state = State::AfterAttributeName,
                }
            }

            State::AfterAttributeName => {
                self.skip_whitespace();
                match self.byte(self.pos) {
                    None => self.drop_unterminated_tag(),
                    Some(b'=') => {
                        self.pos += 1;
                        self.state = State::BeforeAttributeValue;
                    }
                    Some(b'/') => {
                        self.commit_attribute("", QuoteStyle::Empty);
                        self.pos += 1;
                        self.state = State::SelfClosingStartTag;
                    }
                    Some(b'>') => {
                        self.commit_attribute("", QuoteStyle::Empty);
                        self.emit_tag();
                    }
                    Some(_) => {
                        self.commit_attribute("", QuoteStyle::Empty);
                        self.name_start = self.pos;
                        self.pos += 1;
                        self.state = State::AttributeName;
                    }
                }
            }

            State::BeforeAttributeValue => {
                self.skip_whitespace();
                match self.byte(self.pos) {
                    None => self.drop_unterminated_tag(),
                    Some(b'"') => {
                        self.pos += 1;
                        self.value_start = self.pos;
                        self.state = State::AttributeValue(QuoteStyle::Double);
                    }
                    Some(b'\'') => {
                        self.pos += 1;
                        self.value_start = self.pos;
                        self.state = State::AttributeValue(QuoteStyle::Single);
                    }
                    Some(b'`') => {
                        self.pos += 1;
                        self.value_start = self.pos;
                        self.state = State::AttributeValue(QuoteStyle::Backtick);
                    }
                    Some(b'>') => {
                        self.commit_attribute("", QuoteStyle::Empty);
                        self.emit_tag();
                    }
                    Some(_) => {
                        self.value_start = self.pos;
                        self.state = State::AttributeValue(QuoteStyle::Unquoted);
                    }
                }
            }

            State::AttributeValue(QuoteStyle::Unquoted) => {
                let input = self.input;
                let bytes = input.as_bytes();
                while self.pos < bytes.len()
                    && !is_whitespace_byte(bytes[self.pos])
                    && bytes[self.pos] != b'>'
                {
                    self.pos += 1;
                }
                if self.pos >= bytes.len() {
                    self.drop_unterminated_tag();
                    return Ok(());
                }

                let raw = &input[self.value_start..self.pos];
                self.commit_attribute(raw, QuoteStyle::Unquoted);
                if bytes[self.pos] == b'>' {
                    self.emit_tag();
                } else {
                    self.state = State::BeforeAttributeName;
                }
            }

            State::AttributeValue(quote) => {
                let delimiter = match quote {
                    QuoteStyle::Single => '\'',
                    QuoteStyle::Backtick => '`',
                    _ => '"',
                };
                let input = self.input;
                match input[self.value_start..].find(delimiter) {
                    Some(offset) => {
                        let end = self.value_start + offset;
                        let raw = &input[self.value_start..end];
                        self.commit_attribute(raw, quote);
                        self.pos = end + 1;
                        self.state = State::AfterAttributeValueQuoted;
                    }
                    None if quote == QuoteStyle::Backtick => {
                        // 没有闭合的反引号：按无引号值重新扫描（反引号本身属于值）
                        self.value_start -= 1;
                        self.pos = self.value_start;
                        self.state = State::AttributeValue(QuoteStyle::Unquoted);
                    }
                    None => self.drop_unterminated_tag(),
                }
            }

            State::AfterAttributeValueQuoted => match self.byte(self.pos) {
                None => self.drop_unterminated_tag(),
                Some(b'/') => {
                    self.pos += 1;
                    self.state = State::SelfClosingStartTag;
                }
                Some(b'>') => self.emit_tag(),
                Some(_) => self.state = State::BeforeAttributeName,
            },

            State::SelfClosingStartTag => match self.byte(self.pos) {
                None => self.drop_unterminated_tag(),
                Some(b'>') => {
                    self.tag.self_closing = true;
                    self.emit_tag();
                }
                Some(_) => self.state = State::BeforeAttributeName,
            },

            State::MarkupDeclarationOpen => {
                let rest = self.rest();
                self.flush_text(self.tag_start);
                if rest.starts_with("--") {
                    self.pos += 2;
                    self.state = State::Comment;
                } else if rest.get(..7).is_some_and(|s| s.eq_ignore_ascii_case("doctype")) {
                    self.pos += 7;
                    self.state = State::Doctype;
                } else {
                    // 包括 HTML 命名空间里的 `<![CDATA[`
                    self.state = State::BogusComment;
                }
            }

            State::Comment => {
                let start = self.pos;
                let rest = self.rest();
                if rest.starts_with('>') {
                    // `<!-->`
                    self.emit_comment(start, start, start + 1);
                } else if rest.starts_with("->") {
                    // `<!--->`
                    self.emit_comment(start, start, start + 2);
                } else {
                    let end = [rest.find("-->").map(|i| (i, 3)), rest.find("--!>").map(|i| (i, 4))]
                        .into_iter()
                        .flatten()
                        .min_by_key(|(i, _)| *i);
                    match end {
                        Some((offset, len)) => {
                            self.emit_comment(start, start + offset, start + offset + len)
                        }
                        None => self.emit_comment(start, self.input.len(), self.input.len()),
                    }
                }
            }

            State::BogusComment => {
                let start = self.pos;
                match self.rest().find('>') {
                    Some(offset) => self.emit_comment(start, start + offset, start + offset + 1),
                    None => self.emit_comment(start, self.input.len(), self.input.len()),
                }
            }

            State::Doctype => {
                let start = self.pos;
                let (end, resume) = match self.rest().find('>') {
                    Some(offset) => (start + offset, start + offset + 1),
                    None => (self.input.len(), self.input.len()),
                };
                let content = self.input[start..end].trim().to_string();
                self.queue.push_back(Token::Doctype(content));
                self.pos = resume;
                self.text_start = resume;
                self.state = State::Data;
            }

            State::RawText => {
                let start = self.pos;
                let element = std::mem::take(&mut self.raw_text_element);
                let input = self.input;
                let end = find_end_tag(input, start, &element);
                let content = &input[start..end];

                if !content.is_empty() {
                    let token = if is_rcdata_element(&element) {
                        Token::Text(decode_text(content))
                    } else {
                        Token::CData(content.to_string())
                    };
                    self.queue.push_back(token);
                }

                self.pos = end;
                self.text_start = end;
                if end >= self.input.len() {
                    self.state = State::Done;
                } else {
                    // 结束标签交给常规流程解析
                    self.tag_start = end;
                    self.pos = end + 2;
                    self.state = State::EndTagOpen;
                }
            }

            State::Plaintext => {
                let content = self.rest();
                if !content.is_empty() {
                    self.queue.push_back(Token::CData(content.to_string()));
                }
                self.pos = self.input.len();
                self.text_start = self.pos;
                self.state = State::Done;
            }

            State::Done | State::Failed => {}
        }

        Ok(())
    }
}

impl Iterator for StreamingTokenizer<'_> {
    type Item = ScrubResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Some(Ok(token));
            }
            if matches!(self.state, State::Done | State::Failed) {
                return None;
            }
            if let Err(error) = self.step() {
                self.state = State::Failed;
                self.queue.clear();
                return Some(Err(error));
            }
        }
    }
}

/// 在 `from` 之后查找 `</element` 结束标签，其后必须是空白、`/` 或 `>`；找不到时返回输入长度
fn find_end_tag(input: &str, from: usize, element: &str) -> usize {
    let bytes = input.as_bytes();
    let mut search = from;

    while let Some(offset) = input[search..].find("</") {
        let at = search + offset;
        let name_start = at + 2;
        let name_end = name_start + element.len();

        if name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(element.as_bytes())
            && matches!(bytes.get(name_end), Some(&b) if is_whitespace_byte(b) || b == b'/' || b == b'>')
        {
            return at;
        }
        search = at + 2;
    }

    input.len()
}

/// 检查从 `start`（`<%` 的位置）开始的服务端脚本块是否有歧义
///
/// 浏览器把 `<%` 当作文本，继续把块里的 `<tag attr="...` 当作真实标签读下去，
/// 引号内的 `%>` 不会终止任何东西；服务端模板扫描器却在第一个 `%>` 处结束这个块。
/// 块内打开了标签且在 `%>` 处仍有未闭合的引号时，两种解读给出不同的标签边界，
/// 此时无法安全地猜测，只能报告 `MalformedMarkup`。
pub fn check_server_block(input: &str, start: usize) -> ScrubResult<()> {
    let body_start = start + 2;
    let Some(offset) = input.get(body_start..).and_then(|rest| rest.find("%>")) else {
        return Ok(());
    };
    let body = &input.as_bytes()[body_start..body_start + offset];

    let mut in_tag = false;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < body.len() {
        let b = body[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if !in_tag => {
                if b == b'<' && body.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic()) {
                    in_tag = true;
                }
            }
            None => match b {
                b'>' => in_tag = false,
                b'"' | b'\'' if previous_significant(body, i) == Some(b'=') => quote = Some(b),
                _ => {}
            },
        }
        i += 1;
    }

    if in_tag && quote.is_some() {
        tracing::warn!("服务端脚本块边界有歧义，位置 {}", start);
        return Err(SanitizeError::malformed(
            start,
            "`<%` block ends inside an open quoted attribute value",
        ));
    }

    Ok(())
}

/// `at` 之前第一个非空白字节
fn previous_significant(body: &[u8], at: usize) -> Option<u8> {
    body[..at]
        .iter()
        .rev()
        .copied()
        .find(|b| !is_whitespace_byte(*b))
}
