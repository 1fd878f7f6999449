//! 序列化器
//!
//! 把策略处理后的 token 序列还原为 HTML 文本：文本与属性值重新转义，属性一律使用双引号，
//! 元素与属性保持原有顺序。注释与文档类型声明不输出。

use super::token::Token;
use super::utils::{escape_attribute, escape_text, is_void_element};

/// 序列化结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Serialized {
    pub html: String,
    /// 是否因为长度上限而提前停止
    pub truncated: bool,
}

/// 增量序列化器
///
/// 设置 `max_size` 后，在会超出上限的第一个 token 处停止，并关闭所有仍然打开的元素。
#[derive(Debug, Default)]
pub struct Serializer {
    out: String,
    max_size: Option<usize>,
    open: Vec<String>,
    truncated: bool,
}

impl Serializer {
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    /// 追加一个 token；已截断时返回 `false`
    pub fn push(&mut self, token: &Token) -> bool {
        if self.truncated {
            return false;
        }

        let mut buf = String::new();
        render(token, &mut buf);

        if let Some(max_size) = self.max_size {
            if self.out.len() + buf.len() > max_size {
                self.truncated = true;
                return false;
            }
        }

        match token {
            Token::StartTag(tag) if !is_void_element(&tag.name) => self.open.push(tag.name.clone()),
            Token::EndTag(name) => {
                if let Some(position) = self.open.iter().rposition(|open| open == name) {
                    self.open.truncate(position);
                }
            }
            _ => {}
        }

        self.out.push_str(&buf);
        true
    }

    pub fn finish(mut self) -> Serialized {
        if self.truncated {
            while let Some(name) = self.open.pop() {
                render(&Token::EndTag(name), &mut self.out);
            }
        }
        Serialized {
            html: self.out,
            truncated: self.truncated,
        }
    }
}

/// 序列化整个 token 序列，不设长度上限
pub fn serialize(tokens: &[Token]) -> String {
    serialize_with_limit(tokens, None).html
}

pub fn serialize_with_limit(tokens: &[Token], max_size: Option<usize>) -> Serialized {
    let mut serializer = Serializer::new(max_size);
    for token in tokens {
        if !serializer.push(token) {
            break;
        }
    }
    serializer.finish()
}

fn render(token: &Token, out: &mut String) {
    match token {
        Token::StartTag(tag) => {
            out.push('<');
            out.push_str(&tag.name);
            for attr in &tag.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attribute(&attr.value, out);
                out.push('"');
            }
            out.push('>');
        }
        Token::EndTag(name) => {
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Token::Text(text) => escape_text(text, out),
        // 只有已经净化过的样式块内容会以 CData 到达这里
        Token::CData(data) => out.push_str(data),
        Token::Comment(_) | Token::Doctype(_) => {}
    }
}
