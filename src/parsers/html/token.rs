//! 标记 token 数据模型
//!
//! 两个解析后端（流式扫描器与 html5ever DOM 后端）都产出同一种规范化的 `Token`，
//! 策略引擎因此与后端完全解耦。

use super::entities::DecodedValue;

/// 属性值的引号风格
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `name="value"`
    Double,
    /// `name='value'`
    Single,
    /// `` name=`value` `` (旧版 IE 把反引号当作引号)
    Backtick,
    /// `name=value`
    Unquoted,
    /// 仅有属性名，没有值
    Empty,
}

/// 开始标签中的单个属性
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// 小写化后的属性名
    pub name: String,
    /// 原始（未解码）的属性值文本
    pub raw: String,
    /// 实体解码后的属性值
    pub value: String,
    pub quote: QuoteStyle,
}

impl Attribute {
    /// 由原始文本构造属性，值在这里完成实体解码
    pub fn from_raw(name: &str, raw: &str, quote: QuoteStyle) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            raw: raw.to_string(),
            value: super::entities::decode_attribute(raw),
            quote,
        }
    }

    /// 由已经解码的值构造属性（DOM 后端使用，原始文本不可得）
    pub fn from_decoded(name: &str, value: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            raw: value.to_string(),
            value: value.to_string(),
            quote: QuoteStyle::Double,
        }
    }

    /// 策略判断专用的规范化形式
    pub fn decoded(&self) -> DecodedValue {
        DecodedValue::from_decoded(&self.value)
    }
}

/// 开始标签
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartTag {
    /// 小写化后的标签名
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    /// 追加属性；同名属性（大小写不敏感）只保留第一次出现的那个
    pub fn push_attr(&mut self, attr: Attribute) -> bool {
        if self.attrs.iter().any(|a| a.name == attr.name) {
            return false;
        }
        self.attrs.push(attr);
        true
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn set_attr(&mut self, name: &str, value: Option<String>) {
        match value {
            Some(value) => {
                if let Some(attr) = self.attrs.iter_mut().find(|a| a.name == name) {
                    attr.raw = value.clone();
                    attr.value = value;
                } else {
                    self.attrs.push(Attribute::from_decoded(name, &value));
                }
            }
            None => self.attrs.retain(|a| a.name != name),
        }
    }
}

/// token 的种类，不带负载
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    StartTag,
    EndTag,
    Comment,
    Doctype,
    Text,
    CData,
}

/// 一个标记 token
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    StartTag(StartTag),
    /// 结束标签，标签名已小写化
    EndTag(String),
    Comment(String),
    Doctype(String),
    /// 已完成实体解码的文本
    Text(String),
    /// 原始字符数据：raw text 元素（`<style>`、`<script>` 等）的内容，不做实体解码
    CData(String),
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::StartTag(_) => TokenKind::StartTag,
            Token::EndTag(_) => TokenKind::EndTag,
            Token::Comment(_) => TokenKind::Comment,
            Token::Doctype(_) => TokenKind::Doctype,
            Token::Text(_) => TokenKind::Text,
            Token::CData(_) => TokenKind::CData,
        }
    }

    pub fn start(name: &str) -> Self {
        Token::StartTag(StartTag::new(name))
    }

    pub fn end(name: &str) -> Self {
        Token::EndTag(name.to_ascii_lowercase())
    }
}
