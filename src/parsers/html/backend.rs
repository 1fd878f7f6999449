//! 可替换的解析后端
//!
//! 策略引擎只依赖 `TokenizerBackend` 这一个接口；选择哪个后端由调用方决定，
//! 没有进程级的全局开关。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SanitizeError, ScrubResult};

use super::dom::tokenize_dom;
use super::token::Token;
use super::tokenizer::StreamingTokenizer;

/// 惰性的 token 流
pub type TokenStream<'a> = Box<dyn Iterator<Item = ScrubResult<Token>> + 'a>;

/// 把原始标记转换为规范化 token 流的解析后端
pub trait TokenizerBackend: Send + Sync {
    /// 后端名称（日志用）
    fn name(&self) -> &'static str;

    /// 对输入分词。结构性致命错误既可以立即返回，也可以在流中作为 `Err` 出现。
    fn tokenize<'a>(&self, input: &'a str) -> ScrubResult<TokenStream<'a>>;
}

/// 基于 html5ever 建树的严格后端
#[derive(Debug, Default, Clone, Copy)]
pub struct DomBackend;

impl TokenizerBackend for DomBackend {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn tokenize<'a>(&self, input: &'a str) -> ScrubResult<TokenStream<'a>> {
        let tokens = tokenize_dom(input)?;
        Ok(Box::new(tokens.into_iter().map(Ok)))
    }
}

/// 宽松的流式扫描后端
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamingBackend;

impl TokenizerBackend for StreamingBackend {
    fn name(&self) -> &'static str {
        "streaming"
    }

    fn tokenize<'a>(&self, input: &'a str) -> ScrubResult<TokenStream<'a>> {
        Ok(Box::new(StreamingTokenizer::new(input)))
    }
}

/// 后端选择
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserBackend {
    #[default]
    Dom,
    Streaming,
}

impl ParserBackend {
    pub const ALL: [ParserBackend; 2] = [ParserBackend::Dom, ParserBackend::Streaming];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParserBackend::Dom => "dom",
            ParserBackend::Streaming => "streaming",
        }
    }
}

impl fmt::Display for ParserBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserBackend {
    type Err = SanitizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dom" | "html5ever" => Ok(ParserBackend::Dom),
            "streaming" | "stream" | "lenient" => Ok(ParserBackend::Streaming),
            other => Err(SanitizeError::Configuration(format!(
                "未知的解析后端: {}",
                other
            ))),
        }
    }
}

/// 取得后端实现
pub fn select_backend(backend: ParserBackend) -> &'static dyn TokenizerBackend {
    static DOM: DomBackend = DomBackend;
    static STREAMING: StreamingBackend = StreamingBackend;

    match backend {
        ParserBackend::Dom => &DOM,
        ParserBackend::Streaming => &STREAMING,
    }
}
