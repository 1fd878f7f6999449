//! HTML解析和处理模块
//!
//! - `token`: token 数据模型
//! - `entities`: 字符引用解码
//! - `utils`: 基础常量与转义函数
//! - `tokenizer`: 流式扫描器（显式状态机）
//! - `dom`: html5ever 后端
//! - `backend`: 后端接口与选择
//! - `element_handlers`: 按元素的改写
//! - `walker`: 策略遍历
//! - `serializer`: 序列化

pub mod backend;
pub mod dom;
pub mod element_handlers;
pub mod entities;
pub mod serializer;
pub mod token;
pub mod tokenizer;
pub mod utils;
pub mod walker;

pub use backend::{select_backend, ParserBackend, TokenStream, TokenizerBackend};
pub use dom::{html_to_dom, tokenize_dom};
pub use entities::{decode, DecodedValue};
pub use serializer::{serialize, serialize_with_limit, Serializer};
pub use token::{Attribute, QuoteStyle, StartTag, Token, TokenKind};
pub use tokenizer::StreamingTokenizer;
pub use walker::{walk, PolicyWalker, WalkOutput};
