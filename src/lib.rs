//! # htmlscrub
//!
//! 面向邮件正文等不可信内容的 HTML 净化引擎：分词、实体解码、策略判断、CSS 净化与重新组装，
//! 两个可互换的解析后端给出相同的安全结果。
//!
//! ## 模块组织
//!
//! - `core` - 净化流程入口（`Sanitizer`、`sanitize`、`SanitizeOptions`）
//! - `parsers` - HTML 分词与遍历、CSS 子净化器、脚本特征识别、纯文本格式化
//! - `policy` - 策略表、内置策略与策略注册表
//! - `utils` - URL 与 data URI 工具
//! - `env` - 类型化的环境变量
//! - `error` - `HTM` 错误码

pub mod core;
pub mod env;
pub mod error;
pub mod parsers;
pub mod policy;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::{sanitize, sanitize_with_options, ContentMode, SanitizeOptions, SanitizeResult, Sanitizer};
pub use error::{ErrorCategory, SanitizeError, ScrubResult};
pub use parsers::html::backend::ParserBackend;
pub use parsers::linkify::format_urls;
pub use parsers::text::html_format;
pub use policy::{PolicyRegistry, PolicyTable, Report};
