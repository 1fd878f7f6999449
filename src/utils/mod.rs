//! # 工具模块
//!
//! - `url` - URL 解析、data URI 解析与校验

pub mod url;

pub use self::url::{is_protocol_relative, parse_data_url, DataUrl, Url};
