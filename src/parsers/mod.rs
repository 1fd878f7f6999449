//! # 解析器模块
//!
//! - `html` - HTML 分词（流式扫描器与 html5ever 两个后端）、策略遍历与序列化
//! - `css` - CSS 子净化器，`<style>` 块与 `style` 属性共用
//! - `js` - 事件处理器属性与脚本 scheme 的识别
//! - `linkify` - 纯文本中的链接识别
//! - `text` - 纯文本转 HTML

pub mod css;
pub mod html;
pub mod js;
pub mod linkify;
pub mod text;

// Re-export commonly used items for convenience
pub use css::{sanitize_css, CssContext, CssOptions, CssOutput};
pub use js::attr_is_event_handler;
pub use linkify::format_urls;
pub use text::{html_format, html_format_with, FormatOptions};
