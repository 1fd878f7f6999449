//! HTML 元素处理器模块
//!
//! 策略引擎只回答“能不能留”，个别元素在保留之后还需要改写。每个处理器负责一类元素，
//! 由 `ElementHandlerRegistry` 统一调度，`PolicyWalker` 在开始标签通过策略检查后调用。
//!
//! # 架构设计
//!
//! - `ElementHandler` trait 定义了处理元素的统一接口
//! - 各种具体处理器实现该trait，处理特定元素类型
//! - `ElementHandlerRegistry` 管理所有处理器，提供统一的调用接口
//!
//! # 使用示例
//!
//! ```rust
//! use htmlscrub::core::SanitizeOptions;
//! use htmlscrub::parsers::html::element_handlers::{ElementHandlerRegistry, HandlerOutcome};
//! use htmlscrub::parsers::html::token::{Attribute, QuoteStyle, StartTag};
//!
//! let registry = ElementHandlerRegistry::new();
//! let mut tag = StartTag::new("a");
//! tag.push_attr(Attribute::from_raw("target", "_blank", QuoteStyle::Double));
//!
//! let outcome = registry.handle_element(&mut tag, &SanitizeOptions::default());
//! assert_eq!(outcome, HandlerOutcome::Keep);
//! assert_eq!(tag.attr("rel").unwrap().value, "noopener noreferrer");
//! ```

use tracing::debug;

use crate::core::SanitizeOptions;

use super::token::StartTag;

/// 处理器对元素的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 保留（可能已经改写）
    Keep,
    /// 删除标签，保留子节点
    Drop,
}

/// HTML 元素处理器特征
///
/// 定义了处理HTML元素的统一接口。每个具体的元素处理器都需要实现此trait，
/// 以提供特定元素类型的处理逻辑。处理器只会看到已经通过策略过滤的标签。
pub trait ElementHandler: Send + Sync {
    /// 处理指定的开始标签
    ///
    /// # 参数
    ///
    /// * `tag` - 已过滤属性的开始标签，可以就地修改
    /// * `options` - 本次调用的净化选项
    fn handle(&self, tag: &mut StartTag, options: &SanitizeOptions) -> HandlerOutcome;

    /// 检查是否能处理指定的元素名称
    fn can_handle(&self, element_name: &str) -> bool;
}

/// 链接元素处理器
///
/// 带 `target` 的 `<a>`/`<area>` 会在新的浏览上下文中打开，
/// 补上 `rel="noopener noreferrer"` 切断 `window.opener`。
pub struct AnchorElementHandler;

impl ElementHandler for AnchorElementHandler {
    fn can_handle(&self, element_name: &str) -> bool {
        element_name == "a" || element_name == "area"
    }

    fn handle(&self, tag: &mut StartTag, _options: &SanitizeOptions) -> HandlerOutcome {
        if tag.attr("target").is_some() {
            tag.set_attr("rel", Some("noopener noreferrer".to_string()));
        }
        HandlerOutcome::Keep
    }
}

/// IMG 元素处理器
///
/// `src` 被策略剥离后剩下的 `<img>` 没有任何用途，直接删除。
pub struct ImgElementHandler;

impl ElementHandler for ImgElementHandler {
    fn can_handle(&self, element_name: &str) -> bool {
        element_name == "img"
    }

    fn handle(&self, tag: &mut StartTag, _options: &SanitizeOptions) -> HandlerOutcome {
        let has_source = tag
            .attr("src")
            .is_some_and(|src| !src.value.trim().is_empty());
        if has_source {
            HandlerOutcome::Keep
        } else {
            debug!("删除没有图片源的 <img>");
            HandlerOutcome::Drop
        }
    }
}

/// 元素处理器注册表
///
/// 按注册顺序依次调用能处理该元素的处理器，任何一个返回 `Drop` 即停止。
pub struct ElementHandlerRegistry {
    handlers: Vec<Box<dyn ElementHandler>>,
}

impl ElementHandlerRegistry {
    /// 创建包含默认处理器的注册表
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: Vec::new(),
        };

        registry.register(Box::new(AnchorElementHandler));
        registry.register(Box::new(ImgElementHandler));

        registry
    }

    /// 注册新的元素处理器
    pub fn register(&mut self, handler: Box<dyn ElementHandler>) {
        self.handlers.push(handler);
    }

    /// 处理指定元素
    pub fn handle_element(&self, tag: &mut StartTag, options: &SanitizeOptions) -> HandlerOutcome {
        for handler in &self.handlers {
            if handler.can_handle(&tag.name) && handler.handle(tag, options) == HandlerOutcome::Drop {
                return HandlerOutcome::Drop;
            }
        }
        HandlerOutcome::Keep
    }
}

impl Default for ElementHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
