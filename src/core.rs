//! 核心净化流程
//!
//! `Received → Tokenizing → Decoding+Policy → CSS → Reassembling → Done`：
//! 选定的后端分词，`PolicyWalker` 逐个 token 应用策略（样式内容交给 CSS 子净化器），
//! 最后由序列化器重新组装。每次调用都是纯计算，`Sanitizer` 本身不可变，可以在线程间共享。

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::error::{SanitizeError, ScrubResult};
use crate::parsers::css::is_valid_css_prefix;
use crate::parsers::html::backend::{select_backend, ParserBackend};
use crate::parsers::html::element_handlers::ElementHandlerRegistry;
use crate::parsers::html::serializer::serialize_with_limit;
use crate::parsers::html::tokenizer::StreamingTokenizer;
use crate::parsers::html::walker::PolicyWalker;
use crate::parsers::text::{html_format_with, FormatOptions};
use crate::policy::{PolicyRegistry, Report};

const ANSI_COLOR_RED: &str = "\x1b[31m";
const ANSI_COLOR_RESET: &str = "\x1b[0m";

/// 输入内容的种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// 净化已有的 HTML
    #[default]
    Html,
    /// 把纯文本转换为 HTML
    PlainText,
}

/// 单次调用的净化选项
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SanitizeOptions {
    /// 策略名称，`None` 表示 `default`
    pub policy: Option<String>,
    /// 删除非 `cid:`、非内联的图片来源
    pub drop_external_images: bool,
    /// CSS 类名前缀
    pub css_prefix: Option<String>,
    pub backend: ParserBackend,
    /// 输出长度上限（字节）
    pub max_content_size: Option<usize>,
    pub mode: ContentMode,
    /// 纯文本模式：把 `>` 当作引用标记
    pub quote_markers: bool,
    /// 纯文本模式：锚点注释前缀
    pub anchor_marker_prefix: String,
    /// 纯文本模式：软换行宽度，0 表示不换行
    pub line_length: usize,
}

/// 净化结果
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SanitizeResult {
    pub content: String,
    /// 是否删除或截断了任何内容
    pub modified: bool,
    pub images_dropped: bool,
    pub truncated: bool,
    pub report: Report,
}

/// 净化器：持有策略注册表与元素处理器，构建后不可变
pub struct Sanitizer {
    registry: PolicyRegistry,
    handlers: ElementHandlerRegistry,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(PolicyRegistry::builtin())
    }
}

impl Sanitizer {
    pub fn new(registry: PolicyRegistry) -> Self {
        Self {
            registry,
            handlers: ElementHandlerRegistry::new(),
        }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// 净化一段内容
    pub fn sanitize(&self, content: &str, options: &SanitizeOptions) -> ScrubResult<SanitizeResult> {
        if let Some(prefix) = options.css_prefix.as_deref() {
            if !is_valid_css_prefix(prefix) {
                return Err(SanitizeError::InvalidCssPrefix(prefix.to_string()));
            }
        }
        let table = self.registry.get(options.policy.as_deref())?;

        let span = debug_span!("sanitize", backend = %options.backend, policy = %table.name);
        let _enter = span.enter();

        if options.mode == ContentMode::PlainText {
            let format_options = FormatOptions {
                quote_markers: options.quote_markers,
                anchor_marker_prefix: options.anchor_marker_prefix.clone(),
                line_length: options.line_length,
            };
            let mut result = html_format_with(content, &format_options);
            if let Some(max_size) = options.max_content_size {
                if result.content.len() > max_size {
                    // 与 HTML 模式相同，在 token 边界截断并关闭打开的元素
                    let tokens = StreamingTokenizer::new(&result.content).collect::<ScrubResult<Vec<_>>>()?;
                    let serialized = serialize_with_limit(&tokens, Some(max_size));
                    result.modified = result.modified || serialized.truncated || serialized.html != result.content;
                    result.truncated = serialized.truncated;
                    result.content = serialized.html;
                }
            }
            return Ok(result);
        }

        let backend = select_backend(options.backend);
        let tokens = backend.tokenize(content)?;
        let walked = PolicyWalker::new(&table, options, &self.handlers).walk(tokens)?;
        let serialized = serialize_with_limit(&walked.tokens, options.max_content_size);

        let report = walked.report;
        debug!(
            "净化完成: 输入 {} 字节, 输出 {} 字节, {:?}",
            content.len(),
            serialized.html.len(),
            report
        );

        Ok(SanitizeResult {
            modified: !report.is_clean() || serialized.truncated,
            images_dropped: report.images_dropped > 0,
            truncated: serialized.truncated,
            content: serialized.html,
            report,
        })
    }

    /// 并行净化多份内容，结果与输入一一对应
    pub fn sanitize_batch<S>(
        &self,
        documents: &[S],
        options: &SanitizeOptions,
    ) -> Vec<ScrubResult<SanitizeResult>>
    where
        S: AsRef<str> + Sync,
    {
        documents
            .par_iter()
            .map(|document| self.sanitize(document.as_ref(), options))
            .collect()
    }
}

/// 便捷形式：使用内置策略净化，返回净化后的字符串
///
/// `modified` 不为 `None` 时写入是否有内容被删除。
pub fn sanitize(
    content: &str,
    opt_config_name: Option<&str>,
    drop_external_images: bool,
    modified: Option<&mut bool>,
    css_prefix: Option<&str>,
) -> ScrubResult<String> {
    let options = SanitizeOptions {
        policy: opt_config_name.map(str::to_string),
        drop_external_images,
        css_prefix: css_prefix.map(str::to_string),
        ..SanitizeOptions::default()
    };
    let result = sanitize_with_options(content, &options)?;
    if let Some(flag) = modified {
        *flag = result.modified;
    }
    Ok(result.content)
}

/// 结构化形式：使用内置策略
pub fn sanitize_with_options(content: &str, options: &SanitizeOptions) -> ScrubResult<SanitizeResult> {
    Sanitizer::default().sanitize(content, options)
}

/// Prints an error message to stderr
pub fn print_error_message(msg: &str, colored: bool) {
    if colored {
        eprintln!("{ANSI_COLOR_RED}{msg}{ANSI_COLOR_RESET}");
    } else {
        eprintln!("{msg}");
    }
}

/// Prints an info message to stdout
pub fn print_info_message(msg: &str) {
    println!("{msg}");
}
