//! 策略引擎
//!
//! 对每个 token、属性、URI 与 CSS 构造给出保留/剥离/改写的决定。决定只依赖
//! `Token`、`PolicyTable` 与 `SanitizeOptions`，没有任何隐藏状态，因此对同样的输入永远给出同样的结果。
//!
//! 所有拒绝规则都作用于解码后的值（见 `parsers::html::entities`），从不作用于原始文本。

pub mod defaults;
pub mod registry;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::SanitizeOptions;
use crate::parsers::css::{prefix_class_list, sanitize_css, CssContext, CssOptions};
use crate::parsers::html::entities::DecodedValue;
use crate::parsers::html::token::{Attribute, StartTag, Token};
use crate::parsers::js::{attr_is_event_handler, is_script_scheme};
use crate::utils::url::{is_protocol_relative, parse_data_url};

pub use defaults::{default_policy, strict_policy};
pub use registry::PolicyRegistry;

/// 不可变的策略表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    pub name: String,
    /// 允许保留的元素
    pub allowed_tags: BTreeSet<String>,
    /// 连同子树一起删除的元素；不在这里也不在 `allowed_tags` 里的元素只删除标签、保留子节点
    pub strip_subtree: BTreeSet<String>,
    /// 所有允许的元素上都可用的属性
    pub global_attributes: BTreeSet<String>,
    /// 按元素允许的额外属性
    pub tag_attributes: BTreeMap<String, BTreeSet<String>>,
    /// 值为 URI 的属性
    pub uri_attributes: BTreeSet<String>,
    /// 值会被当作图片加载的 URI 属性
    pub image_attributes: BTreeSet<String>,
    /// 允许的 URI scheme（小写）
    pub allowed_schemes: BTreeSet<String>,
    /// 图片属性中是否允许 `data:image/*`
    pub allow_data_images: bool,
    /// 按前缀整类拒绝的属性名（`on` 即事件处理器）
    pub denied_attribute_prefixes: Vec<String>,
    pub denied_css_properties: BTreeSet<String>,
    pub denied_css_functions: BTreeSet<String>,
    /// 允许的 CSS at-rule，`@import` 永远不在其中
    pub allowed_at_rules: BTreeSet<String>,
}

impl PolicyTable {
    pub fn allows_tag(&self, name: &str) -> bool {
        self.allowed_tags.contains(name)
    }

    pub fn strips_subtree(&self, name: &str) -> bool {
        self.strip_subtree.contains(name)
    }

    pub fn allows_attribute(&self, tag: &str, attr: &str) -> bool {
        self.global_attributes.contains(attr)
            || self
                .tag_attributes
                .get(tag)
                .is_some_and(|attrs| attrs.contains(attr))
    }

    pub fn allows_scheme(&self, scheme: &str) -> bool {
        self.allowed_schemes.contains(&scheme.to_ascii_lowercase())
    }

    pub fn is_uri_attribute(&self, attr: &str) -> bool {
        self.uri_attributes.contains(attr)
    }

    pub fn is_image_attribute(&self, attr: &str) -> bool {
        self.image_attributes.contains(attr)
    }

    /// 属性名是否落入整类拒绝的模式
    pub fn denies_attribute_name(&self, attr: &str) -> bool {
        if attr_is_event_handler(attr) {
            return true;
        }
        self.denied_attribute_prefixes.iter().any(|prefix| {
            attr.len() > prefix.len()
                && attr
                    .get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
    }

    pub fn denies_css_property(&self, property: &str) -> bool {
        self.denied_css_properties
            .contains(&property.to_ascii_lowercase())
    }

    pub fn denies_css_function(&self, function: &str) -> bool {
        let function = function.to_ascii_lowercase();
        self.denied_css_functions.contains(&function) || function.contains("expression")
    }

    pub fn allows_at_rule(&self, rule: &str) -> bool {
        let rule = rule.to_ascii_lowercase();
        rule != "import" && self.allowed_at_rules.contains(&rule)
    }

    /// 判断 URI 值能否保留
    ///
    /// `image_context` 为真时表示值会被当作图片加载（`<img src>`、`background`、CSS `url()`）。
    pub fn check_uri(
        &self,
        decoded: &DecodedValue,
        image_context: bool,
        drop_external_images: bool,
    ) -> Result<(), StripReason> {
        let scheme = decoded.scheme();

        if let Some(scheme) = scheme {
            if is_script_scheme(scheme) {
                return Err(StripReason::DisallowedScheme);
            }
            if scheme == "data" {
                return self.check_data_uri(decoded, image_context);
            }
        }

        if image_context && drop_external_images && scheme != Some("cid") {
            return Err(StripReason::ExternalImage);
        }

        match scheme {
            Some(scheme) if !self.allows_scheme(scheme) => Err(StripReason::DisallowedScheme),
            None if image_context && is_protocol_relative(&decoded.normalized) => {
                // 协议相对地址等同于 http(s)
                if self.allows_scheme("https") {
                    Ok(())
                } else {
                    Err(StripReason::DisallowedScheme)
                }
            }
            _ => Ok(()),
        }
    }

    fn check_data_uri(&self, decoded: &DecodedValue, image_context: bool) -> Result<(), StripReason> {
        let Some(data) = parse_data_url(&decoded.value) else {
            return Err(StripReason::DisallowedScheme);
        };

        if data.is_script_bearing() {
            return Err(StripReason::DangerousDataUri);
        }
        if !(self.allow_data_images && image_context && data.is_image()) {
            return Err(StripReason::DisallowedScheme);
        }
        if !data.has_valid_payload() {
            return Err(StripReason::Suspicious);
        }
        Ok(())
    }
}

/// 剥离原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripReason {
    /// 不在允许列表中
    NotAllowed,
    /// `on*` 事件处理器
    EventHandler,
    /// URI scheme 不被允许
    DisallowedScheme,
    /// 承载脚本的 data URI
    DangerousDataUri,
    /// 外部图片（`drop_external_images`）
    ExternalImage,
    /// 解码后残留不平衡的标记字符
    Suspicious,
    /// 值经过 CSS 净化后为空
    EmptyAfterSanitizing,
}

impl StripReason {
    /// 是否按 URL 计入报告
    pub fn is_url(&self) -> bool {
        matches!(
            self,
            StripReason::DisallowedScheme | StripReason::DangerousDataUri | StripReason::ExternalImage
        )
    }
}

/// 单个属性的决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeVerdict {
    Keep,
    /// 以新的（已解码）值保留
    Rewrite(String),
    Strip(StripReason),
}

/// 被剥离的属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedAttribute {
    pub name: String,
    pub reason: StripReason,
}

/// 属性过滤后的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredAttributes {
    pub kept: Vec<Attribute>,
    pub removed: Vec<RemovedAttribute>,
}

impl FilteredAttributes {
    /// 用过滤结果替换标签原有的属性
    pub fn apply(self, tag: &StartTag) -> StartTag {
        StartTag {
            name: tag.name.clone(),
            attrs: self.kept,
            self_closing: tag.self_closing,
        }
    }
}

/// 对单个 token 的决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Keep,
    KeepWithAttributesFiltered(FilteredAttributes),
    /// 删除标签，保留子节点
    Strip,
    /// 删除标签及其全部子节点
    StripSubtree,
    /// 以文本替换整个元素
    ReplaceWithText(String),
}

/// 一次净化中的修改统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub tags_removed: usize,
    pub attributes_removed: usize,
    pub urls_removed: usize,
    pub css_removed: usize,
    pub images_dropped: usize,
    pub comments_removed: usize,
}

impl Report {
    pub fn merge(&mut self, other: &Report) {
        self.tags_removed += other.tags_removed;
        self.attributes_removed += other.attributes_removed;
        self.urls_removed += other.urls_removed;
        self.css_removed += other.css_removed;
        self.images_dropped += other.images_dropped;
        self.comments_removed += other.comments_removed;
    }

    /// 没有任何内容被删除
    pub fn is_clean(&self) -> bool {
        *self == Report::default()
    }

    fn record_attribute(&mut self, reason: StripReason) {
        self.attributes_removed += 1;
        if reason.is_url() {
            self.urls_removed += 1;
        }
        if reason == StripReason::ExternalImage {
            self.images_dropped += 1;
        }
    }
}

/// 对 token 作出决定
pub fn evaluate(token: &Token, table: &PolicyTable, options: &SanitizeOptions) -> Action {
    evaluate_with_report(token, table, options).0
}

/// 对 token 作出决定，同时返回属性层面的修改统计
pub fn evaluate_with_report(
    token: &Token,
    table: &PolicyTable,
    options: &SanitizeOptions,
) -> (Action, Report) {
    let mut report = Report::default();
    let action = match token {
        Token::StartTag(tag) => evaluate_start_tag(tag, table, options, &mut report),
        Token::EndTag(name) => {
            if table.allows_tag(name) {
                Action::Keep
            } else if table.strips_subtree(name) {
                Action::StripSubtree
            } else {
                Action::Strip
            }
        }
        Token::Comment(_) | Token::Doctype(_) => Action::Strip,
        Token::Text(_) | Token::CData(_) => Action::Keep,
    };
    (action, report)
}

fn evaluate_start_tag(
    tag: &StartTag,
    table: &PolicyTable,
    options: &SanitizeOptions,
    report: &mut Report,
) -> Action {
    let name = tag.name.as_str();

    if table.strips_subtree(name) {
        return Action::StripSubtree;
    }
    if !table.allows_tag(name) {
        return Action::Strip;
    }

    let mut filtered = FilteredAttributes::default();
    let mut changed = false;

    for attr in &tag.attrs {
        match evaluate_attribute(name, attr, table, options, report) {
            AttributeVerdict::Keep => filtered.kept.push(attr.clone()),
            AttributeVerdict::Rewrite(value) => {
                changed |= value != attr.value;
                filtered.kept.push(Attribute::from_decoded(&attr.name, &value));
            }
            AttributeVerdict::Strip(reason) => {
                debug!("剥离属性 {}.{} ({:?})", name, attr.name, reason);
                report.record_attribute(reason);
                changed = true;
                filtered.removed.push(RemovedAttribute {
                    name: attr.name.clone(),
                    reason,
                });
            }
        }
    }

    // 外部图片被丢弃时，用替代文本占位
    let image_dropped = filtered
        .removed
        .iter()
        .any(|r| r.name == "src" && r.reason == StripReason::ExternalImage);
    if name == "img" && image_dropped {
        let alt = tag.attr("alt").map(|a| a.value.clone()).unwrap_or_default();
        return Action::ReplaceWithText(alt);
    }

    if changed {
        Action::KeepWithAttributesFiltered(filtered)
    } else {
        Action::Keep
    }
}

/// 对单个属性作出决定
pub fn evaluate_attribute(
    tag_name: &str,
    attr: &Attribute,
    table: &PolicyTable,
    options: &SanitizeOptions,
    report: &mut Report,
) -> AttributeVerdict {
    let name = attr.name.as_str();

    if table.denies_attribute_name(name) {
        return AttributeVerdict::Strip(StripReason::EventHandler);
    }
    if !table.allows_attribute(tag_name, name) {
        return AttributeVerdict::Strip(StripReason::NotAllowed);
    }

    let decoded = attr.decoded();
    if has_unbalanced_markup(&attr.value) {
        return AttributeVerdict::Strip(StripReason::Suspicious);
    }

    if name == "style" {
        let css_options = CssOptions {
            prefix: options.css_prefix.as_deref(),
            drop_external_images: options.drop_external_images,
        };
        let output = sanitize_css(&attr.value, CssContext::Inline, table, &css_options);
        report.css_removed += output.report.css_removed;
        report.urls_removed += output.report.urls_removed;
        report.images_dropped += output.report.images_dropped;

        return if output.css.trim().is_empty() {
            AttributeVerdict::Strip(StripReason::EmptyAfterSanitizing)
        } else if output.css == attr.value {
            AttributeVerdict::Keep
        } else {
            AttributeVerdict::Rewrite(output.css)
        };
    }

    if name == "class" {
        if let Some(prefix) = options.css_prefix.as_deref() {
            let prefixed = prefix_class_list(&attr.value, prefix);
            if prefixed != attr.value {
                return AttributeVerdict::Rewrite(prefixed);
            }
        }
        return AttributeVerdict::Keep;
    }

    if table.is_uri_attribute(name) {
        let image_context = table.is_image_attribute(name);
        if let Err(reason) = table.check_uri(&decoded, image_context, options.drop_external_images)
        {
            return AttributeVerdict::Strip(reason);
        }
    }

    AttributeVerdict::Keep
}

/// 解码后的值里是否残留了可能被误读为标签边界的字符
///
/// 出现标签开头（`<` 后跟字母、`/`、`!`、`?`）或 `<`/`>` 数量不平衡时视为可疑。
pub fn has_unbalanced_markup(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut open = 0usize;
    let mut close = 0usize;

    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'<' => {
                open += 1;
                let opens_tag = match bytes.get(i + 1) {
                    Some(&n) => n.is_ascii_alphabetic() || matches!(n, b'/' | b'!' | b'?'),
                    None => false,
                };
                if opens_tag {
                    return true;
                }
            }
            b'>' => close += 1,
            _ => {}
        }
    }

    open != close
}
