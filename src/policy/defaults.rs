//! 内置策略
//!
//! `default` 面向邮件正文：保留常见的排版元素、表格、图片与 `<style>`；
//! `strict` 只保留最基本的文本格式，不允许样式与图片。

use std::collections::{BTreeMap, BTreeSet};

use super::PolicyTable;

const DEFAULT_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "b", "bdi", "bdo", "big", "blockquote", "br",
    "caption", "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "dir", "div", "dl",
    "dt", "em", "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "label",
    "li", "map", "mark", "menu", "ol", "p", "pre", "q", "s", "samp", "small", "span", "strike",
    "strong", "style", "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "tt",
    "u", "ul", "var", "wbr",
];

/// 内容模型可能藏匿可执行负载的元素：连同子树一起删除
const DEFAULT_STRIP_SUBTREE: &[&str] = &[
    "applet", "audio", "base", "basefont", "bgsound", "button", "canvas", "embed", "frame",
    "frameset", "form", "iframe", "input", "isindex", "keygen", "link", "math",
    "meta", "noembed", "noframes", "noscript", "object", "option", "param", "script", "select",
    "svg", "template", "textarea", "title", "video", "xml", "xmp",
];

const GLOBAL_ATTRIBUTES: &[&str] = &[
    "align", "bgcolor", "border", "cellpadding", "cellspacing", "class", "color", "colspan",
    "dir", "face", "height", "hspace", "id", "lang", "nowrap", "rowspan", "size", "style",
    "title", "valign", "vspace", "width",
];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "name", "target", "rel"]),
    ("area", &["href", "alt", "shape", "coords", "target", "rel"]),
    ("blockquote", &["cite", "type"]),
    ("col", &["span", "char", "charoff"]),
    ("colgroup", &["span"]),
    ("del", &["cite", "datetime"]),
    ("img", &["src", "alt", "usemap", "ismap"]),
    ("ins", &["cite", "datetime"]),
    ("li", &["type", "value"]),
    ("map", &["name"]),
    ("ol", &["start", "type", "reversed"]),
    ("q", &["cite"]),
    ("style", &["media", "type"]),
    ("table", &["background", "summary", "frame", "rules"]),
    ("td", &["background", "abbr", "axis", "headers", "scope", "char", "charoff"]),
    ("th", &["background", "abbr", "axis", "headers", "scope", "char", "charoff"]),
    ("tr", &["background"]),
    ("ul", &["type"]),
];

/// 值是 URI 的属性
const URI_ATTRIBUTES: &[&str] = &[
    "action", "background", "cite", "classid", "codebase", "data", "dynsrc", "formaction", "href",
    "icon", "longdesc", "lowsrc", "manifest", "ping", "poster", "profile", "src", "usemap",
    "xlink:href",
];

/// 值会被当作图片加载的属性（`data:image/*` 只允许出现在这里）
const IMAGE_ATTRIBUTES: &[&str] = &["background", "dynsrc", "lowsrc", "poster", "src"];

const DEFAULT_SCHEMES: &[&str] = &["cid", "http", "https", "mailto"];

/// 可绑定行为或脚本的 CSS 属性
const DENIED_CSS_PROPERTIES: &[&str] = &[
    "-moz-binding", "behavior", "-ms-behavior", "binding", "include-source",
];

/// 可执行脚本的 CSS 函数
const DENIED_CSS_FUNCTIONS: &[&str] = &["expression", "javascript", "vbscript", "-moz-binding"];

const ALLOWED_AT_RULES: &[&str] = &["font-face", "keyframes", "media", "page", "supports"];

const STRICT_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "div", "em", "i", "li", "ol", "p", "pre", "q", "s",
    "span", "strong", "sub", "sup", "u", "ul",
];

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 默认策略
pub fn default_policy() -> PolicyTable {
    let tag_attributes: BTreeMap<String, BTreeSet<String>> = TAG_ATTRIBUTES
        .iter()
        .map(|(tag, attrs)| (tag.to_string(), set(attrs)))
        .collect();

    PolicyTable {
        name: "default".to_string(),
        allowed_tags: set(DEFAULT_TAGS),
        strip_subtree: set(DEFAULT_STRIP_SUBTREE),
        global_attributes: set(GLOBAL_ATTRIBUTES),
        tag_attributes,
        uri_attributes: set(URI_ATTRIBUTES),
        image_attributes: set(IMAGE_ATTRIBUTES),
        allowed_schemes: set(DEFAULT_SCHEMES),
        allow_data_images: true,
        denied_attribute_prefixes: vec!["on".to_string()],
        denied_css_properties: set(DENIED_CSS_PROPERTIES),
        denied_css_functions: set(DENIED_CSS_FUNCTIONS),
        allowed_at_rules: set(ALLOWED_AT_RULES),
    }
}

/// 严格策略：无样式、无图片，只允许 http(s) 与 mailto 链接
pub fn strict_policy() -> PolicyTable {
    let mut table = default_policy();
    table.name = "strict".to_string();
    table.allowed_tags = set(STRICT_TAGS);
    table.strip_subtree.insert("style".to_string());
    table.strip_subtree.insert("img".to_string());
    table.global_attributes = set(&["dir", "lang", "title"]);
    table.tag_attributes = [("a", &["href"][..]), ("blockquote", &["cite"][..])]
        .iter()
        .map(|(tag, attrs)| (tag.to_string(), set(attrs)))
        .collect();
    table.allowed_schemes = set(&["http", "https", "mailto"]);
    table.allow_data_images = false;
    table.allowed_at_rules.clear();
    table
}
