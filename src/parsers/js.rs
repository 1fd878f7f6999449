//! 脚本向量识别
//!
//! 事件处理器属性按类别识别：任何以 `on` 开头的属性名都被视为事件处理器，
//! 而不是对照一份会过时的事件名单。新增的 DOM 事件因此无需更新任何表格。

/// 能执行脚本的 URI scheme
const SCRIPT_SCHEMES: &[&str] = &["javascript", "vbscript", "livescript", "mocha", "jscript"];

/// 检查属性名是否为事件处理器（`on*`，不区分大小写）
///
/// ```rust
/// use htmlscrub::parsers::js::attr_is_event_handler;
///
/// assert!(attr_is_event_handler("onclick"));
/// assert!(attr_is_event_handler("OnWebkitAnimationEnd"));
/// assert!(attr_is_event_handler("onfuturething"));
/// assert!(!attr_is_event_handler("one"));
/// assert!(!attr_is_event_handler("class"));
/// ```
pub fn attr_is_event_handler(attr_name: &str) -> bool {
    let bytes = attr_name.as_bytes();
    // 名字可能带有命名空间前缀，如 `xlink:onclick`
    let local = match attr_name.rfind(':') {
        Some(colon) => &bytes[colon + 1..],
        None => bytes,
    };

    // 最短的事件名是 `onxx` 形式，`one` 之类的普通属性名不算
    local.len() >= 4
        && local[..2].eq_ignore_ascii_case(b"on")
        && local[2..].iter().all(|b| b.is_ascii_alphabetic() || *b == b'-' || *b == b'_')
}

/// 检查（已规范化的）scheme 是否能执行脚本
pub fn is_script_scheme(scheme: &str) -> bool {
    SCRIPT_SCHEMES
        .iter()
        .any(|s| scheme.eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_handlers_by_class() {
        for name in ["onload", "ONERROR", "onpointerrawupdate", "xlink:onclick"] {
            assert!(attr_is_event_handler(name), "{}", name);
        }
        for name in ["on", "one", "href", "style", "data-on"] {
            assert!(!attr_is_event_handler(name), "{}", name);
        }
    }

    #[test]
    fn script_schemes() {
        assert!(is_script_scheme("JavaScript"));
        assert!(is_script_scheme("vbscript"));
        assert!(!is_script_scheme("https"));
    }
}
