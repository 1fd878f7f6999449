//! URL 与 data URI 工具
//!
//! 所有判断都基于实体解码后的值；这里额外去掉值中的空白与控制字符，
//! 并对 data URI 的头部做百分号解码，使 `DaTa:TeXt/HtMl`、`data:text%2Fhtml` 这类变体无处藏身。

use base64::{prelude::BASE64_STANDARD, Engine};
use percent_encoding::percent_decode_str;

pub use url::Url;

/// 解析后的 data URI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUrl {
    /// 小写的媒体类型，如 `image/png`；缺省时为 `text/plain`
    pub media_type: String,
    pub is_base64: bool,
    /// 逗号之后的原始负载
    pub payload: String,
}

impl DataUrl {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// 能承载脚本的类型：html、xml、svg 与 javascript
    pub fn is_script_bearing(&self) -> bool {
        let t = self.media_type.as_str();
        t.contains("html")
            || t.contains("xml")
            || t.contains("svg")
            || t.contains("javascript")
            || t.contains("ecmascript")
    }

    /// base64 负载能否解码（负载只做这一项检查，内容本身不解析）
    pub fn has_valid_payload(&self) -> bool {
        if !self.is_base64 {
            return true;
        }
        let payload: String = percent_decode_str(&self.payload)
            .decode_utf8_lossy()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        BASE64_STANDARD.decode(payload.as_bytes()).is_ok()
    }
}

/// 去掉用于匹配时应忽略的字符
fn strip_ignorable(value: &str) -> String {
    value
        .chars()
        .filter(|c| {
            !(c.is_whitespace()
                || c.is_control()
                || ('\u{200b}'..='\u{200f}').contains(c)
                || *c == '\u{feff}')
        })
        .collect()
}

/// 解析 data URI；值不是 data URI 时返回 `None`
pub fn parse_data_url(value: &str) -> Option<DataUrl> {
    let compact = strip_ignorable(value);
    match compact.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("data:") => {}
        _ => return None,
    }

    let rest = &compact[5..];
    let (header, payload) = match rest.find(',') {
        Some(comma) => (&rest[..comma], &rest[comma + 1..]),
        None => (rest, ""),
    };

    let header = percent_decode_str(header).decode_utf8_lossy().to_ascii_lowercase();
    let mut parts = header.split(';');
    let media_type = match parts.next().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => "text/plain".to_string(),
    };

    let is_base64 = parts.any(|part| part.trim() == "base64");

    Some(DataUrl {
        media_type,
        is_base64,
        payload: payload.to_string(),
    })
}

/// 是否是协议相对 URL（`//host/path`），它会继承页面的 scheme 加载外部资源
pub fn is_protocol_relative(normalized: &str) -> bool {
    normalized.starts_with("//") || normalized.starts_with("\\\\") || normalized.starts_with("/\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_urls() {
        let data = parse_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(data.media_type, "image/png");
        assert!(data.is_base64);
        assert!(data.is_image());
        assert!(!data.is_script_bearing());
        assert!(data.has_valid_payload());
        assert_eq!(data.payload, "iVBORw0KGgo=");
    }

    #[test]
    fn obfuscated_html_data_urls() {
        for value in [
            "DaTa:TeXt/HtMl;base64,PHNjcmlwdD4=",
            " d a t a :text/html,<script>",
            "data:text%2Fhtml,x",
            "data:image/svg+xml;base64,PHN2Zz4=",
        ] {
            let data = parse_data_url(value).unwrap();
            assert!(data.is_script_bearing(), "{}", value);
        }
    }

    #[test]
    fn defaults_and_non_data() {
        let data = parse_data_url("data:,hello").unwrap();
        assert_eq!(data.media_type, "text/plain");
        let data = parse_data_url("data:text/plain;charset=utf-8;base64,aGk=").unwrap();
        assert!(data.is_base64);
        assert!(data.has_valid_payload());
        assert!(parse_data_url("https://example.com/data:x").is_none());
        assert!(parse_data_url("dat").is_none());
    }

    #[test]
    fn invalid_base64_payload() {
        let data = parse_data_url("data:image/gif;base64,@@@").unwrap();
        assert!(!data.has_valid_payload());
    }

    #[test]
    fn protocols() {
        assert!(is_protocol_relative("//evil.example/x.css"));
        assert!(!is_protocol_relative("/local"));
    }
}
