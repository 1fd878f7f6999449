//! 属性与实体解码器
//!
//! 所有安全判断之前都必须先经过这里：命名实体、十进制与十六进制数字实体
//! （带或不带结尾的 `;`）都会被解码，解码规则与浏览器保持一致。
//! 命名实体表直接复用 html5ever 的 `NAMED_ENTITIES`，两个解析后端因此看到完全相同的字符。
//!
//! 解码是纯函数：相同输入永远得到相同输出，不依赖任何隐藏状态。

use html5ever::data::NAMED_ENTITIES;
use percent_encoding::percent_decode_str;

/// 命名实体名称的最大长度（最长的 HTML5 实体名是 32 个字符）
const MAX_ENTITY_NAME_LEN: usize = 32;

/// Windows-1252 对 0x80..=0x9F 数字引用的替换表（与浏览器行为一致）
const C1_REPLACEMENTS: [Option<char>; 32] = [
    Some('\u{20ac}'),
    None,
    Some('\u{201a}'),
    Some('\u{0192}'),
    Some('\u{201e}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02c6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017d}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201c}'),
    Some('\u{201d}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02dc}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203a}'),
    Some('\u{0153}'),
    None,
    Some('\u{017e}'),
    Some('\u{0178}'),
];

/// 规范化后的值，只用于策略判断
///
/// `value` 是实体解码后的文本（输出时仍会被重新编码）；
/// `normalized` 在此基础上做了百分号解码、去除空白与控制字符、ASCII 小写化，
/// 使得 `java&#9;script:`、`java script:`、`JaVaScRiPt:` 都归一成 `javascript:`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedValue {
    pub value: String,
    pub normalized: String,
}

impl DecodedValue {
    /// 由已经实体解码的文本构造
    pub fn from_decoded(value: &str) -> Self {
        let percent_decoded = percent_decode_str(value).decode_utf8_lossy();
        let normalized = percent_decoded
            .chars()
            .filter(|c| !is_ignorable_for_matching(*c))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self {
            value: value.to_string(),
            normalized,
        }
    }

    /// 从规范化形式中提取 URI scheme（小写），相对 URL 返回 `None`
    pub fn scheme(&self) -> Option<&str> {
        let colon = self.normalized.find(':')?;
        let candidate = &self.normalized[..colon];
        let mut chars = candidate.chars();

        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {}
            _ => return None,
        }

        if chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            Some(candidate)
        } else {
            None
        }
    }
}

/// 匹配时忽略的字符：ASCII 空白与控制字符、NBSP、零宽字符、BOM 与行/段分隔符
fn is_ignorable_for_matching(c: char) -> bool {
    c <= ' '
        || c == '\u{7f}'
        || c == '\u{a0}'
        || ('\u{200b}'..='\u{200f}').contains(&c)
        || c == '\u{2028}'
        || c == '\u{2029}'
        || c == '\u{feff}'
}

/// 解码属性值并返回用于策略判断的规范化值
pub fn decode(raw: &str) -> DecodedValue {
    DecodedValue::from_decoded(&decode_attribute(raw))
}

/// 按属性值上下文解码实体
pub fn decode_attribute(raw: &str) -> String {
    decode_entities(raw, true)
}

/// 按文本上下文解码实体
pub fn decode_text(raw: &str) -> String {
    decode_entities(raw, false)
}

fn decode_entities(raw: &str, in_attribute: bool) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let consumed = if after.starts_with('#') {
            decode_numeric(&after[1..], &mut out).map(|n| n + 1)
        } else {
            decode_named(after, in_attribute, &mut out)
        };

        match consumed {
            Some(n) => rest = &after[n..],
            None => {
                out.push('&');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// 解码 `#` 之后的数字引用，返回消耗的字节数
fn decode_numeric(input: &str, out: &mut String) -> Option<usize> {
    let bytes = input.as_bytes();
    let (radix, start) = match bytes.first() {
        Some(b'x') | Some(b'X') => (16, 1),
        _ => (10, 0),
    };

    let mut end = start;
    let mut code: u32 = 0;
    while end < bytes.len() && (bytes[end] as char).is_digit(radix) {
        let digit = (bytes[end] as char).to_digit(radix).unwrap_or(0);
        code = code.saturating_mul(radix).saturating_add(digit);
        end += 1;
    }

    if end == start {
        return None;
    }

    if bytes.get(end) == Some(&b';') {
        end += 1;
    }

    out.push(numeric_char(code));
    Some(end)
}

fn numeric_char(code: u32) -> char {
    match code {
        0 => '\u{fffd}',
        0x80..=0x9f => C1_REPLACEMENTS[(code - 0x80) as usize].unwrap_or_else(|| {
            char::from_u32(code).unwrap_or('\u{fffd}')
        }),
        _ => char::from_u32(code).unwrap_or('\u{fffd}'),
    }
}

/// 解码 `&` 之后的命名引用，返回消耗的字节数
fn decode_named(input: &str, in_attribute: bool, out: &mut String) -> Option<usize> {
    let run_len = input
        .bytes()
        .take(MAX_ENTITY_NAME_LEN)
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if run_len == 0 {
        return None;
    }

    let run = &input[..run_len];
    let next = input.as_bytes().get(run_len).copied();

    if next == Some(b';') {
        let with_semicolon = &input[..run_len + 1];
        if let Some(chars) = lookup(with_semicolon) {
            push_entity(chars, out);
            return Some(run_len + 1);
        }
    }

    // 历史遗留的无分号实体，取最长匹配
    for len in (1..=run_len).rev() {
        let Some(chars) = lookup(&run[..len]) else {
            continue;
        };

        let following = input.as_bytes().get(len).copied();
        if in_attribute
            && matches!(following, Some(b) if b.is_ascii_alphanumeric() || b == b'=')
        {
            return None;
        }

        push_entity(chars, out);
        return Some(len);
    }

    None
}

fn lookup(name: &str) -> Option<(u32, u32)> {
    match NAMED_ENTITIES.get(name) {
        Some(&(first, second)) if first != 0 => Some((first, second)),
        _ => None,
    }
}

fn push_entity((first, second): (u32, u32), out: &mut String) {
    out.push(char::from_u32(first).unwrap_or('\u{fffd}'));
    if second != 0 {
        out.push(char::from_u32(second).unwrap_or('\u{fffd}'));
    }
}
