//! html5ever DOM 后端
//!
//! 严格的基于树的解析后端：先交给 html5ever 建树，再把树按文档顺序展平成与流式扫描器
//! 同样形状的 token 序列。展平前先用流式扫描器做一次结构校验，
//! 这样两个后端对有歧义的输入给出同一个 `MalformedMarkup`。

use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::{namespace_url, ns};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::{SanitizeError, ScrubResult};

use super::token::{Attribute, StartTag, Token};
use super::tokenizer::StreamingTokenizer;
use super::utils::{is_raw_text_element, is_void_element};

/// 按给定的编码标签把字节解码为字符串，标签无法识别时按 UTF-8 宽松解码
pub fn decode_bytes(data: &[u8], document_encoding: &str) -> String {
    if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        string.into_owned()
    } else {
        String::from_utf8_lossy(data).into_owned()
    }
}

/// 将 HTML 文本解析为 DOM
pub fn html_to_dom(input: &str) -> ScrubResult<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut input.as_bytes())
        .map_err(|e| SanitizeError::Internal(format!("DOM 构建失败: {}", e)))
}

/// 校验并解析输入，返回按文档顺序展平的 token
pub fn tokenize_dom(input: &str) -> ScrubResult<Vec<Token>> {
    StreamingTokenizer::validate(input)?;

    let dom = html_to_dom(input)?;
    let mut tokens = Vec::new();
    for child in dom.document.children.borrow().iter() {
        flatten_node(child, false, &mut tokens);
    }
    Ok(tokens)
}

fn flatten_node(node: &Handle, in_raw_text: bool, out: &mut Vec<Token>) {
    match &node.data {
        NodeData::Doctype { name, .. } => out.push(Token::Doctype(name.to_string())),
        NodeData::Comment { contents } => out.push(Token::Comment(contents.to_string())),
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if in_raw_text {
                out.push(Token::CData(text));
            } else {
                out.push(Token::Text(text));
            }
        }
        NodeData::Element { name, attrs, .. } => {
            let local: &str = name.local.as_ref();
            let is_html = name.ns == ns!(html);

            let mut tag = StartTag::new(local);
            for attr in attrs.borrow().iter() {
                let attr_name = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                tag.push_attr(Attribute::from_decoded(&attr_name, &attr.value));
            }
            out.push(Token::StartTag(tag));

            // template 内容位于单独的片段中，不参与展平
            let raw = is_html && is_raw_text_element(local);
            for child in node.children.borrow().iter() {
                flatten_node(child, raw, out);
            }

            if !(is_html && is_void_element(local)) {
                out.push(Token::end(local));
            }
        }
        NodeData::Document | NodeData::ProcessingInstruction { .. } => {
            for child in node.children.borrow().iter() {
                flatten_node(child, in_raw_text, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_node_name(node: &Handle) -> Option<&'_ str> {
        match &node.data {
            NodeData::Element { name, .. } => Some(name.local.as_ref()),
            _ => None,
        }
    }

    fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
        match &node.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|attr| &*attr.name.local == attr_name)
                .map(|attr| attr.value.to_string()),
            _ => None,
        }
    }

    fn find_element(node: &Handle, wanted: &str) -> Option<Handle> {
        if get_node_name(node) == Some(wanted) {
            return Some(node.clone());
        }
        node.children
            .borrow()
            .iter()
            .find_map(|child| find_element(child, wanted))
    }

    #[test]
    fn builds_dom() {
        let dom = html_to_dom("<p><a href=\"x&amp;y\">t</a>").unwrap();
        let a = find_element(&dom.document, "a").unwrap();
        assert_eq!(get_node_attr(&a, "href"), Some("x&y".to_string()));
    }

    #[test]
    fn flattens_in_document_order() {
        let tokens = tokenize_dom("<b>x</b><br>").unwrap();
        let names: Vec<String> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::StartTag(tag) => Some(tag.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["html", "head", "body", "b", "br"]);
        assert!(!tokens.contains(&Token::end("br")));
        assert!(tokens.contains(&Token::Text("x".to_string())));
    }

    #[test]
    fn raw_text_children_are_cdata() {
        let tokens = tokenize_dom("<style>a>b{}</style>").unwrap();
        assert!(tokens.contains(&Token::CData("a>b{}".to_string())));
    }

    #[test]
    fn ambiguous_input_fails_like_streaming() {
        let result = tokenize_dom("<% <img title=\"%><script>x</script>\">");
        assert!(matches!(result, Err(SanitizeError::MalformedMarkup { .. })));
    }

    #[test]
    fn decodes_legacy_encodings() {
        let bytes = [0x63, 0x61, 0x66, 0xe9];
        assert_eq!(decode_bytes(&bytes, "windows-1252"), "café");
        assert_eq!(decode_bytes(b"plain", "no-such-label"), "plain");
    }
}
