//! XML key files.
//!
//! Version 1.0:
//! ```text
//! <KeyFile><Meta><Version>1.0</Version></Meta><Key><Data>BASE64</Data></Key></KeyFile>
//! ```
//!
//! Version 2.0:
//! ```text
//! <KeyFile><Meta><Version>2.0</Version></Meta><Key><Data Hash="8 HEX">HEX</Data></Key></KeyFile>
//! ```
//! `Hash` is the first 4 bytes of SHA-256 over the decoded data.
//!
//! Comments are skipped. CDATA sections, DOCTYPE declarations and entity
//! references are refused rather than interpreted.

use base64::{Engine, engine::general_purpose::STANDARD};
use zeroize::Zeroizing;

use crate::crypto::digest::digest;

const ROOT: &str = "KeyFile";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const HASH_LEN: usize = 4;
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const REFUSED_MARKUP: [&str; 3] = ["<![CDATA[", "<!DOCTYPE", "&"];

/// Returns `true` if `data` is an XML document with a `<KeyFile>` root.
///
/// A key file with refused markup still counts, so [`parse`] rejects it
/// instead of the whole file being hashed as an opaque key.
pub fn is_key_file(data: &[u8]) -> bool {
    let Some(text) = as_text(data) else {
        return false;
    };
    let text = text.trim_start();
    if !text.starts_with('<') {
        return false;
    }
    match strip_comments(text) {
        Some(clean) => element(&clean, ROOT).is_some(),
        None => element(text, ROOT).is_some(),
    }
}

/// Extracts key material from an XML key file.
///
/// Unknown versions, missing elements, refused markup and undecodable data
/// all yield `None`.
pub fn parse(data: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    let text = strip_comments(as_text(data)?)?;
    if let Some(markup) = REFUSED_MARKUP.iter().find(|m| text.contains(*m)) {
        tracing::warn!(markup, "unsupported markup in key file");
        return None;
    }

    let root = element(&text, ROOT)?;
    let meta = element(root.inner, "Meta")?;
    let version = element(meta.inner, "Version")?.inner.trim();
    let key = element(root.inner, "Key")?;
    let data = element(key.inner, "Data")?;

    match version.split('.').next() {
        Some("1") => parse_v1(data.inner),
        Some("2") => parse_v2(data),
        _ => {
            tracing::warn!(version, "unsupported key file version");
            None
        }
    }
}

fn parse_v1(data: &str) -> Option<Zeroizing<Vec<u8>>> {
    STANDARD.decode(data.trim()).ok().map(Zeroizing::new)
}

fn parse_v2(data: Element<'_>) -> Option<Zeroizing<Vec<u8>>> {
    let hex_text: Zeroizing<String> = Zeroizing::new(
        data.inner
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect(),
    );
    let bytes = Zeroizing::new(hex::decode(hex_text.as_bytes()).ok()?);

    if let Some(expected) = attribute(data.attrs, "Hash") {
        let expected = hex::decode(expected).ok()?;
        if expected.as_slice() != &digest(&bytes)[..HASH_LEN] {
            tracing::warn!("key file data does not match its hash");
            return None;
        }
    }

    Some(bytes)
}

fn as_text(data: &[u8]) -> Option<&str> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    std::str::from_utf8(data).ok()
}

/// Removes `<!-- ... -->` comments. `None` if a comment is left open.
fn strip_comments(text: &str) -> Option<Zeroizing<String>> {
    let mut out = Zeroizing::new(String::with_capacity(text.len()));
    let mut rest = text;
    while let Some(start) = rest.find(COMMENT_OPEN) {
        out.push_str(&rest[..start]);
        let body = &rest[start + COMMENT_OPEN.len()..];
        let end = body.find(COMMENT_CLOSE)?;
        rest = &body[end + COMMENT_CLOSE.len()..];
    }
    out.push_str(rest);
    Some(out)
}

#[derive(Debug, Clone, Copy)]
struct Element<'a> {
    attrs: &'a str,
    inner: &'a str,
}

/// Finds the first `<name ...>...</name>` in `doc`.
fn element<'a>(doc: &'a str, name: &str) -> Option<Element<'a>> {
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let mut search = 0;
    while let Some(pos) = doc[search..].find(&open) {
        let after_name = search + pos + open.len();
        let rest = &doc[after_name..];
        match rest.chars().next() {
            Some(c) if c == '>' || c.is_whitespace() => {
                let tag_end = after_name + rest.find('>')?;
                let attrs = &doc[after_name..tag_end];
                let body_start = tag_end + 1;
                let body_end = body_start + doc[body_start..].find(&close)?;
                return Some(Element {
                    attrs,
                    inner: &doc[body_start..body_end],
                });
            }
            // longer tag name sharing the prefix
            _ => search = after_name,
        }
    }
    None
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=");
    let mut search = 0;
    while let Some(pos) = attrs[search..].find(&needle) {
        let start = search + pos;
        let preceded_by_space = attrs[..start]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        let value_start = start + needle.len();
        if preceded_by_space {
            let quote = attrs[value_start..].chars().next()?;
            if quote != '"' && quote != '\'' {
                return None;
            }
            let value = &attrs[value_start + 1..];
            let end = value.find(quote)?;
            return Some(&value[..end]);
        }
        search = value_start;
    }
    None
}
