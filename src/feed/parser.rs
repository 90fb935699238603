//! Splits a feed document into entries, keeping each RSS `<item>` verbatim.
//!
//! Documents without `item` elements (Atom) go through feed-rs and get an
//! equivalent `<item>` synthesised for the raw store.

use std::borrow::Cow;
use std::collections::BTreeMap;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{AppError, Result};
use crate::models::FeedEntry;

const ITEM: &[u8] = b"item";

/// Split a fetched document into entries.
///
/// `charset` is the transport's `Content-Type` charset, used only when the
/// document has neither a byte-order mark nor an encoding declaration.
pub fn parse_feed_document(bytes: &[u8], charset: Option<&str>) -> Result<Vec<FeedEntry>> {
    let text = decode_document(bytes, charset);
    match scan_items(&text) {
        Ok(entries) if !entries.is_empty() => Ok(entries),
        _ => parse_with_feed_rs(bytes),
    }
}

/// Parse a stored raw item file back into its fields.
pub fn parse_raw_item(xml: &str) -> Result<FeedEntry> {
    scan_items(xml)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Xml("no item element".to_string()))
}

/// Decode document bytes: byte-order mark, then XML declaration, then
/// transport charset, then UTF-8.
pub fn decode_document<'a>(bytes: &'a [u8], charset: Option<&str>) -> Cow<'a, str> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| declared_encoding(bytes))
        .or_else(|| {
            charset
                .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
                .map(Encoding::output_encoding)
        })
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("Malformed {} sequences replaced while decoding feed", used.name());
    }
    text
}

/// Encoding named by the `<?xml ... encoding="..."?>` declaration.
///
/// A UTF-16 label on a document readable as ASCII is wrong, so labels map
/// through `output_encoding`.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let mut reader = Reader::from_reader(bytes);
    loop {
        match reader.read_event() {
            Ok(Event::Decl(decl)) => {
                let label = decl.encoding()?.ok()?;
                return Encoding::for_label(&label).map(Encoding::output_encoding);
            }
            Ok(Event::Text(_) | Event::Comment(_)) => {}
            _ => return None,
        }
    }
}

fn xml_err(e: impl std::fmt::Display) -> AppError {
    AppError::Xml(e.to_string())
}

fn scan_items(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    // namespace declarations of each open ancestor element
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) if e.local_name().as_ref() == ITEM => {
                let name = e.name();
                let inner = reader.read_text(name).map_err(xml_err)?;
                let start = String::from_utf8_lossy(&e);
                let body = format!("<{}>{}", start, inner);
                let raw_xml = format!(
                    "<{}{}>{}</{}>",
                    start,
                    inherited_namespaces(&scopes, &e, &body),
                    inner,
                    String::from_utf8_lossy(name.as_ref())
                );
                entries.push(entry_from_children(&inner, raw_xml)?);
            }
            Event::Start(e) => scopes.push(namespace_decls(&e)),
            Event::End(_) => {
                scopes.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// `(prefix, uri)` for each `xmlns`/`xmlns:*` attribute; the default namespace has an empty prefix.
fn namespace_decls(start: &BytesStart) -> Vec<(String, String)> {
    start
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = attr.key.as_ref();
            let prefix = if key == b"xmlns" {
                ""
            } else {
                std::str::from_utf8(key.strip_prefix(b"xmlns:")?).ok()?
            };
            let uri = attr.unescape_value().ok()?;
            Some((prefix.to_string(), uri.into_owned()))
        })
        .collect()
}

/// Declarations to add to an item's start tag so the element resolves its
/// prefixes once it is cut out of the document.
fn inherited_namespaces(scopes: &[Vec<(String, String)>], item: &BytesStart, body: &str) -> String {
    let own = namespace_decls(item);
    let mut in_scope: BTreeMap<&str, &str> = BTreeMap::new();
    for (prefix, uri) in scopes.iter().flatten() {
        in_scope.insert(prefix.as_str(), uri.as_str());
    }

    let mut decls = String::new();
    for (prefix, uri) in in_scope {
        if own.iter().any(|(p, _)| p == prefix) || !uses_prefix(body, prefix) {
            continue;
        }
        if prefix.is_empty() {
            decls.push_str(&format!(" xmlns=\"{}\"", escape(uri)));
        } else {
            decls.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(uri)));
        }
    }
    decls
}

/// Whether an element or attribute name in `body` carries `prefix`.
/// Unprefixed names always use the default namespace.
fn uses_prefix(body: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    let qualified = format!("{prefix}:");
    body.match_indices(&qualified).any(|(at, _)| {
        body[..at].ends_with(|c: char| c == '<' || c == '/' || c.is_whitespace())
    })
}

/// Collect the leading text of the item's first direct `title`, `pubDate`,
/// `link` and `description` children.
///
/// Title and timestamp keep their surrounding whitespace: they are the index
/// key and the title is hashed into the raw file name.
fn entry_from_children(inner: &str, raw_xml: String) -> Result<FeedEntry> {
    let mut reader = Reader::from_str(inner);
    let mut entry = FeedEntry {
        raw_xml,
        ..Default::default()
    };
    let mut depth = 0usize;
    // cleared at the first nested element, so tail text is not collected
    let mut field: Option<Vec<u8>> = None;
    let mut seen: Vec<Vec<u8>> = Vec::new();

    loop {
        let text = match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                field = if depth == 0 {
                    first_of_name(&mut seen, e.name().as_ref())
                } else {
                    None
                };
                depth += 1;
                continue;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    first_of_name(&mut seen, e.name().as_ref());
                } else {
                    field = None;
                }
                continue;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    field = None;
                }
                continue;
            }
            Event::Text(t) if depth == 1 => match t.unescape() {
                Ok(text) => text.into_owned(),
                Err(_) => String::from_utf8_lossy(&t).into_owned(),
            },
            Event::CData(c) if depth == 1 => String::from_utf8_lossy(&c).into_owned(),
            Event::Eof => break,
            _ => continue,
        };

        let slot = match field.as_deref() {
            Some(b"title") => &mut entry.title,
            Some(b"pubDate") => &mut entry.pub_date,
            Some(b"link") => &mut entry.link,
            Some(b"description") => &mut entry.description,
            _ => continue,
        };
        slot.get_or_insert_with(String::new).push_str(&text);
    }

    if let Some(link) = entry.link.as_mut() {
        *link = link.trim().to_string();
    }

    Ok(entry)
}

fn first_of_name(seen: &mut Vec<Vec<u8>>, name: &[u8]) -> Option<Vec<u8>> {
    if seen.iter().any(|s| s == name) {
        return None;
    }
    seen.push(name.to_vec());
    Some(name.to_vec())
}

fn parse_with_feed_rs(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes)?;
    Ok(feed.entries.into_iter().map(entry_from_feed_rs).collect())
}

fn entry_from_feed_rs(entry: feed_rs::model::Entry) -> FeedEntry {
    let link = entry.links.first().map(|l| l.href.clone());
    let title = entry.title.map(|t| t.content);
    let pub_date = entry.published.or(entry.updated).map(|dt| dt.to_rfc2822());
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body));

    let mut raw_xml = String::from("<item>");
    for (tag, value) in [
        ("title", &title),
        ("link", &link),
        ("pubDate", &pub_date),
        ("description", &description),
    ] {
        if let Some(value) = value {
            raw_xml.push_str(&format!("<{tag}>{}</{tag}>", escape(value.as_str())));
        }
    }
    raw_xml.push_str("</item>");

    FeedEntry {
        title,
        pub_date,
        link,
        description,
        raw_xml,
    }
}
