//! Tolerant extraction of `urlset` and `sitemapindex` documents.
//!
//! This is not a validating parser: it walks the event stream and picks out
//! `<url>` and `<sitemap>` blocks by local name, so namespace prefixes,
//! unknown elements and a missing XML declaration are all fine. Only direct
//! children of a block are read; extension blocks such as `<image:image>`
//! are skipped whole. A broken
//! document yields whatever was collected before the error.

use crate::entry::{SitemapEntry, parse_lastmod, parse_priority};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader as XmlReader;
use tracing::{debug, warn};

/// What a sitemap document turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// A `urlset`: page entries in document order.
    UrlSet(Vec<SitemapEntry>),
    /// A `sitemapindex`: locations of sub-sitemaps in document order.
    Index(Vec<String>),
    /// Neither kind of block was found.
    Unrecognized,
}

impl SitemapDocument {
    pub fn is_index(&self) -> bool {
        matches!(self, SitemapDocument::Index(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Loc,
    LastMod,
    Priority,
}

#[derive(Debug, Default)]
struct Block {
    loc: Option<String>,
    lastmod: Option<String>,
    priority: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockKind {
    Url,
    Sitemap,
}

/// Parse one XML document. `<url>` blocks take precedence: a document with
/// at least one `<url>` carrying a `<loc>` is a urlset even if it also
/// contains `<sitemap>` blocks.
pub fn parse_document(xml: &str, source_name: &str) -> SitemapDocument {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().check_end_names = false;

    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut sub_sitemaps: Vec<String> = Vec::new();

    let mut block: Option<(BlockKind, Block)> = None;
    // Elements open inside the current block. Fields are only read from
    // direct children, so `<image:loc>` and friends never shadow `<loc>`.
    let mut nested = 0usize;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(ref e)) => {
                let name = e.local_name();
                if block.is_some() {
                    if nested == 0 {
                        field = match name.as_ref() {
                            b"loc" => Some(Field::Loc),
                            b"lastmod" => Some(Field::LastMod),
                            b"priority" => Some(Field::Priority),
                            _ => None,
                        };
                        text.clear();
                    }
                    nested += 1;
                } else {
                    match name.as_ref() {
                        b"url" => block = Some((BlockKind::Url, Block::default())),
                        b"sitemap" => block = Some((BlockKind::Sitemap, Block::default())),
                        _ => {}
                    }
                    nested = 0;
                }
            }
            Ok(XmlEvent::Text(ref e)) => {
                if field.is_some() {
                    match e.decode() {
                        Ok(decoded) => text.push_str(&decoded),
                        Err(_) => text.push_str(&String::from_utf8_lossy(e)),
                    }
                }
            }
            Ok(XmlEvent::CData(ref e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(XmlEvent::GeneralRef(ref e)) => {
                if field.is_some() {
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        text.push(ch);
                    } else {
                        let name = e.decode().unwrap_or_default();
                        match resolve_predefined_entity(&name) {
                            Some(resolved) => text.push_str(resolved),
                            None => {
                                text.push('&');
                                text.push_str(&name);
                                text.push(';');
                            }
                        }
                    }
                }
            }
            Ok(XmlEvent::End(_)) if nested > 0 => {
                nested -= 1;
                if nested == 0 {
                    if let (Some(current), Some((_, partial))) = (field.take(), block.as_mut()) {
                        let value = text.trim().to_string();
                        match current {
                            Field::Loc => partial.loc = Some(value),
                            Field::LastMod => partial.lastmod = Some(value),
                            Field::Priority => partial.priority = Some(value),
                        }
                    }
                    text.clear();
                }
            }
            Ok(XmlEvent::End(ref e)) => match e.local_name().as_ref() {
                b"url" => {
                    if let Some((BlockKind::Url, partial)) = block.take() {
                        match partial.loc.filter(|loc| !loc.is_empty()) {
                            Some(loc) => {
                                let last_modified = partial.lastmod.as_deref().and_then(|raw| {
                                    let parsed = parse_lastmod(raw);
                                    if parsed.is_none() {
                                        debug!("Ignoring unparsable lastmod '{}' for {}", raw, loc);
                                    }
                                    parsed
                                });
                                let priority = partial.priority.as_deref().and_then(|raw| {
                                    let parsed = parse_priority(raw);
                                    if parsed.is_none() {
                                        debug!("Ignoring invalid priority '{}' for {}", raw, loc);
                                    }
                                    parsed
                                });
                                entries.push(
                                    SitemapEntry::new(loc, source_name.to_string())
                                        .with_last_modified(last_modified)
                                        .with_priority(priority),
                                );
                            }
                            None => debug!("Skipping <url> block without <loc> in {}", source_name),
                        }
                    }
                }
                b"sitemap" => {
                    if let Some((BlockKind::Sitemap, partial)) = block.take()
                        && let Some(loc) = partial.loc.filter(|loc| !loc.is_empty())
                    {
                        sub_sitemaps.push(loc);
                    }
                }
                _ => {}
            },
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                warn!(
                    "XML error in {} at byte {}: {}",
                    source_name,
                    reader.error_position(),
                    e
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !entries.is_empty() {
        SitemapDocument::UrlSet(entries)
    } else if !sub_sitemaps.is_empty() {
        SitemapDocument::Index(sub_sitemaps)
    } else {
        SitemapDocument::Unrecognized
    }
}
