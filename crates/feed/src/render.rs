use chrono::{DateTime, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::FeedError;
use crate::html::xml_safe;
use crate::models::{Channel, FeedDocument, Item};

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Serialize a document as RSS 2.0.
///
/// Characters XML 1.0 forbids are dropped from every value. Items are written in the order given. `built_at` only feeds the
/// channel's `lastBuildDate` and `pubDate`, so two renders of the same
/// document with the same clock are byte-identical.
pub fn render(doc: &FeedDocument, built_at: DateTime<Utc>) -> Result<String, FeedError> {
    let mut w = RssWriter::new();

    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0"), ("xmlns:atom", ATOM_NS)]),
    ))?;
    w.start("channel")?;
    w.channel(&doc.channel, built_at)?;
    for item in &doc.items {
        w.item(item)?;
    }
    w.end("channel")?;
    w.end("rss")?;

    w.finish()
}

struct RssWriter {
    inner: Writer<Vec<u8>>,
}

impl RssWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), FeedError> {
        self.inner
            .write_event(event)
            .map_err(|e| FeedError::Render(e.to_string()))
    }

    fn start(&mut self, name: &str) -> Result<(), FeedError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<(), FeedError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, name: &str, value: &str) -> Result<(), FeedError> {
        self.start(name)?;
        self.event(Event::Text(BytesText::new(&xml_safe(value))))?;
        self.end(name)
    }

    fn opt_text(&mut self, name: &str, value: Option<&str>) -> Result<(), FeedError> {
        match value {
            Some(value) => self.text(name, value),
            None => Ok(()),
        }
    }

    /// Write `value` as CDATA. A literal `]]>` cannot appear inside one
    /// section, so the text is split across adjacent sections at each
    /// occurrence.
    fn cdata(&mut self, name: &str, value: &str) -> Result<(), FeedError> {
        self.start(name)?;
        let value = xml_safe(value);
        let parts: Vec<&str> = value.split("]]>").collect();
        let last = parts.len() - 1;
        for (i, part) in parts.iter().enumerate() {
            let mut section = String::new();
            if i > 0 {
                section.push('>');
            }
            section.push_str(part);
            if i < last {
                section.push_str("]]");
            }
            self.event(Event::CData(BytesCData::new(section)))?;
        }
        self.end(name)
    }

    fn channel(&mut self, channel: &Channel, built_at: DateTime<Utc>) -> Result<(), FeedError> {
        let built = built_at.to_rfc2822();

        self.text("title", &channel.title)?;
        self.text("link", &channel.link)?;
        self.text("description", &channel.description)?;
        if let Some(self_link) = &channel.self_link {
            let href = xml_safe(self_link);
            self.event(Event::Empty(BytesStart::new("atom:link").with_attributes([
                ("href", href.as_ref()),
                ("rel", "self"),
                ("type", "application/rss+xml"),
            ])))?;
        }
        self.text("language", &channel.language)?;
        for category in &channel.categories {
            self.text("category", category)?;
        }
        self.opt_text("copyright", channel.copyright.as_deref())?;
        self.opt_text("managingEditor", channel.managing_editor.as_deref())?;
        self.opt_text("webMaster", channel.web_master.as_deref())?;
        self.text("lastBuildDate", &built)?;
        self.text("pubDate", &built)?;
        if let Some(ttl) = channel.ttl {
            self.text("ttl", &ttl.to_string())?;
        }
        self.opt_text("generator", channel.generator.as_deref())?;
        if let Some(image) = &channel.image {
            self.start("image")?;
            self.text("url", &image.url)?;
            self.text("title", &image.title)?;
            self.text("link", &image.link)?;
            self.end("image")?;
        }
        Ok(())
    }

    fn item(&mut self, item: &Item) -> Result<(), FeedError> {
        self.start("item")?;
        self.text("title", &item.title)?;
        self.cdata("description", &item.description)?;
        self.opt_text("link", item.link.as_deref())?;
        self.event(Event::Start(
            BytesStart::new("guid").with_attributes([("isPermaLink", "false")]),
        ))?;
        self.event(Event::Text(BytesText::new(&xml_safe(&item.guid))))?;
        self.end("guid")?;
        self.text("pubDate", &item.pub_date.to_rfc2822())?;
        for category in &item.categories {
            self.text("category", category)?;
        }
        self.opt_text("author", item.author.as_deref())?;
        if let Some(enclosure) = &item.enclosure {
            let length = enclosure.length.to_string();
            let url = xml_safe(&enclosure.url);
            let mime_type = xml_safe(&enclosure.mime_type);
            self.event(Event::Empty(BytesStart::new("enclosure").with_attributes([
                ("url", url.as_ref()),
                ("type", mime_type.as_ref()),
                ("length", length.as_str()),
            ])))?;
        }
        self.end("item")
    }

    fn finish(self) -> Result<String, FeedError> {
        String::from_utf8(self.inner.into_inner()).map_err(|e| FeedError::Render(e.to_string()))
    }
}
