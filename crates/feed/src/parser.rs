use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::FeedError;
use crate::models::FeedEntry;

/// Extract the `<item>` elements of an RSS document.
///
/// Text and CDATA inside a field are concatenated. Entities quick-xml does
/// not know (such as `&nbsp;`) are kept verbatim for [`crate::html`] to
/// decode later.
pub fn parse_items(xml: &str) -> Result<Vec<FeedEntry>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut buf = Vec::new();

    let mut current_item: Option<FeedEntryBuilder> = None;
    let mut current_element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if name == "item" {
                    current_item = Some(FeedEntryBuilder::default());
                } else if let Some(ref mut item) = current_item {
                    item.open(&name);
                }
                current_element = name;
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if name == "item" {
                    if let Some(builder) = current_item.take() {
                        items.push(builder.build());
                    }
                } else if let Some(ref mut item) = current_item {
                    item.close(&name);
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut item) = current_item {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    item.push(&current_element, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref mut item) = current_item {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    item.push(&current_element, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!("Parsed {} items from feed", items.len());
    Ok(items)
}

#[derive(Default)]
struct FeedEntryBuilder {
    title: String,
    link: String,
    description: String,
    pub_date: Option<String>,
    dc_date: Option<String>,
    guid: Option<String>,
    categories: Vec<String>,
    open_category: Option<String>,
}

impl FeedEntryBuilder {
    fn open(&mut self, name: &str) {
        if name == "category" {
            self.open_category = Some(String::new());
        }
    }

    fn close(&mut self, name: &str) {
        if name == "category" {
            if let Some(category) = self.open_category.take() {
                if !category.is_empty() {
                    self.categories.push(category);
                }
            }
        }
    }

    fn push(&mut self, element: &str, text: &str) {
        match element {
            "title" => self.title.push_str(text),
            "link" => self.link.push_str(text),
            "description" => self.description.push_str(text),
            "pubDate" => self.pub_date.get_or_insert_with(String::new).push_str(text),
            "dc:date" => self.dc_date.get_or_insert_with(String::new).push_str(text),
            "guid" => self.guid.get_or_insert_with(String::new).push_str(text),
            "category" => {
                if let Some(category) = self.open_category.as_mut() {
                    category.push_str(text);
                }
            }
            _ => {}
        }
    }

    fn build(self) -> FeedEntry {
        FeedEntry {
            title: self.title,
            link: self.link,
            description: self.description,
            pub_date: self.pub_date.or(self.dc_date),
            guid: self.guid,
            categories: self.categories,
        }
    }
}
