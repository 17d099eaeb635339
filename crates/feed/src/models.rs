use chrono::{DateTime, Utc};

/// Raw fields of one `<item>` read from an upstream RSS document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
    pub guid: Option<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelImage {
    pub url: String,
    pub title: String,
    pub link: String,
}

/// Channel-level metadata of a rendered feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Absolute URL of the feed itself, emitted as `atom:link rel="self"`.
    pub self_link: Option<String>,
    pub language: String,
    pub categories: Vec<String>,
    pub copyright: Option<String>,
    pub managing_editor: Option<String>,
    pub web_master: Option<String>,
    /// Minutes a reader may cache the feed.
    pub ttl: Option<u32>,
    pub generator: Option<String>,
    pub image: Option<ChannelImage>,
}

impl Channel {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: description.into(),
            self_link: None,
            language: "en-us".to_string(),
            categories: Vec::new(),
            copyright: None,
            managing_editor: None,
            web_master: None,
            ttl: None,
            generator: None,
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    pub length: u64,
}

/// One rendered feed item. `description` is HTML and is emitted as CDATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub categories: Vec<String>,
    pub author: Option<String>,
    pub enclosure: Option<Enclosure>,
}

impl Item {
    pub fn new(
        guid: impl Into<String>,
        title: impl Into<String>,
        pub_date: DateTime<Utc>,
    ) -> Self {
        Self {
            guid: guid.into(),
            title: title.into(),
            link: None,
            description: String::new(),
            pub_date,
            categories: Vec::new(),
            author: None,
            enclosure: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn description(mut self, html: impl Into<String>) -> Self {
        self.description = html.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !category.is_empty() {
            self.categories.push(category);
        }
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn enclosure(mut self, enclosure: Enclosure) -> Self {
        self.enclosure = Some(enclosure);
        self
    }
}

/// A channel and its items, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub channel: Channel,
    pub items: Vec<Item>,
}

impl FeedDocument {
    pub fn new(channel: Channel, items: Vec<Item>) -> Self {
        Self { channel, items }
    }
}
