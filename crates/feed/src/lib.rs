pub mod html;
mod error;
mod models;
mod parser;
mod render;

pub use error::FeedError;
pub use models::{Channel, ChannelImage, Enclosure, FeedDocument, FeedEntry, Item};
pub use parser::parse_items;
pub use render::{render, RSS_CONTENT_TYPE};

pub type Result<T> = std::result::Result<T, FeedError>;
