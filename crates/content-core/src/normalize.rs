mod html;
mod image_url;
mod images;
mod inline;


pub use html::{decompose, EMPTY_PARAGRAPH};
pub use image_url::{BadHostPolicy, ImageUrlNormalizer, LEGACY_BAD_PORT};

pub(crate) use images::image_src;
