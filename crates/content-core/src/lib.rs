pub mod codec;
pub mod compose;
pub mod config;
pub mod editor;
pub mod error;
pub mod normalize;
pub mod record;
pub mod types;
pub mod upload;

pub use codec::ContentCodec;
pub use types::{ContentBlock, ContentDocument, ImageBlock, TextBlock};
