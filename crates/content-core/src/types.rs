use serde::{Deserialize, Serialize};

/// One unit of stored rich content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireBlock", from = "WireBlock")]
pub enum ContentBlock {
    Text(TextBlock),
    Image(ImageBlock),
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock::new(content))
    }

    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Self {
        ContentBlock::Image(ImageBlock::new(url, alt))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(t) => Some(&t.content),
            ContentBlock::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageBlock> {
        match self {
            ContentBlock::Image(img) => Some(img),
            ContentBlock::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlock {
    pub content: String,
}

impl TextBlock {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Image reference. The wire format carries the location twice (`url` and
/// `content`); only one copy is kept here so the two cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBlock {
    url: String,
    alt: String,
}

impl ImageBlock {
    pub fn new(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: alt.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Same value as [`ImageBlock::url`], kept for consumers reading `content`.
    pub fn content(&self) -> &str {
        &self.url
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }

}

/// JSON shape exchanged with the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireBlock {
    Text {
        #[serde(default)]
        content: String,
    },
    Image {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        alt: Option<String>,
    },
}

impl From<ContentBlock> for WireBlock {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text(t) => WireBlock::Text { content: t.content },
            ContentBlock::Image(img) => WireBlock::Image {
                url: Some(img.url.clone()),
                content: Some(img.url),
                alt: Some(img.alt),
            },
        }
    }
}

impl From<WireBlock> for ContentBlock {
    fn from(wire: WireBlock) -> Self {
        match wire {
            WireBlock::Text { content } => ContentBlock::text(content),
            WireBlock::Image { url, content, alt } => {
                let url = url
                    .filter(|u| !u.trim().is_empty())
                    .or(content)
                    .unwrap_or_default();
                ContentBlock::image(url, alt.unwrap_or_default())
            }
        }
    }
}

/// Ordered blocks making up one record's body, top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDocument {
    blocks: Vec<ContentBlock>,
}

impl ContentDocument {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }

    /// The "no content yet" document: a single empty text block.
    pub fn sentinel() -> Self {
        Self {
            blocks: vec![ContentBlock::text("")],
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.blocks.as_slice(), [ContentBlock::Text(t)] if t.content.is_empty())
    }

    /// Replaces an empty block list with the sentinel.
    pub fn normalized(self) -> Self {
        if self.blocks.is_empty() {
            Self::sentinel()
        } else {
            self
        }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentBlock> {
        self.blocks.iter()
    }
}

impl From<Vec<ContentBlock>> for ContentDocument {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::new(blocks)
    }
}

impl FromIterator<ContentBlock> for ContentDocument {
    fn from_iter<I: IntoIterator<Item = ContentBlock>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ContentDocument {
    type Item = &'a ContentBlock;
    type IntoIter = std::slice::Iter<'a, ContentBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
