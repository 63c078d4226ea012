use crate::compose::compose;
use crate::config::ApiConfig;
use crate::editor::HtmlEditor;
use crate::normalize::{decompose, ImageUrlNormalizer};
use crate::types::ContentDocument;

/// Both directions of the editor/storage conversion bound to one API origin.
#[derive(Debug, Clone)]
pub struct ContentCodec {
    normalizer: ImageUrlNormalizer,
}

impl ContentCodec {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            normalizer: ImageUrlNormalizer::from_config(config),
        }
    }

    pub fn normalizer(&self) -> &ImageUrlNormalizer {
        &self.normalizer
    }

    pub fn decompose(&self, html: &str) -> ContentDocument {
        decompose(html, &self.normalizer)
    }

    pub fn compose(&self, doc: &ContentDocument) -> String {
        compose(doc, &self.normalizer)
    }

    pub fn normalize_url(&self, url: &str) -> String {
        self.normalizer.normalize(url)
    }

    pub fn storage_url(&self, url: &str) -> String {
        self.normalizer.to_storage(url)
    }

    /// An empty editor buffer sharing this codec's origin.
    pub fn editor(&self) -> HtmlEditor {
        HtmlEditor::new(self.normalizer.clone())
    }
}
