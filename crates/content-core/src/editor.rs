use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use kuchiki::{traits::*, Attributes};

use crate::compose::{html_escape, image_paragraph};
use crate::error::UploadError;
use crate::normalize::{image_src, ImageUrlNormalizer};
use crate::upload::decode_upload_url;

/// The rich-text widget that owns live HTML while a form is open.
pub trait EditorSurface {
    fn html(&self) -> String;
    fn set_html(&mut self, html: &str);
    /// Inserts an image at the cursor. `url` is already absolute.
    fn insert_image(&mut self, url: &str);
    fn insert_placeholder(&mut self, text: &str);
    /// Returns false when the placeholder is no longer in the document.
    fn remove_placeholder(&mut self, text: &str) -> bool;
    fn replace_placeholder_with_image(&mut self, text: &str, url: &str) -> bool;
}

/// Runs every `img` source in `html` through the normalizer.
pub fn correct_image_sources(html: &str, normalizer: &ImageUrlNormalizer) -> String {
    rewrite_images(html, |attrs| {
        let Some(src) = image_src(attrs) else {
            return false;
        };
        let fixed = normalizer.normalize(&src);
        if attrs.get("src") == Some(fixed.as_str()) {
            return false;
        }
        attrs.insert("src", fixed);
        true
    })
    .unwrap_or_else(|| html.to_string())
}

/// Applies `rewrite` to the attributes of each image and re-serializes the
/// fragment. Returns `None` when nothing changed.
fn rewrite_images<F>(html: &str, mut rewrite: F) -> Option<String>
where
    F: FnMut(&mut Attributes) -> bool,
{
    if !html.to_ascii_lowercase().contains("<img") {
        return None;
    }
    let document = kuchiki::parse_html().one(html.to_string());
    let body = document.select_first("body").ok()?;
    let images: Vec<_> = body.as_node().select("img").ok()?.collect();
    let mut changed = false;
    for img in images {
        let mut attrs = img.attributes.borrow_mut();
        changed |= rewrite(&mut *attrs);
    }
    if !changed {
        return None;
    }
    let mut out = Vec::new();
    for child in body.as_node().children() {
        if let Err(e) = child.serialize(&mut out) {
            tracing::warn!(error = %e, "failed to serialize corrected editor html");
            return None;
        }
    }
    String::from_utf8(out).ok()
}

/// In-memory editor buffer. Images entering the document by any route are
/// normalized before they are stored.
#[derive(Debug, Clone)]
pub struct HtmlEditor {
    html: String,
    normalizer: ImageUrlNormalizer,
    recovery: ImageRecovery,
}

impl HtmlEditor {
    pub fn new(normalizer: ImageUrlNormalizer) -> Self {
        Self {
            html: String::new(),
            recovery: ImageRecovery::new(normalizer.clone()),
            normalizer,
        }
    }

    /// Handles a failed image load for `src`: the image is pointed at its
    /// normalized URL once, then marked as broken. The broken state lives in
    /// attributes the decomposer ignores, so the stored alt text survives.
    pub fn handle_image_error(&mut self, src: &str) -> RecoveryAction {
        let action = self.recovery.on_load_error(src);
        let rewritten = rewrite_images(&self.html, |attrs| {
            if attrs.get("src").map(str::trim) != Some(src.trim()) {
                return false;
            }
            match &action {
                RecoveryAction::Retry(url) => {
                    attrs.insert("src", url.clone());
                }
                RecoveryAction::Failed { message } => {
                    attrs.insert(LOAD_ERROR_ATTR, message.clone());
                    attrs.insert("class", FAILED_IMAGE_CLASS.to_string());
                }
            }
            true
        });
        if let Some(html) = rewritten {
            self.html = html;
        }
        action
    }

    fn placeholder_paragraph(text: &str) -> String {
        format!("<p>{}</p>", html_escape(text))
    }
}

impl EditorSurface for HtmlEditor {
    fn html(&self) -> String {
        self.html.clone()
    }

    fn set_html(&mut self, html: &str) {
        self.html = correct_image_sources(html, &self.normalizer);
    }

    fn insert_image(&mut self, url: &str) {
        let src = self.normalizer.normalize(url);
        self.html.push_str(&image_paragraph(&src, ""));
    }

    fn insert_placeholder(&mut self, text: &str) {
        self.html.push_str(&Self::placeholder_paragraph(text));
    }

    fn remove_placeholder(&mut self, text: &str) -> bool {
        let paragraph = Self::placeholder_paragraph(text);
        if !self.html.contains(&paragraph) {
            return false;
        }
        self.html = self.html.replacen(&paragraph, "", 1);
        true
    }

    fn replace_placeholder_with_image(&mut self, text: &str, url: &str) -> bool {
        let paragraph = Self::placeholder_paragraph(text);
        if !self.html.contains(&paragraph) {
            return false;
        }
        let src = self.normalizer.normalize(url);
        self.html = self.html.replacen(&paragraph, &image_paragraph(&src, ""), 1);
        true
    }
}

pub const FAILED_IMAGE_CLASS: &str = "image-load-failed";
/// Carries the load failure message on a broken image.
pub const LOAD_ERROR_ATTR: &str = "data-load-error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Load the image again from this URL.
    Retry(String),
    /// Give up and show the broken-image state.
    Failed { message: String },
}

/// Tracks which URLs were already retried so a failing image is retried at
/// most once.
#[derive(Debug, Clone)]
pub struct ImageRecovery {
    normalizer: ImageUrlNormalizer,
    retried: HashSet<String>,
}

impl ImageRecovery {
    pub fn new(normalizer: ImageUrlNormalizer) -> Self {
        Self {
            normalizer,
            retried: HashSet::new(),
        }
    }

    pub fn on_load_error(&mut self, src: &str) -> RecoveryAction {
        let src = src.trim();
        let fixed = self.normalizer.normalize(src);
        if !src.is_empty() && fixed != src && self.retried.insert(fixed.clone()) {
            tracing::debug!(from = src, to = %fixed, "retrying image with normalized url");
            return RecoveryAction::Retry(fixed);
        }
        tracing::debug!(src, "image failed to load");
        RecoveryAction::Failed {
            message: failure_message(src),
        }
    }
}

fn failure_message(src: &str) -> String {
    if src.is_empty() {
        "Image failed to load (no source)".to_string()
    } else {
        format!("Image failed to load: {}", src)
    }
}

const PLACEHOLDER_PREFIX: &str = "Uploading image";

static NEXT_UPLOAD_ID: AtomicU64 = AtomicU64::new(1);

fn next_placeholder() -> String {
    let id = NEXT_UPLOAD_ID.fetch_add(1, Ordering::Relaxed);
    format!("[{} #{}...]", PLACEHOLDER_PREFIX, id)
}

/// Inserts a placeholder, runs `upload`, then swaps the placeholder for the
/// uploaded image. On failure the placeholder is removed and the document is
/// left as it was. `upload` returns the raw response body.
pub fn upload_image<E, F>(
    editor: &mut E,
    normalizer: &ImageUrlNormalizer,
    upload: F,
) -> Result<String, UploadError>
where
    E: EditorSurface + ?Sized,
    F: FnOnce() -> Result<String, UploadError>,
{
    let placeholder = next_placeholder();
    editor.insert_placeholder(&placeholder);
    match upload().and_then(|body| decode_upload_url(&body)) {
        Ok(url) => {
            let absolute = normalizer.normalize(&url);
            if !editor.replace_placeholder_with_image(&placeholder, &absolute) {
                editor.insert_image(&absolute);
            }
            Ok(absolute)
        }
        Err(e) => {
            editor.remove_placeholder(&placeholder);
            tracing::warn!(error = %e, "image upload failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::BadHostPolicy;

    fn normalizer() -> ImageUrlNormalizer {
        ImageUrlNormalizer::new("https://api.example.com", BadHostPolicy::default())
    }

    #[test]
    fn corrects_relative_and_bad_host_sources() {
        let html = concat!(
            r#"<p>Hi<img src="uploads/a.png" alt="a"></p>"#,
            r#"<p><img src="https://api.example.com:8082/api/b.png"></p>"#,
            r#"<p><img src="https://cdn.example.org/c.png"></p>"#,
        );
        let fixed = correct_image_sources(html, &normalizer());
        assert!(fixed.contains(r#"src="https://api.example.com/uploads/a.png""#));
        assert!(fixed.contains(r#"src="https://api.example.com/api/b.png""#));
        assert!(fixed.contains(r#"src="https://cdn.example.org/c.png""#));
        assert!(!fixed.contains(":8082"));
        assert!(fixed.starts_with("<p>Hi<img"));
    }

    #[test]
    fn html_without_fixable_images_is_untouched() {
        let html = "<p>plain   text</p>";
        assert_eq!(correct_image_sources(html, &normalizer()), html);
        let html = r#"<p><img src="https://cdn.example.org/c.png"></p>"#;
        assert_eq!(correct_image_sources(html, &normalizer()), html);
    }

    #[test]
    fn editor_normalizes_images_on_load_and_insert() {
        let mut editor = HtmlEditor::new(normalizer());
        editor.set_html(r#"<p><img src="/uploads/a.png"></p>"#);
        assert!(editor
            .html()
            .contains(r#"src="https://api.example.com/uploads/a.png""#));
        editor.insert_image("uploads/b.png");
        assert!(editor
            .html()
            .ends_with(r#"<p><img src="https://api.example.com/uploads/b.png" alt=""></p>"#));
    }

    #[test]
    fn recovery_retries_once_then_fails() {
        let mut recovery = ImageRecovery::new(normalizer());
        let bad = "https://api.example.com:8082/api/x.png";
        assert_eq!(
            recovery.on_load_error(bad),
            RecoveryAction::Retry("https://api.example.com/api/x.png".into())
        );
        assert!(matches!(
            recovery.on_load_error("https://api.example.com/api/x.png"),
            RecoveryAction::Failed { .. }
        ));
        assert!(matches!(recovery.on_load_error(bad), RecoveryAction::Failed { .. }));
    }

    #[test]
    fn recovery_fails_immediately_when_nothing_to_fix() {
        let mut recovery = ImageRecovery::new(normalizer());
        assert_eq!(
            recovery.on_load_error("https://cdn.example.org/gone.png"),
            RecoveryAction::Failed {
                message: "Image failed to load: https://cdn.example.org/gone.png".into()
            }
        );
        assert!(matches!(recovery.on_load_error(""), RecoveryAction::Failed { .. }));
    }

    #[test]
    fn editor_marks_broken_images() {
        let mut editor = HtmlEditor::new(normalizer());
        editor.set_html(r#"<p><img src="https://cdn.example.org/gone.png" alt="x"></p>"#);
        let action = editor.handle_image_error("https://cdn.example.org/gone.png");
        assert!(matches!(action, RecoveryAction::Failed { .. }));
        let html = editor.html();
        assert!(html.contains(FAILED_IMAGE_CLASS));
        assert!(html.contains(r#"data-load-error="Image failed to load"#));
        assert!(html.contains(r#"alt="x""#));
    }

    #[test]
    fn editor_retries_once_then_marks_failed() {
        let mut editor = HtmlEditor::new(normalizer());
        // pasted markup reaches the buffer without going through set_html
        editor.html = r#"<p><img src="https://api.example.com:8082/api/x.png" alt="X"></p>"#.into();

        let first = editor.handle_image_error("https://api.example.com:8082/api/x.png");
        assert_eq!(
            first,
            RecoveryAction::Retry("https://api.example.com/api/x.png".into())
        );
        let html = editor.html();
        assert!(html.contains(r#"src="https://api.example.com/api/x.png""#));
        assert!(!html.contains(FAILED_IMAGE_CLASS));

        let second = editor.handle_image_error("https://api.example.com/api/x.png");
        assert!(matches!(second, RecoveryAction::Failed { .. }));
        let html = editor.html();
        assert!(html.contains(FAILED_IMAGE_CLASS));
        assert!(html.contains(r#"src="https://api.example.com/api/x.png""#));
        assert!(html.contains(r#"alt="X""#));
    }

    #[test]
    fn tag_case_does_not_hide_images() {
        let fixed = correct_image_sources(r#"<P><Img SRC="uploads/a.png"></P>"#, &normalizer());
        assert!(fixed.contains(r#"src="https://api.example.com/uploads/a.png""#));
    }

    #[test]
    fn upload_replaces_placeholder_with_image() {
        let mut editor = HtmlEditor::new(normalizer());
        editor.set_html("<p>Body</p>");
        let url = upload_image(&mut editor, &normalizer(), || {
            Ok(r#"{"url": "/api/uploads/new.png"}"#.to_string())
        })
        .unwrap();
        assert_eq!(url, "https://api.example.com/api/uploads/new.png");
        let html = editor.html();
        assert!(!html.contains(PLACEHOLDER_PREFIX));
        assert_eq!(
            html,
            r#"<p>Body</p><p><img src="https://api.example.com/api/uploads/new.png" alt=""></p>"#
        );
    }

    #[test]
    fn failed_upload_leaves_document_unchanged() {
        let mut editor = HtmlEditor::new(normalizer());
        editor.set_html("<p>Body</p>");
        let before = editor.html();
        let err = upload_image(&mut editor, &normalizer(), || {
            Err(UploadError::Failed("413 payload too large".into()))
        })
        .unwrap_err();
        assert!(matches!(err, UploadError::Failed(_)));
        assert_eq!(editor.html(), before);

        let err = upload_image(&mut editor, &normalizer(), || Ok("{}".to_string())).unwrap_err();
        assert!(matches!(err, UploadError::MissingUrl));
        assert_eq!(editor.html(), before);
    }

    /// Records calls; placeholders vanish as if the user deleted them.
    #[derive(Default)]
    struct ForgetfulEditor {
        calls: Vec<String>,
    }

    impl EditorSurface for ForgetfulEditor {
        fn html(&self) -> String {
            String::new()
        }
        fn set_html(&mut self, _html: &str) {}
        fn insert_image(&mut self, url: &str) {
            self.calls.push(format!("insert_image {url}"));
        }
        fn insert_placeholder(&mut self, text: &str) {
            self.calls.push(format!("insert_placeholder {text}"));
        }
        fn remove_placeholder(&mut self, _text: &str) -> bool {
            self.calls.push("remove_placeholder".into());
            false
        }
        fn replace_placeholder_with_image(&mut self, _text: &str, _url: &str) -> bool {
            self.calls.push("replace_placeholder".into());
            false
        }
    }

    #[test]
    fn upload_still_inserts_when_placeholder_was_deleted() {
        let mut editor = ForgetfulEditor::default();
        let url = upload_image(&mut editor, &normalizer(), || {
            Ok(r#"{"file_url":"a.png"}"#.into())
        });
        assert_eq!(url.unwrap(), "https://api.example.com/a.png");
        assert_eq!(editor.calls.len(), 3);
        assert!(editor.calls[0].starts_with("insert_placeholder [Uploading image #"));
        assert_eq!(editor.calls[1], "replace_placeholder");
        assert_eq!(editor.calls[2], "insert_image https://api.example.com/a.png");
    }
}
