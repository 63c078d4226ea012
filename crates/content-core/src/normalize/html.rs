use kuchiki::{traits::*, NodeRef};

use crate::types::{ContentBlock, ContentDocument};

use super::image_url::ImageUrlNormalizer;
use super::images::{image_alt, image_src};
use super::inline::{
    append_inline_text, inline_text, is_skippable_tag, normalize_inline_text, InlineContext,
};

/// What the editor emits for a document with nothing typed into it.
pub const EMPTY_PARAGRAPH: &str = "<p><br></p>";

/// Splits editor HTML into stored blocks. Only the top-level children of the
/// fragment are treated as blocks; nothing here fails, unusable input gives
/// the empty-text sentinel.
pub fn decompose(html: &str, normalizer: &ImageUrlNormalizer) -> ContentDocument {
    let html = html.trim();
    if html.is_empty() || html == EMPTY_PARAGRAPH {
        return ContentDocument::sentinel();
    }
    let document = kuchiki::parse_html().one(html.to_string());
    let Ok(body) = document.select_first("body") else {
        tracing::debug!("parsed fragment has no body, using empty document");
        return ContentDocument::sentinel();
    };

    let mut blocks = Vec::new();
    for child in body.as_node().children() {
        extract_blocks(&child, normalizer, &mut blocks);
    }
    if blocks.is_empty() {
        tracing::debug!("no content extracted from {} bytes of html", html.len());
    }
    ContentDocument::new(blocks).normalized()
}

fn heading_level(tag: &str) -> Option<u8> {
    (tag.len() == 2 && tag.starts_with('h'))
        .then(|| tag[1..].parse::<u8>().ok())
        .flatten()
        .filter(|lvl| (1..=6).contains(lvl))
}

fn extract_blocks(node: &NodeRef, normalizer: &ImageUrlNormalizer, out: &mut Vec<ContentBlock>) {
    if let Some(text) = node.as_text() {
        push_text(out, normalize_inline_text(&text.borrow()));
        return;
    }
    let Some(el) = node.as_element() else {
        return;
    };
    let tag = el.name.local.to_lowercase();
    if heading_level(&tag).is_some() {
        push_text(out, inline_text(node));
        return;
    }
    match tag.as_str() {
        "li" | "blockquote" => push_text(out, inline_text(node)),
        "ul" | "ol" => {
            for li in node.children() {
                if let Some(li_el) = li.as_element() {
                    if &*li_el.name.local == "li" {
                        push_text(out, inline_text(&li));
                    }
                }
            }
        }
        "img" => out.extend(image_block(node, normalizer)),
        t if is_skippable_tag(t) => {}
        // p, div and anything unrecognised: keep text and images in order
        _ => split_at_images(node, normalizer, out),
    }
}

fn split_at_images(node: &NodeRef, normalizer: &ImageUrlNormalizer, out: &mut Vec<ContentBlock>) {
    let mut pending = String::new();
    {
        let mut on_image = |text: &mut String, img: &NodeRef| {
            push_text(out, normalize_inline_text(text));
            text.clear();
            out.extend(image_block(img, normalizer));
        };
        let mut ctx = InlineContext {
            on_image: &mut on_image,
        };
        for child in node.children() {
            append_inline_text(&child, &mut pending, &mut ctx);
        }
    }
    push_text(out, normalize_inline_text(&pending));
}

fn push_text(out: &mut Vec<ContentBlock>, text: String) {
    if !text.is_empty() {
        out.push(ContentBlock::text(text));
    }
}

fn image_block(node: &NodeRef, normalizer: &ImageUrlNormalizer) -> Option<ContentBlock> {
    let el = node.as_element()?;
    let attrs = el.attributes.borrow();
    let Some(src) = image_src(&attrs) else {
        tracing::debug!("dropping image without a source");
        return None;
    };
    Some(ContentBlock::image(
        normalizer.to_storage(&src),
        image_alt(&attrs),
    ))
}
