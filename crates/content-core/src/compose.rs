use crate::normalize::ImageUrlNormalizer;
use crate::types::{ContentBlock, ContentDocument};

/// Renders stored blocks as editor HTML, one `<p>` per line of text and per
/// image. Image blocks without a location are skipped.
pub fn compose(doc: &ContentDocument, normalizer: &ImageUrlNormalizer) -> String {
    let mut html = String::new();
    for (index, block) in doc.iter().enumerate() {
        match block {
            ContentBlock::Text(text) => push_text(&mut html, &text.content),
            ContentBlock::Image(img) => {
                let url = img.url().trim();
                if url.is_empty() {
                    tracing::warn!(index, alt = img.alt(), "image block has no url, skipping");
                    continue;
                }
                html.push_str(&image_paragraph(&normalizer.normalize(url), img.alt()));
            }
        }
    }
    html
}

fn push_text(html: &mut String, content: &str) {
    let lines: Vec<&str> = content
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() > 1 {
        for line in lines {
            push_paragraph(html, line);
        }
    } else {
        push_paragraph(html, content);
    }
}

fn push_paragraph(html: &mut String, text: &str) {
    html.push_str("<p>");
    html.push_str(&html_escape(text));
    html.push_str("</p>");
}

pub(crate) fn image_paragraph(src: &str, alt: &str) -> String {
    format!(
        "<p><img src=\"{}\" alt=\"{}\"></p>",
        html_escape(src),
        html_escape(alt)
    )
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
