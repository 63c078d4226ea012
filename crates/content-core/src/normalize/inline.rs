use kuchiki::NodeRef;

const BR_MARKER: char = '\x1A';

/// Callbacks for inline text collection. `on_image` receives the text
/// gathered so far and the `img` node, in document order.
pub(crate) struct InlineContext<'a, F>
where
    F: FnMut(&mut String, &NodeRef),
{
    pub(crate) on_image: &'a mut F,
}

/// Plain text of `node` with images ignored.
pub(crate) fn inline_text(node: &NodeRef) -> String {
    let mut out = String::new();
    let mut skip_image = |_: &mut String, _: &NodeRef| {};
    let mut ctx = InlineContext {
        on_image: &mut skip_image,
    };
    append_inline_text(node, &mut out, &mut ctx);
    normalize_inline_text(&out)
}

pub(crate) fn append_inline_text<F>(node: &NodeRef, out: &mut String, ctx: &mut InlineContext<'_, F>)
where
    F: FnMut(&mut String, &NodeRef),
{
    if let Some(text) = node.as_text() {
        out.push_str(&text.borrow());
        return;
    }
    let Some(el) = node.as_element() else {
        for child in node.children() {
            append_inline_text(&child, out, ctx);
        }
        return;
    };
    let tag = el.name.local.to_lowercase();
    if is_skippable_tag(&tag) {
        return;
    }
    match tag.as_str() {
        "br" => out.push(BR_MARKER),
        "img" => (ctx.on_image)(out, node),
        _ => {
            let block = is_block_tag(&tag);
            if block {
                out.push(BR_MARKER);
            }
            for child in node.children() {
                append_inline_text(&child, out, ctx);
            }
            if block {
                out.push(BR_MARKER);
            }
        }
    }
}

pub(crate) fn is_skippable_tag(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "meta" | "link" | "script" | "style" | "noscript" | "template"
    )
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "li"
            | "ul"
            | "ol"
            | "blockquote"
            | "pre"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "section"
            | "article"
            | "figure"
            | "figcaption"
            | "table"
            | "tr"
            | "hr"
    )
}

/// Collapses collected text into storage form: one line per `<br>` or block
/// boundary, single spaces inside a line, no blank lines, trimmed.
pub(crate) fn normalize_inline_text(s: &str) -> String {
    let s = s
        .replace('\u{00A0}', " ")
        .replace('\r', "")
        .replace(
            ['\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}'],
            "",
        )
        .replace(['\u{2028}', '\u{2029}'], " ")
        .replace('\u{FEFF}', "");
    let s = s.replace('\n', " ");
    let s = s.replace(BR_MARKER, "\n");
    normalize_lines(&s)
}

fn normalize_lines(s: &str) -> String {
    s.split('\n')
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_line(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for ch in s.chars() {
        if ch == '\u{00AD}' {
            continue;
        }
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}
