pub(crate) fn image_src(attrs: &kuchiki::Attributes) -> Option<String> {
    ["src", "data-src", "data-original"]
        .into_iter()
        .filter_map(|name| attrs.get(name))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn image_alt(attrs: &kuchiki::Attributes) -> String {
    attrs
        .get("alt")
        .map(str::to_string)
        .unwrap_or_default()
}
