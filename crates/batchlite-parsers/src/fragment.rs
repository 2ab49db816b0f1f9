//! Marker-based extraction from semi-structured tool output.
//!
//! Some tools print XML fragments that are not well-formed documents. These
//! helpers take the text between the first start marker and the next end
//! marker, nothing more.

/// Text between the first `start` marker and the following `end` marker.
pub fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

/// Contents of the first `<tag>...</tag>` element.
pub fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    extract_between(text, &format!("<{tag}>"), &format!("</{tag}>"))
}
