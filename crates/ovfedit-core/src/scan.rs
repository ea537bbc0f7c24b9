//! Line-oriented scanning of OVF documents.
//!
//! This module provides the low-level machinery for locating elements in a
//! descriptor without disturbing its formatting: line-ending detection,
//! indentation measurement, per-line tag classification, and span capture.
//! A captured [`RawSpan`] holds the element's verbatim text together with
//! the indentation facts needed to render a replacement in the same style.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// The line terminator convention used by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// Unix-style `\n`.
    Lf,
    /// DOS-style `\r\n`.
    CrLf,
}

impl LineEnding {
    /// Detect the line ending style of a document by inspecting the byte
    /// immediately preceding its final newline. A document without any
    /// newline defaults to `Lf`.
    ///
    /// If the document mixes conventions, the detected style is applied
    /// uniformly to the output.
    pub fn detect(raw: &str) -> Self {
        match raw.rfind('\n') {
            Some(pos) if pos > 0 && raw.as_bytes()[pos - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }

    /// The terminator as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Measure the leading indentation run of a line.
///
/// The indent character is whatever character the line starts with; an
/// empty line falls back to a space with a count of zero.
pub fn line_indent(line: &str) -> (char, usize) {
    let first = match line.chars().next() {
        Some(c) => c,
        None => return (' ', 0),
    };

    let count = line.chars().take_while(|&c| c == first).count();
    (first, count)
}

/// If the trimmed line begins with an element start tag, return the tag's
/// unqualified (local) name.
pub fn start_element_name(line: &str) -> Option<String> {
    let mut reader = Reader::from_str(line.trim());
    reader.config_mut().allow_unmatched_ends = true;

    match reader.read_event() {
        Ok(Event::Start(e)) => local_name_of(e.name()),
        _ => None,
    }
}

/// If the trimmed line begins with an element end tag, return the tag's
/// unqualified (local) name.
pub fn end_element_name(line: &str) -> Option<String> {
    let mut reader = Reader::from_str(line.trim());
    reader.config_mut().allow_unmatched_ends = true;

    match reader.read_event() {
        Ok(Event::End(e)) => local_name_of(e.name()),
        _ => None,
    }
}

fn local_name_of(name: quick_xml::name::QName<'_>) -> Option<String> {
    std::str::from_utf8(name.local_name().as_ref())
        .ok()
        .map(str::to_owned)
}

/// The verbatim text of one located element plus its indentation facts.
///
/// A span always contains the literal lines of the original document,
/// joined with the document's detected terminator; it is never a
/// re-encoded copy, which is what keeps untouched elements byte-identical
/// on output.
#[derive(Debug, Clone)]
pub struct RawSpan {
    text: String,
    indent_char: char,
    outer_indent: usize,
    body_indent: usize,
}

impl RawSpan {
    /// The captured element text, opening line through closing line.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The character used for indentation on the opening line.
    pub fn indent_char(&self) -> char {
        self.indent_char
    }

    /// The prefix of the element's opening and closing lines.
    pub fn outer_prefix(&self) -> String {
        repeat_char(self.indent_char, self.outer_indent)
    }

    /// The prefix of the first line of the element's body.
    pub fn body_prefix(&self) -> String {
        repeat_char(self.indent_char, self.body_indent)
    }

    /// The body prefix relative to the opening line's prefix.
    ///
    /// For example, if the opening line is prefixed by six spaces and the
    /// body by eight, this is two spaces. A body indented no deeper than
    /// the opening line yields an empty prefix.
    pub fn relative_body_prefix(&self) -> String {
        repeat_char(
            self.indent_char,
            self.body_indent.saturating_sub(self.outer_indent),
        )
    }
}

fn repeat_char(c: char, count: usize) -> String {
    std::iter::repeat(c).take(count).collect()
}

/// Capture the span of the element opening on `lines[start]`.
///
/// Reads from the opening line through the closing tag whose local name
/// matches `local_name`, tracking nesting depth so that a nested child
/// sharing the element's local name does not terminate the capture early.
/// The body indent is measured once, on the first line after the opening
/// tag.
///
/// Returns the span together with the index of the first line after it.
///
/// # Errors
///
/// Returns `MalformedDocument` if the input ends before the closing tag is
/// found, or if the captured fragment is not well-formed on its own.
pub fn capture_span(
    lines: &[&str],
    start: usize,
    local_name: &str,
    eol: LineEnding,
) -> Result<(RawSpan, usize)> {
    let first = lines[start];
    let (indent_char, outer_indent) = line_indent(first);

    let mut text = String::from(first);
    let mut depth = name_depth_delta(first, local_name);
    let mut body_indent = 0;
    let mut next = start + 1;

    while depth > 0 {
        let line = match lines.get(next) {
            Some(line) => *line,
            None => {
                return Err(Error::malformed(format!(
                    "reached end of input while looking for </{}>",
                    local_name
                )))
            }
        };

        if next == start + 1 {
            body_indent = line_indent(line).1;
        }

        text.push_str(eol.as_str());
        text.push_str(line);
        depth += name_depth_delta(line, local_name);
        next += 1;
    }

    validate(&text)?;

    Ok((
        RawSpan {
            text,
            indent_char,
            outer_indent,
            body_indent,
        },
        next,
    ))
}

/// Net nesting depth change contributed by one line, counting only tags
/// whose local name matches `local_name`. Start tags add one, end tags
/// subtract one, self-closing tags are neutral.
fn name_depth_delta(line: &str, local_name: &str) -> i64 {
    let mut reader = Reader::from_str(line.trim());
    reader.config_mut().allow_unmatched_ends = true;

    let mut delta = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().local_name().as_ref() == local_name.as_bytes() => {
                delta += 1;
            }
            Ok(Event::End(e)) if e.name().local_name().as_ref() == local_name.as_bytes() => {
                delta -= 1;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            // A line is not required to be parseable on its own (it may be
            // the middle of multi-line text content); count what we can.
            Err(_) => break,
        }
    }

    delta
}

/// Check that `raw` is a well-formed XML document.
///
/// The events themselves are discarded; only parseability matters. Used on
/// the full document before editing, on every captured span, and by
/// callers wishing to re-validate the edited output.
pub fn validate(raw: &str) -> Result<()> {
    let mut reader = Reader::from_str(raw);

    let mut depth = 0i64;
    let mut seen_element = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                seen_element = true;
                depth += 1;
            }
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Empty(_)) => seen_element = true,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::malformed(e.to_string())),
        }
    }

    if depth != 0 {
        return Err(Error::malformed("unclosed element at end of input"));
    }
    if !seen_element {
        return Err(Error::malformed("document contains no elements"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VHS: &str = r#"<VirtualHardwareSection>
    <Info>Virtual hardware requirements for a virtual machine</Info>
    <System>
        <ElementName>Virtual Hardware Family</ElementName>
        <InstanceID>0</InstanceID>
        <VirtualSystemIdentifier>centos7</VirtualSystemIdentifier>
        <VirtualSystemType>junk</VirtualSystemType>
    </System>
</VirtualHardwareSection>
"#;

    fn capture_first(doc: &str, name: &str) -> (RawSpan, usize) {
        let lines: Vec<&str> = doc.lines().collect();
        let start = lines
            .iter()
            .position(|l| start_element_name(l).as_deref() == Some(name))
            .expect("start line not found");
        capture_span(&lines, start, name, LineEnding::Lf).expect("capture failed")
    }

    #[test]
    fn test_detect_lf() {
        assert_eq!(LineEnding::detect("<a>\n</a>\n"), LineEnding::Lf);
    }

    #[test]
    fn test_detect_crlf() {
        assert_eq!(LineEnding::detect("<a>\r\n</a>\r\n"), LineEnding::CrLf);
    }

    #[test]
    fn test_detect_no_newline_defaults_to_lf() {
        assert_eq!(LineEnding::detect("<a/>"), LineEnding::Lf);
    }

    #[test]
    fn test_line_indent_spaces() {
        assert_eq!(line_indent("    <System>"), (' ', 4));
    }

    #[test]
    fn test_line_indent_tabs() {
        assert_eq!(line_indent("\t\t<System>"), ('\t', 2));
    }

    #[test]
    fn test_line_indent_empty() {
        assert_eq!(line_indent(""), (' ', 0));
    }

    #[test]
    fn test_line_indent_unindented() {
        assert_eq!(line_indent("<System>"), ('<', 1));
    }

    #[test]
    fn test_start_element_name() {
        assert_eq!(start_element_name("  <Item>").as_deref(), Some("Item"));
        assert_eq!(
            start_element_name("  <rasd:Caption>x</rasd:Caption>").as_deref(),
            Some("Caption")
        );
        assert_eq!(start_element_name("  </Item>"), None);
        assert_eq!(start_element_name("plain text"), None);
        assert_eq!(start_element_name(""), None);
        assert_eq!(start_element_name("<?xml version=\"1.0\"?>"), None);
    }

    #[test]
    fn test_end_element_name() {
        assert_eq!(end_element_name("  </Item>").as_deref(), Some("Item"));
        assert_eq!(
            end_element_name("</vssd:ElementName>").as_deref(),
            Some("ElementName")
        );
        assert_eq!(end_element_name("  <Item>"), None);
        assert_eq!(end_element_name("junk"), None);
    }

    #[test]
    fn test_capture_span_system() {
        let (span, next) = capture_first(VHS, "System");

        let expected = "    <System>
        <ElementName>Virtual Hardware Family</ElementName>
        <InstanceID>0</InstanceID>
        <VirtualSystemIdentifier>centos7</VirtualSystemIdentifier>
        <VirtualSystemType>junk</VirtualSystemType>
    </System>";

        assert_eq!(span.text(), expected);
        assert_eq!(span.outer_prefix(), "    ");
        assert_eq!(span.body_prefix(), "        ");
        assert_eq!(span.relative_body_prefix(), "    ");
        assert_eq!(next, 8);
    }

    #[test]
    fn test_capture_span_nested_same_name() {
        let doc = r#"<VirtualHardwareSection>
    <Info>Virtual hardware requirements for a virtual machine</Info>
    <System>
        <ElementName>Virtual Hardware Family</ElementName>
        <System>
            <ElementName>nested</ElementName>
        </System>
        <VirtualSystemType>junk</VirtualSystemType>
    </System>
</VirtualHardwareSection>
"#;
        let (span, _) = capture_first(doc, "System");

        let expected = "    <System>
        <ElementName>Virtual Hardware Family</ElementName>
        <System>
            <ElementName>nested</ElementName>
        </System>
        <VirtualSystemType>junk</VirtualSystemType>
    </System>";

        assert_eq!(span.text(), expected);
        assert_eq!(span.outer_prefix(), "    ");
        assert_eq!(span.relative_body_prefix(), "    ");
    }

    #[test]
    fn test_capture_span_single_line_element() {
        let doc = "<a>\n  <Item>whole thing</Item>\n</a>\n";
        let (span, next) = capture_first(doc, "Item");
        assert_eq!(span.text(), "  <Item>whole thing</Item>");
        assert_eq!(next, 2);
    }

    #[test]
    fn test_capture_span_self_closing() {
        let lines = ["<a>", "  <Item/>", "</a>"];
        let (span, next) = capture_span(&lines, 1, "Item", LineEnding::Lf).unwrap();
        assert_eq!(span.text(), "  <Item/>");
        assert_eq!(next, 2);
    }

    #[test]
    fn test_capture_span_missing_close_tag() {
        let doc = "<a>\n  <Item>\n    <Caption>x</Caption>\n";
        let lines: Vec<&str> = doc.lines().collect();
        let err = capture_span(&lines, 1, "Item", LineEnding::Lf).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
    }

    #[test]
    fn test_capture_span_crlf_join() {
        let doc = "<a>\r\n  <Item>\r\n    <Caption>x</Caption>\r\n  </Item>\r\n</a>\r\n";
        let lines: Vec<&str> = doc.lines().collect();
        let (span, _) = capture_span(&lines, 1, "Item", LineEnding::CrLf).unwrap();
        assert_eq!(
            span.text(),
            "  <Item>\r\n    <Caption>x</Caption>\r\n  </Item>"
        );
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(validate(VHS).is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_tags() {
        assert!(validate("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_validate_rejects_truncated_document() {
        assert!(validate("<a><b>").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_document() {
        assert!(validate("").is_err());
        assert!(validate("   \n").is_err());
    }
}
