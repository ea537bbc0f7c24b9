//! The format-preserving edit pass.
//!
//! An [`EditScheme`] collects edit proposals keyed by element kind; one
//! call to [`edit_document`] scans the descriptor line by line, captures
//! each element of a registered kind, decodes it, and lets the proposals
//! decide whether it is kept, deleted, or replaced. Every line outside a
//! matched element is copied through byte for byte, so the output differs
//! from the input only where a change was requested.

use crate::error::Result;
use crate::ovf::{decode_record, serialize_record, ElementKind, Record};
use crate::scan::{self, capture_span, start_element_name, LineEnding};

/// What should happen to one decoded element.
#[derive(Debug, Clone)]
pub enum EditAction {
    /// Emit the original span unchanged.
    Keep,
    /// Omit the span, including its line terminator.
    Delete,
    /// Replace the span with a fresh rendering of this record.
    Replace(Record),
}

/// A caller-supplied decision function for one element kind.
///
/// Proposals may carry state across invocations (a bounded delete keeps a
/// countdown), hence `FnMut`.
pub type EditProposal = Box<dyn FnMut(&Record) -> EditAction>;

/// An ordered association of element kinds to their edit proposals.
///
/// Proposals run in registration order and the scheme preserves the
/// insertion order of kinds. Build the scheme up front; during an edit
/// pass it is only consulted.
#[derive(Default)]
pub struct EditScheme {
    entries: Vec<(ElementKind, Vec<EditProposal>)>,
}

impl EditScheme {
    /// Create an empty scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proposal for `kind`, preserving registration order.
    pub fn propose(
        mut self,
        kind: ElementKind,
        proposal: impl FnMut(&Record) -> EditAction + 'static,
    ) -> Self {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, proposals)) => proposals.push(Box::new(proposal)),
            None => self.entries.push((kind, vec![Box::new(proposal)])),
        }
        self
    }

    /// True if no proposals are registered at all.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, proposals)| proposals.is_empty())
    }

    /// The registered kind matching an unqualified tag name, along with
    /// its proposals. Kinds without proposals are not matches.
    fn entry_mut(&mut self, local_name: &str) -> Option<(ElementKind, &mut Vec<EditProposal>)> {
        self.entries
            .iter_mut()
            .filter(|(_, proposals)| !proposals.is_empty())
            .find(|(kind, _)| kind.local_name() == local_name)
            .map(|(kind, proposals)| (*kind, proposals))
    }
}

/// Evaluate proposals in registration order; the first non-`Keep` result
/// decides, and later proposals are not invoked.
fn evaluate(record: &Record, proposals: &mut [EditProposal]) -> EditAction {
    for proposal in proposals {
        match proposal(record) {
            EditAction::Keep => continue,
            decided => return decided,
        }
    }

    EditAction::Keep
}

/// Run one edit pass over a descriptor.
///
/// The input is validated up front, its line terminator style is detected
/// and applied to every output line, and each element of a registered kind
/// flows through span capture, decoding, and proposal evaluation. The
/// cursor resumes after each consumed span, so one edited element never
/// overlaps another.
///
/// # Errors
///
/// `MalformedDocument` if the input does not parse or a span capture runs
/// off the end of the document; `Decode` if a captured element does not
/// fit its record schema; `UnsupportedElementKind` if the scheme registers
/// a kind the decoder has no schema for. Any error aborts the pass and the
/// partial buffer is discarded.
pub fn edit_document(raw: &str, scheme: &mut EditScheme) -> Result<String> {
    scan::validate(raw)?;

    let eol = LineEnding::detect(raw);
    let lines: Vec<&str> = raw.lines().collect();
    let mut out = String::with_capacity(raw.len());

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        let matched = start_element_name(line).and_then(|name| scheme.entry_mut(&name));
        let (kind, proposals) = match matched {
            Some(entry) => entry,
            None => {
                out.push_str(line);
                out.push_str(eol.as_str());
                i += 1;
                continue;
            }
        };

        let (span, next) = capture_span(&lines, i, kind.local_name(), eol)?;
        let record = decode_record(kind, span.text())?;

        match evaluate(&record, proposals) {
            EditAction::Keep => {
                out.push_str(span.text());
                out.push_str(eol.as_str());
            }
            EditAction::Delete => {}
            EditAction::Replace(new_record) => {
                let rendered = serialize_record(
                    &new_record,
                    &span.outer_prefix(),
                    &span.relative_body_prefix(),
                    eol.as_str(),
                );
                out.push_str(&rendered);
                out.push_str(eol.as_str());
            }
        }

        i = next;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ovf::HardwareItem;
    use std::cell::Cell;
    use std::rc::Rc;

    const DOC: &str = r#"<Envelope>
  <VirtualHardwareSection>
    <Item>
      <rasd:ElementName>ideController0</rasd:ElementName>
      <rasd:InstanceID>3</rasd:InstanceID>
      <rasd:ResourceType>5</rasd:ResourceType>
    </Item>
  </VirtualHardwareSection>
</Envelope>
"#;

    #[test]
    fn test_empty_scheme_passes_through() {
        let mut scheme = EditScheme::new();
        assert!(scheme.is_empty());
        let out = edit_document(DOC, &mut scheme).unwrap();
        assert_eq!(out, DOC);
    }

    #[test]
    fn test_keep_only_scheme_is_byte_identical() {
        let mut scheme =
            EditScheme::new().propose(ElementKind::HARDWARE_ITEM, |_| EditAction::Keep);
        let out = edit_document(DOC, &mut scheme).unwrap();
        assert_eq!(out, DOC);
    }

    #[test]
    fn test_short_circuit_skips_later_proposals() {
        let invoked = Rc::new(Cell::new(false));
        let witness = invoked.clone();

        let mut scheme = EditScheme::new()
            .propose(ElementKind::HARDWARE_ITEM, |_| EditAction::Keep)
            .propose(ElementKind::HARDWARE_ITEM, |_| EditAction::Delete)
            .propose(ElementKind::HARDWARE_ITEM, move |_| {
                witness.set(true);
                EditAction::Keep
            });

        let out = edit_document(DOC, &mut scheme).unwrap();
        assert!(!out.contains("ideController0"));
        assert!(!invoked.get(), "proposals after the deciding one must not run");
    }

    #[test]
    fn test_delete_removes_span_and_terminator() {
        let mut scheme =
            EditScheme::new().propose(ElementKind::HARDWARE_ITEM, |_| EditAction::Delete);
        let out = edit_document(DOC, &mut scheme).unwrap();
        let expected = "<Envelope>\n  <VirtualHardwareSection>\n  </VirtualHardwareSection>\n</Envelope>\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_replace_uses_span_indentation() {
        let mut scheme = EditScheme::new().propose(ElementKind::HARDWARE_ITEM, |record| {
            let Record::HardwareItem(item) = record else {
                return EditAction::Keep;
            };
            let mut replacement = item.clone();
            replacement.element_name = "renamed".to_string();
            EditAction::Replace(Record::HardwareItem(replacement))
        });

        let out = edit_document(DOC, &mut scheme).unwrap();
        assert!(out.contains("    <Item>\n"));
        assert!(out.contains("      <rasd:ElementName>renamed</rasd:ElementName>\n"));
        assert!(out.contains("    </Item>\n"));
    }

    #[test]
    fn test_unsupported_kind_aborts_pass() {
        let doc = "<Envelope>\n  <DiskSection>\n  </DiskSection>\n</Envelope>\n";
        let mut scheme =
            EditScheme::new().propose(ElementKind::new("DiskSection"), |_| EditAction::Keep);
        let err = edit_document(doc, &mut scheme).unwrap_err();
        assert!(matches!(err, Error::UnsupportedElementKind { .. }));
    }

    #[test]
    fn test_malformed_input_rejected_before_editing() {
        let mut scheme =
            EditScheme::new().propose(ElementKind::HARDWARE_ITEM, |_| EditAction::Keep);
        let err = edit_document("<Envelope><broken>", &mut scheme).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
    }

    #[test]
    fn test_stateful_proposal_counts_down() {
        let doc = r#"<Envelope>
  <Item>
    <rasd:ElementName>a</rasd:ElementName>
  </Item>
  <Item>
    <rasd:ElementName>b</rasd:ElementName>
  </Item>
</Envelope>
"#;
        let mut remaining = 1;
        let mut scheme = EditScheme::new().propose(ElementKind::HARDWARE_ITEM, move |_| {
            if remaining == 0 {
                return EditAction::Keep;
            }
            remaining -= 1;
            EditAction::Delete
        });

        let out = edit_document(doc, &mut scheme).unwrap();
        assert!(!out.contains("<rasd:ElementName>a</rasd:ElementName>"));
        assert!(out.contains("<rasd:ElementName>b</rasd:ElementName>"));
    }

    #[test]
    fn test_replace_with_fresh_record() {
        let mut scheme = EditScheme::new().propose(ElementKind::HARDWARE_ITEM, |_| {
            EditAction::Replace(Record::HardwareItem(HardwareItem {
                element_name: "fixed".to_string(),
                ..HardwareItem::default()
            }))
        });

        let out = edit_document(DOC, &mut scheme).unwrap();
        assert!(out.contains("<rasd:ElementName>fixed</rasd:ElementName>"));
    }
}
