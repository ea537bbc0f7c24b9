//! OVF record types, decoding, and namespace-qualified serialization.
//!
//! The editable pieces of a descriptor are the `<System>` element (virtual
//! system settings) and the `<Item>` hardware resource elements. This module
//! decodes a captured span into the matching record and renders an edited
//! record back out with the schema's required namespace prefixes (`vssd:`
//! for system settings, `rasd:` for resource allocation settings).
//!
//! Serialization goes through an explicit field-to-qualified-name table per
//! record type. Field tags in the source documents carry namespace prefixes
//! that a naive structural serializer cannot reproduce, so the mapping is
//! spelled out rather than derived.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::scan::{self, capture_span, start_element_name, LineEnding};

/// CIM resource type code for an IDE controller.
pub const IDE_CONTROLLER_RESOURCE_TYPE: &str = "5";

/// CIM resource type code for a CD/DVD drive.
pub const CD_DRIVE_RESOURCE_TYPE: &str = "15";

/// CIM resource type code for "other storage device", which is how
/// VirtualBox tags its SATA controllers.
pub const OTHER_STORAGE_DEVICE_RESOURCE_TYPE: &str = "20";

/// Identifies a kind of editable sub-element by its unqualified tag name.
///
/// The two kinds the decoder understands are provided as constants.
/// Additional kinds can be constructed with [`ElementKind::new`]; the
/// decoder rejects them with `UnsupportedElementKind` until it learns
/// their schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementKind {
    local_name: &'static str,
}

impl ElementKind {
    /// The `<System>` virtual system settings element.
    pub const SYSTEM: ElementKind = ElementKind::new("System");

    /// The `<Item>` hardware resource element.
    pub const HARDWARE_ITEM: ElementKind = ElementKind::new("Item");

    /// Create an element kind for the given unqualified tag name.
    pub const fn new(local_name: &'static str) -> Self {
        ElementKind { local_name }
    }

    /// The unqualified tag name this kind matches on.
    pub fn local_name(&self) -> &'static str {
        self.local_name
    }
}

/// The `<System>` element of a virtual hardware section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct System {
    /// Display name of the hardware family (e.g. "Virtual Hardware Family").
    pub element_name: String,
    /// Instance identifier within the section.
    pub instance_id: String,
    /// Identifier of the virtual system (usually the machine name).
    pub virtual_system_identifier: String,
    /// Hypervisor compatibility level (e.g. "virtualbox-2.2", "vmx-10").
    pub virtual_system_type: String,
}

/// One `<Item>` hardware resource element of a virtual hardware section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareItem {
    /// Bus address of the device (e.g. controller number).
    pub address: String,
    /// Units for `virtual_quantity` (e.g. "MegaBytes").
    pub allocation_units: String,
    /// Whether the resource is allocated automatically at power-on.
    /// `None` when the source element carries no such field.
    pub automatic_allocation: Option<bool>,
    /// Human-readable caption.
    pub caption: String,
    /// Human-readable description.
    pub description: String,
    /// Machine-readable device name (e.g. "ideController0").
    pub element_name: String,
    /// Instance identifier within the section.
    pub instance_id: String,
    /// Instance ID of the parent controller, if any.
    pub parent: String,
    /// Vendor-specific resource sub-type (e.g. "AHCI").
    pub resource_sub_type: String,
    /// CIM resource type code (e.g. "5" for an IDE controller).
    pub resource_type: String,
    /// Quantity of the resource in `allocation_units`.
    pub virtual_quantity: String,
}

/// A decoded editable element, as handed to edit proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    System(System),
    HardwareItem(HardwareItem),
}

impl Record {
    /// The unqualified tag name of the element this record serializes to.
    pub fn local_name(&self) -> &'static str {
        match self {
            Record::System(_) => ElementKind::SYSTEM.local_name(),
            Record::HardwareItem(_) => ElementKind::HARDWARE_ITEM.local_name(),
        }
    }
}

/// Decode a captured element fragment into the record for `kind`.
///
/// Missing child elements become empty-string (or `None`) fields; markup
/// that does not parse, or field content that does not fit the schema,
/// fails with `Decode`. A kind with no known schema fails with
/// `UnsupportedElementKind`.
pub fn decode_record(kind: ElementKind, fragment: &str) -> Result<Record> {
    match kind.local_name() {
        "System" => decode_system(fragment).map(Record::System),
        "Item" => decode_item(fragment).map(Record::HardwareItem),
        other => Err(Error::unsupported_kind(other)),
    }
}

/// Render a record as namespace-qualified XML, indented to match the span
/// it replaces: `outer_prefix` on the element's own lines, `outer_prefix`
/// plus `relative_body_prefix` on field lines. No trailing terminator.
pub fn serialize_record(
    record: &Record,
    outer_prefix: &str,
    relative_body_prefix: &str,
    eol: &str,
) -> String {
    match record {
        Record::System(system) => system.to_qualified_xml(outer_prefix, relative_body_prefix, eol),
        Record::HardwareItem(item) => item.to_qualified_xml(outer_prefix, relative_body_prefix, eol),
    }
}

impl System {
    fn to_qualified_xml(&self, outer: &str, relative_body: &str, eol: &str) -> String {
        let fields = [
            ("vssd:ElementName", self.element_name.as_str()),
            ("vssd:InstanceID", self.instance_id.as_str()),
            (
                "vssd:VirtualSystemIdentifier",
                self.virtual_system_identifier.as_str(),
            ),
            ("vssd:VirtualSystemType", self.virtual_system_type.as_str()),
        ];

        let mut out = String::new();
        push_open(&mut out, outer, "System", eol);
        for (tag, value) in fields {
            push_field(&mut out, outer, relative_body, tag, value, eol);
        }
        push_close(&mut out, outer, "System");
        out
    }
}

impl HardwareItem {
    fn to_qualified_xml(&self, outer: &str, relative_body: &str, eol: &str) -> String {
        let automatic_allocation = self
            .automatic_allocation
            .map(|b| if b { "true" } else { "false" });

        // Optional fields render only when present, the rest always do,
        // even when empty.
        let fields = [
            ("rasd:Address", Some(self.address.as_str())),
            ("rasd:AllocationUnits", non_empty(&self.allocation_units)),
            ("rasd:AutomaticAllocation", automatic_allocation),
            ("rasd:Caption", Some(self.caption.as_str())),
            ("rasd:Description", Some(self.description.as_str())),
            ("rasd:ElementName", Some(self.element_name.as_str())),
            ("rasd:InstanceID", Some(self.instance_id.as_str())),
            ("rasd:Parent", non_empty(&self.parent)),
            ("rasd:ResourceSubType", Some(self.resource_sub_type.as_str())),
            ("rasd:ResourceType", Some(self.resource_type.as_str())),
            ("rasd:VirtualQuantity", non_empty(&self.virtual_quantity)),
        ];

        let mut out = String::new();
        push_open(&mut out, outer, "Item", eol);
        for (tag, value) in fields {
            if let Some(value) = value {
                push_field(&mut out, outer, relative_body, tag, value, eol);
            }
        }
        push_close(&mut out, outer, "Item");
        out
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn push_open(out: &mut String, outer: &str, name: &str, eol: &str) {
    out.push_str(outer);
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(eol);
}

fn push_close(out: &mut String, outer: &str, name: &str) {
    out.push_str(outer);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_field(out: &mut String, outer: &str, relative_body: &str, tag: &str, value: &str, eol: &str) {
    out.push_str(outer);
    out.push_str(relative_body);
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&escape(value));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    out.push_str(eol);
}

fn decode_system(fragment: &str) -> Result<System> {
    let mut system = System::default();

    decode_fields(fragment, "System", |name, text| {
        match name {
            "ElementName" => system.element_name = text,
            "InstanceID" => system.instance_id = text,
            "VirtualSystemIdentifier" => system.virtual_system_identifier = text,
            "VirtualSystemType" => system.virtual_system_type = text,
            _ => {}
        }
        Ok(())
    })?;

    Ok(system)
}

fn decode_item(fragment: &str) -> Result<HardwareItem> {
    let mut item = HardwareItem::default();

    decode_fields(fragment, "Item", |name, text| {
        match name {
            "Address" => item.address = text,
            "AllocationUnits" => item.allocation_units = text,
            "AutomaticAllocation" => item.automatic_allocation = Some(parse_bool(&text)?),
            "Caption" => item.caption = text,
            "Description" => item.description = text,
            "ElementName" => item.element_name = text,
            "InstanceID" => item.instance_id = text,
            "Parent" => item.parent = text,
            "ResourceSubType" => item.resource_sub_type = text,
            "ResourceType" => item.resource_type = text,
            "VirtualQuantity" => item.virtual_quantity = text,
            _ => {}
        }
        Ok(())
    })?;

    Ok(item)
}

/// Walk an isolated element fragment, invoking `on_field` with the local
/// name and unescaped text of each direct child. Unknown children are
/// consumed (subtree and all) without effect.
fn decode_fields(
    fragment: &str,
    root: &str,
    mut on_field: impl FnMut(&str, String) -> Result<()>,
) -> Result<()> {
    let mut reader = Reader::from_str(fragment);
    let mut in_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = local_name_string(e.name())?;

                if !in_root {
                    if local != root {
                        return Err(Error::decode(
                            root,
                            format!("fragment roots at <{}> instead", local),
                        ));
                    }
                    in_root = true;
                    continue;
                }

                let raw = reader
                    .read_text(e.name())
                    .map_err(|e| Error::decode(root, e.to_string()))?;
                let text = unescape(raw.as_ref())
                    .map_err(|e| Error::decode(root, e.to_string()))?
                    .into_owned();
                on_field(&local, text)?;
            }
            // A self-closing child carries no text; leave the field at its
            // default. A self-closing root decodes to an all-default record.
            Ok(Event::Empty(e)) => {
                if !in_root && local_name_string(e.name())? == root {
                    in_root = true;
                }
            }
            Ok(Event::End(e)) => {
                if local_name_string(e.name())? == root {
                    break;
                }
            }
            Ok(Event::Eof) => {
                if !in_root {
                    return Err(Error::decode(root, "fragment is empty"));
                }
                break;
            }
            Ok(_) => {}
            Err(e) => return Err(Error::decode(root, e.to_string())),
        }
    }

    Ok(())
}

fn local_name_string(name: quick_xml::name::QName<'_>) -> Result<String> {
    std::str::from_utf8(name.local_name().as_ref())
        .map(str::to_owned)
        .map_err(|e| Error::malformed(e.to_string()))
}

fn parse_bool(text: &str) -> Result<bool> {
    match text.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::decode(
            "Item",
            format!("invalid boolean value '{}'", other),
        )),
    }
}

/// The system record and hardware items extracted from a full descriptor.
#[derive(Debug, Clone, Default)]
pub struct OvfSummary {
    /// The `<System>` element, if the descriptor has one.
    pub system: Option<System>,
    /// Every `<Item>` element, in document order.
    pub items: Vec<HardwareItem>,
}

/// Extract the editable records from a whole descriptor without editing it.
///
/// # Errors
///
/// Returns `MalformedDocument` if the document does not parse, or `Decode`
/// if a located element does not fit its schema.
pub fn parse_document(raw: &str) -> Result<OvfSummary> {
    scan::validate(raw)?;

    let eol = LineEnding::detect(raw);
    let lines: Vec<&str> = raw.lines().collect();
    let mut summary = OvfSummary::default();

    let mut i = 0;
    while i < lines.len() {
        match start_element_name(lines[i]).as_deref() {
            Some("System") => {
                let (span, next) = capture_span(&lines, i, "System", eol)?;
                summary.system = Some(decode_system(span.text())?);
                i = next;
            }
            Some("Item") => {
                let (span, next) = capture_span(&lines, i, "Item", eol)?;
                summary.items.push(decode_item(span.text())?);
                i = next;
            }
            _ => i += 1,
        }
    }

    Ok(summary)
}
