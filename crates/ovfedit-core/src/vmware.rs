//! VMware conversion policy and the file-level boundary.
//!
//! A VirtualBox-produced descriptor needs four edits before VMware's
//! import tool accepts it: drop the IDE controllers, rename the SATA
//! controller to the VMware kind, pin the compatibility level, and stop
//! CD/DVD drives from auto-allocating. [`basic_convert_scheme`] bundles
//! those edits; the individual proposal constructors are exposed for
//! callers composing their own schemes.

use std::fs;
use std::path::Path;

use crate::edit::{edit_document, EditAction, EditScheme};
use crate::error::{Error, Result};
use crate::ovf::{
    ElementKind, HardwareItem, Record, CD_DRIVE_RESOURCE_TYPE, OTHER_STORAGE_DEVICE_RESOURCE_TYPE,
};

/// The compatibility level written by [`basic_convert_scheme`].
pub const VMWARE_SYSTEM_TYPE: &str = "vmx-10";

/// Proposal: set the system's `virtual_system_type` to a fixed value.
pub fn set_virtual_system_type(
    new_type: impl Into<String>,
) -> impl FnMut(&Record) -> EditAction + 'static {
    let new_type = new_type.into();

    move |record| {
        let Record::System(system) = record else {
            return EditAction::Keep;
        };

        let mut updated = system.clone();
        updated.virtual_system_type = new_type.clone();
        EditAction::Replace(Record::System(updated))
    }
}

/// Proposal: delete hardware items whose element name starts with
/// `prefix`, at most `limit` of them. A negative limit deletes without
/// bound; a zero limit never deletes.
pub fn delete_items_matching(
    prefix: impl Into<String>,
    limit: i32,
) -> impl FnMut(&Record) -> EditAction + 'static {
    let prefix = prefix.into();
    let mut remaining = limit;

    move |record| {
        let Record::HardwareItem(item) = record else {
            return EditAction::Keep;
        };

        if remaining == 0 || !item.element_name.starts_with(&prefix) {
            return EditAction::Keep;
        }

        if remaining > 0 {
            remaining -= 1;
        }
        EditAction::Delete
    }
}

/// Proposal: replace the hardware item whose element name equals
/// `element_name` with a fixed replacement.
pub fn replace_item(
    element_name: impl Into<String>,
    replacement: HardwareItem,
) -> impl FnMut(&Record) -> EditAction + 'static {
    let element_name = element_name.into();

    move |record| {
        let Record::HardwareItem(item) = record else {
            return EditAction::Keep;
        };

        if item.element_name == element_name {
            EditAction::Replace(Record::HardwareItem(replacement.clone()))
        } else {
            EditAction::Keep
        }
    }
}

/// Proposal: rewrite hardware items of one CIM resource type through a
/// caller-supplied transform.
pub fn modify_items_of_resource_type(
    resource_type: impl Into<String>,
    mut modify: impl FnMut(HardwareItem) -> HardwareItem + 'static,
) -> impl FnMut(&Record) -> EditAction + 'static {
    let resource_type = resource_type.into();

    move |record| {
        let Record::HardwareItem(item) = record else {
            return EditAction::Keep;
        };

        if item.resource_type == resource_type {
            EditAction::Replace(Record::HardwareItem(modify(item.clone())))
        } else {
            EditAction::Keep
        }
    }
}

/// Proposal: convert a VirtualBox SATA controller (resource type 20) to
/// the VMware AHCI kind, keeping the controller number from the original
/// element name.
pub fn convert_sata_controllers() -> impl FnMut(&Record) -> EditAction + 'static {
    modify_items_of_resource_type(OTHER_STORAGE_DEVICE_RESOURCE_TYPE, |mut item| {
        let digits: String = item
            .element_name
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        item.caption = "SATA Controller".to_string();
        item.description = "SATAController".to_string();
        item.element_name = format!("SATAController{}", digits);
        item.resource_sub_type = "vmware.sata.ahci".to_string();
        item
    })
}

/// Proposal: disable automatic allocation on CD/DVD drives (resource
/// type 15).
pub fn disable_cdrom_automatic_allocation() -> impl FnMut(&Record) -> EditAction + 'static {
    modify_items_of_resource_type(CD_DRIVE_RESOURCE_TYPE, |mut item| {
        item.automatic_allocation = Some(false);
        item
    })
}

/// The full VMware conversion recipe.
pub fn basic_convert_scheme() -> EditScheme {
    EditScheme::new()
        .propose(
            ElementKind::SYSTEM,
            set_virtual_system_type(VMWARE_SYSTEM_TYPE),
        )
        .propose(
            ElementKind::HARDWARE_ITEM,
            delete_items_matching("ideController", -1),
        )
        .propose(ElementKind::HARDWARE_ITEM, convert_sata_controllers())
        .propose(
            ElementKind::HARDWARE_ITEM,
            disable_cdrom_automatic_allocation(),
        )
}

/// Convert a descriptor file to the VMware-friendly variant.
///
/// Reads `input`, applies [`basic_convert_scheme`], and writes the result
/// to `output` with the source file's permission bits. Refuses to operate
/// in place.
pub fn convert_file(input: &Path, output: &Path) -> Result<()> {
    let mut scheme = basic_convert_scheme();
    edit_file(input, output, &mut scheme)
}

/// Run a caller-supplied scheme against a descriptor file.
///
/// Same file boundary as [`convert_file`]: the output path must differ
/// from the input path and receives the input's permission bits.
pub fn edit_file(input: &Path, output: &Path, scheme: &mut EditScheme) -> Result<()> {
    if input == output {
        return Err(Error::convert(
            "output file path cannot be the same as the input file path",
        ));
    }

    let raw = fs::read_to_string(input).map_err(|e| Error::io(e, input))?;
    let edited = edit_document(&raw, scheme)?;
    fs::write(output, edited).map_err(|e| Error::io(e, output))?;

    let permissions = fs::metadata(input)
        .map_err(|e| Error::io(e, input))?
        .permissions();
    fs::set_permissions(output, permissions).map_err(|e| Error::io(e, output))?;

    Ok(())
}
