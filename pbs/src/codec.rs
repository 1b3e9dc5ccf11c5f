// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Converting attribute lists to and from the library's linked chains.

Encoding builds a fresh chain in the foreign heap through a [`CallScope`],
which takes care of freeing it. Decoding only reads: it never frees or
modifies the chain it walks.

*/

use libc::c_char;
use std::ffi::CStr;
use std::ptr;

use crate::attr::{Attribute, AttributeList, Operator, StatusRecord};
use crate::error::{PbsError, Result};
use crate::ffi::{attrl, batch_status, Library};
use crate::ownership::CallScope;


/// Build a foreign attribute chain holding copies of `attrs`, in order.
///
/// An empty slice encodes to a null pointer, which the library reads as "no
/// filter", not to a chain of zero clauses.
pub(crate) fn encode<L: Library + ?Sized>(
    scope: &mut CallScope<L>, attrs: &[Attribute]
) -> Result<*mut attrl> {
    let mut head: *mut attrl = ptr::null_mut();
    let mut tail: *mut attrl = ptr::null_mut();

    for attr in attrs {
        let node = scope.raw_node()?;

        // Link the node in before filling it, so that whatever we manage to
        // allocate is reachable from the registered head if a later string
        // turns out to be bad.
        if tail.is_null() {
            head = node;
            scope.adopt_chain(head);
        } else {
            unsafe { (*tail).next = node };
        }

        tail = node;

        unsafe {
            (*node).op = attr.op.to_raw();
            (*node).name = scope.raw_string("attribute name", &attr.name)?;

            if let Some(ref resource) = attr.resource {
                (*node).resource = scope.raw_string("attribute resource", resource)?;
            }

            (*node).value = scope.raw_string("attribute value", &attr.value)?;
        }
    }

    Ok(head)
}


unsafe fn required_string(op: &'static str, what: &str, p: *const c_char) -> Result<String> {
    if p.is_null() {
        Err(PbsError::decode(op, format!("{} is null", what)))
    } else {
        Ok(CStr::from_ptr(p).to_string_lossy().into_owned())
    }
}

unsafe fn optional_string(p: *const c_char) -> Option<String> {
    if p.is_null() {
        None
    } else {
        Some(CStr::from_ptr(p).to_string_lossy().into_owned())
    }
}


/// Read an attribute chain through to its null terminator.
pub(crate) unsafe fn decode_attributes(
    op: &'static str, mut node: *const attrl
) -> Result<AttributeList> {
    let mut attrs = Vec::new();

    while !node.is_null() {
        let raw_op = (*node).op;

        attrs.push(Attribute {
            name: required_string(op, "attribute name", (*node).name)?,
            resource: optional_string((*node).resource),
            value: optional_string((*node).value).unwrap_or_default(),
            op: Operator::from_raw(raw_op).ok_or_else(|| {
                PbsError::decode(op, format!("unknown attribute operator {}", raw_op))
            })?,
        });

        node = (*node).next;
    }

    Ok(attrs.into())
}


/// Read a batch status chain into owned records, preserving order.
pub(crate) unsafe fn decode_status(
    op: &'static str, mut record: *const batch_status
) -> Result<Vec<StatusRecord>> {
    let mut records = Vec::new();

    while !record.is_null() {
        records.push(StatusRecord {
            name: required_string(op, "record name", (*record).name)?,
            text: optional_string((*record).text).unwrap_or_default(),
            attributes: decode_attributes(op, (*record).attribs)?,
        });

        record = (*record).next;
    }

    Ok(records)
}


/// Read a null-terminated array of strings.
pub(crate) unsafe fn decode_string_array(
    op: &'static str, array: *const *mut c_char
) -> Result<Vec<String>> {
    let mut strings = Vec::new();

    if array.is_null() {
        return Ok(strings);
    }

    let mut cursor = array;

    while !(*cursor).is_null() {
        strings.push(required_string(op, "array element", *cursor)?);
        cursor = cursor.add(1);
    }

    Ok(strings)
}
