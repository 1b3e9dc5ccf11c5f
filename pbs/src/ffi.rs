// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! The foreign ABI boundary.

The structures here mirror the ones in `<torque/pbs_ifl.h>` field for field.
We keep our own `#[repr(C)]` copies rather than using the `torque-sys` types
directly so that the codec and the ownership tracker can be built and tested
without the C library being present. When the `torque` feature is enabled,
the layout tests in the `torque` module check that the two agree.

Everything that crosses into the C library goes through the [`Library`]
trait. Its methods are one-to-one with C entry points, take and return raw
pointers, and are all `unsafe`: the caller is responsible for passing live,
NUL-terminated strings and well-formed chains, and for releasing whatever
comes back according to the rules in the `ownership` module.

*/

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_uint, c_void, size_t};


/// One link in a chain of attributes, as used for query filters, submission
/// attributes, and the attributes of a status record.
#[repr(C)]
#[derive(Debug)]
pub struct attrl {
    pub next: *mut attrl,
    pub name: *mut c_char,
    pub resource: *mut c_char,
    pub value: *mut c_char,
    pub op: c_uint,
}

/// The C library declares a separate `struct attropl` for operator-bearing
/// attribute lists, but its layout is identical to `struct attrl` and the
/// library itself casts freely between them.
pub type attropl = attrl;

/// One record of a status query response.
#[repr(C)]
#[derive(Debug)]
pub struct batch_status {
    pub next: *mut batch_status,
    pub name: *mut c_char,
    pub attribs: *mut attrl,
    pub text: *mut c_char,
}


/// The entry points of the PBS client library.
///
/// Status returns follow the C library exactly: some calls report failure
/// with a nonzero status, some with a negative count, some with a null
/// pointer. After a failure the error code must be fetched with
/// [`Library::errno`] before any other call is made.
pub trait Library {
    // Connections and static information.

    unsafe fn connect(&self, server: *mut c_char) -> c_int;
    unsafe fn disconnect(&self, handle: c_int) -> c_int;
    unsafe fn default_server(&self) -> *mut c_char;
    unsafe fn fallback_server(&self) -> *mut c_char;
    unsafe fn server_list(&self) -> *mut c_char;

    // Error state.

    /// Read the process-global `pbs_errno`.
    unsafe fn errno(&self) -> c_int;
    unsafe fn strerror(&self, code: c_int) -> *mut c_char;
    unsafe fn geterrmsg(&self, handle: c_int) -> *mut c_char;

    // Job manipulation. All return zero on success.

    unsafe fn deljob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> c_int;
    unsafe fn holdjob(&self, handle: c_int, id: *mut c_char, hold_type: *mut c_char,
                      extend: *mut c_char) -> c_int;
    unsafe fn rlsjob(&self, handle: c_int, id: *mut c_char, hold_type: *mut c_char,
                     extend: *mut c_char) -> c_int;
    unsafe fn sigjob(&self, handle: c_int, id: *mut c_char, signal: *mut c_char,
                     extend: *mut c_char) -> c_int;
    unsafe fn msgjob(&self, handle: c_int, id: *mut c_char, file: c_int, message: *mut c_char,
                     extend: *mut c_char) -> c_int;
    unsafe fn orderjob(&self, handle: c_int, id1: *mut c_char, id2: *mut c_char,
                       extend: *mut c_char) -> c_int;
    unsafe fn movejob(&self, handle: c_int, id: *mut c_char, destination: *mut c_char,
                      extend: *mut c_char) -> c_int;
    unsafe fn runjob(&self, handle: c_int, id: *mut c_char, location: *mut c_char,
                     extend: *mut c_char) -> c_int;
    unsafe fn rerunjob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> c_int;
    unsafe fn checkpointjob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> c_int;
    unsafe fn terminate(&self, handle: c_int, manner: c_int, extend: *mut c_char) -> c_int;
    unsafe fn gpumode(&self, handle: c_int, node: *mut c_char, gpu_id: c_int,
                      gpu_mode: c_int) -> c_int;
    unsafe fn gpureset(&self, handle: c_int, node: *mut c_char, gpu_id: c_int,
                       ecc_perm: c_int, ecc_vol: c_int) -> c_int;

    /// Returns a `malloc`ed string, or null on failure.
    unsafe fn locjob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> *mut c_char;

    /// Returns the new job id as a `malloc`ed string, or null on failure.
    unsafe fn submit(&self, handle: c_int, attrib: *mut attropl, script: *mut c_char,
                     destination: *mut c_char, extend: *mut c_char) -> *mut c_char;

    // Status queries. The result must be released with `statfree`.

    unsafe fn statjob(&self, handle: c_int, id: *mut c_char, attrib: *mut attrl,
                      extend: *mut c_char) -> *mut batch_status;
    unsafe fn statnode(&self, handle: c_int, id: *mut c_char, attrib: *mut attrl,
                       extend: *mut c_char) -> *mut batch_status;
    unsafe fn statque(&self, handle: c_int, id: *mut c_char, attrib: *mut attrl,
                      extend: *mut c_char) -> *mut batch_status;
    unsafe fn statserver(&self, handle: c_int, attrib: *mut attrl,
                         extend: *mut c_char) -> *mut batch_status;
    unsafe fn statfree(&self, status: *mut batch_status);

    /// Returns a null-terminated array of job ids living in a single
    /// allocation. Only the array pointer itself may be freed.
    unsafe fn selectjob(&self, handle: c_int, attrib: *mut attropl,
                        extend: *mut c_char) -> *mut *mut c_char;

    // Resource queries.

    unsafe fn avail(&self, handle: c_int, resc: *mut c_char) -> *mut c_char;
    unsafe fn totpool(&self, handle: c_int, update: c_int) -> c_int;
    unsafe fn usepool(&self, handle: c_int, update: c_int) -> c_int;

    // The allocator shared with the C library.

    unsafe fn malloc(&self, size: size_t) -> *mut c_void;
    unsafe fn free(&self, ptr: *mut c_void);
}
