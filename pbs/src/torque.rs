// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! The real thing: `libtorque`, via `torque-sys`.

*/

use libc::{c_char, c_int, c_void, size_t};
use std::sync::atomic::{AtomicBool, Ordering};
use torque_sys as sys;

use crate::error::{PbsError, Result};
use crate::ffi::{attrl, attropl, batch_status, Library};


static CLAIMED: AtomicBool = AtomicBool::new(false);


// Exported by libtorque but missing from some releases of `pbs_ifl.h`, so
// bindgen cannot be relied on to find it.
extern "C" {
    fn pbs_gpureset(c: c_int, mom_node: *mut c_char, gpuid: c_int, ecc_perm: c_int,
                    ecc_vol: c_int) -> c_int;
}


/// The TORQUE client library linked into this process.
///
/// Because the library's state is global, at most one `TorqueLibrary` can
/// exist at a time. Hand it to a `Client` and share that.
#[derive(Debug)]
pub struct TorqueLibrary {
    _private: (),
}

impl TorqueLibrary {
    /// Take exclusive use of the library.
    pub fn claim() -> Result<Self> {
        if CLAIMED.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(PbsError::AlreadyClaimed);
        }

        Ok(TorqueLibrary { _private: () })
    }
}

impl Drop for TorqueLibrary {
    fn drop(&mut self) {
        CLAIMED.store(false, Ordering::SeqCst);
    }
}


impl Library for TorqueLibrary {
    unsafe fn connect(&self, server: *mut c_char) -> c_int {
        sys::pbs_connect(server as _)
    }

    unsafe fn disconnect(&self, handle: c_int) -> c_int {
        sys::pbs_disconnect(handle)
    }

    unsafe fn default_server(&self) -> *mut c_char {
        sys::pbs_default() as *mut c_char
    }

    unsafe fn fallback_server(&self) -> *mut c_char {
        sys::pbs_fbserver() as *mut c_char
    }

    unsafe fn server_list(&self) -> *mut c_char {
        sys::pbs_get_server_list() as *mut c_char
    }

    unsafe fn errno(&self) -> c_int {
        sys::pbs_errno
    }

    unsafe fn strerror(&self, code: c_int) -> *mut c_char {
        sys::pbs_strerror(code) as *mut c_char
    }

    unsafe fn geterrmsg(&self, handle: c_int) -> *mut c_char {
        sys::pbs_geterrmsg(handle) as *mut c_char
    }

    unsafe fn deljob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> c_int {
        sys::pbs_deljob(handle, id as _, extend as _)
    }

    unsafe fn holdjob(&self, handle: c_int, id: *mut c_char, hold_type: *mut c_char,
                      extend: *mut c_char) -> c_int {
        sys::pbs_holdjob(handle, id as _, hold_type as _, extend as _)
    }

    unsafe fn rlsjob(&self, handle: c_int, id: *mut c_char, hold_type: *mut c_char,
                     extend: *mut c_char) -> c_int {
        sys::pbs_rlsjob(handle, id as _, hold_type as _, extend as _)
    }

    unsafe fn sigjob(&self, handle: c_int, id: *mut c_char, signal: *mut c_char,
                     extend: *mut c_char) -> c_int {
        sys::pbs_sigjob(handle, id as _, signal as _, extend as _)
    }

    unsafe fn msgjob(&self, handle: c_int, id: *mut c_char, file: c_int, message: *mut c_char,
                     extend: *mut c_char) -> c_int {
        sys::pbs_msgjob(handle, id as _, file, message as _, extend as _)
    }

    unsafe fn orderjob(&self, handle: c_int, id1: *mut c_char, id2: *mut c_char,
                       extend: *mut c_char) -> c_int {
        sys::pbs_orderjob(handle, id1 as _, id2 as _, extend as _)
    }

    unsafe fn movejob(&self, handle: c_int, id: *mut c_char, destination: *mut c_char,
                      extend: *mut c_char) -> c_int {
        sys::pbs_movejob(handle, id as _, destination as _, extend as _)
    }

    unsafe fn runjob(&self, handle: c_int, id: *mut c_char, location: *mut c_char,
                     extend: *mut c_char) -> c_int {
        sys::pbs_runjob(handle, id as _, location as _, extend as _)
    }

    unsafe fn rerunjob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> c_int {
        sys::pbs_rerunjob(handle, id as _, extend as _)
    }

    unsafe fn checkpointjob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> c_int {
        sys::pbs_checkpointjob(handle, id as _, extend as _)
    }

    unsafe fn terminate(&self, handle: c_int, manner: c_int, extend: *mut c_char) -> c_int {
        sys::pbs_terminate(handle, manner, extend as _)
    }

    unsafe fn gpumode(&self, handle: c_int, node: *mut c_char, gpu_id: c_int,
                      gpu_mode: c_int) -> c_int {
        sys::pbs_gpumode(handle, node as _, gpu_id, gpu_mode)
    }

    unsafe fn gpureset(&self, handle: c_int, node: *mut c_char, gpu_id: c_int,
                       ecc_perm: c_int, ecc_vol: c_int) -> c_int {
        pbs_gpureset(handle, node, gpu_id, ecc_perm, ecc_vol)
    }

    unsafe fn locjob(&self, handle: c_int, id: *mut c_char, extend: *mut c_char) -> *mut c_char {
        sys::pbs_locjob(handle, id as _, extend as _) as *mut c_char
    }

    unsafe fn submit(&self, handle: c_int, attrib: *mut attropl, script: *mut c_char,
                     destination: *mut c_char, extend: *mut c_char) -> *mut c_char {
        sys::pbs_submit(handle, attrib as *mut sys::attropl, script as _, destination as _,
                        extend as _) as *mut c_char
    }

    unsafe fn statjob(&self, handle: c_int, id: *mut c_char, attrib: *mut attrl,
                      extend: *mut c_char) -> *mut batch_status {
        sys::pbs_statjob(handle, id as _, attrib as *mut sys::attrl, extend as _)
            as *mut batch_status
    }

    unsafe fn statnode(&self, handle: c_int, id: *mut c_char, attrib: *mut attrl,
                       extend: *mut c_char) -> *mut batch_status {
        sys::pbs_statnode(handle, id as _, attrib as *mut sys::attrl, extend as _)
            as *mut batch_status
    }

    unsafe fn statque(&self, handle: c_int, id: *mut c_char, attrib: *mut attrl,
                      extend: *mut c_char) -> *mut batch_status {
        sys::pbs_statque(handle, id as _, attrib as *mut sys::attrl, extend as _)
            as *mut batch_status
    }

    unsafe fn statserver(&self, handle: c_int, attrib: *mut attrl,
                         extend: *mut c_char) -> *mut batch_status {
        sys::pbs_statserver(handle, attrib as *mut sys::attrl, extend as _)
            as *mut batch_status
    }

    unsafe fn statfree(&self, status: *mut batch_status) {
        sys::pbs_statfree(status as *mut sys::batch_status)
    }

    unsafe fn selectjob(&self, handle: c_int, attrib: *mut attropl,
                        extend: *mut c_char) -> *mut *mut c_char {
        sys::pbs_selectjob(handle, attrib as *mut sys::attropl, extend as _) as *mut *mut c_char
    }

    unsafe fn avail(&self, handle: c_int, resc: *mut c_char) -> *mut c_char {
        sys::avail(handle, resc as _) as *mut c_char
    }

    unsafe fn totpool(&self, handle: c_int, update: c_int) -> c_int {
        sys::totpool(handle, update)
    }

    unsafe fn usepool(&self, handle: c_int, update: c_int) -> c_int {
        sys::usepool(handle, update)
    }

    unsafe fn malloc(&self, size: size_t) -> *mut c_void {
        libc::malloc(size)
    }

    unsafe fn free(&self, ptr: *mut c_void) {
        libc::free(ptr)
    }
}
