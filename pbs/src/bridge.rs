// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Turning the library's global error state into per-call errors.

The PBS client library reports failure through a sentinel return value (a
nonzero status, a negative count, or a null pointer, depending on the call)
and leaves the reason in the process-global `pbs_errno`. These helpers check
the sentinel and, only if it signals failure, read `pbs_errno` before
anything else touches the library. That ordering is only meaningful if no
other call can sneak in between; the `Client` lock provides that.

*/

use libc::c_int;

use crate::error::PbsError;
use crate::ffi::Library;
use crate::ownership::borrow_static;


/// `pbs_errno` when nothing went wrong.
pub const PBSE_NONE: c_int = 0;


/// Describe an error code using the library's own text.
pub(crate) unsafe fn describe<L: Library + ?Sized>(lib: &L, code: c_int) -> String {
    borrow_static(lib.strerror(code))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("unknown PBS error {}", code))
}


/// Collect the error left behind by a failed call on `handle`.
pub(crate) unsafe fn last_error<L: Library + ?Sized>(
    lib: &L, op: &'static str, handle: c_int
) -> PbsError {
    let code = lib.errno();
    let message = describe(lib, code);
    let detail = borrow_static(lib.geterrmsg(handle)).filter(|m| !m.is_empty());
    debug!("{} on handle {} failed with error {}: {}", op, handle, code, message);
    PbsError::Call { op, code, message, detail }
}


/// For calls that return zero on success.
pub(crate) unsafe fn check_status<L: Library + ?Sized>(
    lib: &L, op: &'static str, handle: c_int, rc: c_int
) -> Result<(), PbsError> {
    if rc != 0 {
        Err(last_error(lib, op, handle))
    } else {
        Ok(())
    }
}


/// For calls that return a nonnegative count on success.
pub(crate) unsafe fn check_count<L: Library + ?Sized>(
    lib: &L, op: &'static str, handle: c_int, n: c_int
) -> Result<c_int, PbsError> {
    if n < 0 {
        Err(last_error(lib, op, handle))
    } else {
        Ok(n)
    }
}


/// For calls that return a pointer, null meaning failure.
pub(crate) unsafe fn check_pointer<L: Library + ?Sized, T>(
    lib: &L, op: &'static str, handle: c_int, p: *mut T
) -> Result<*mut T, PbsError> {
    if p.is_null() {
        Err(last_error(lib, op, handle))
    } else {
        Ok(p)
    }
}


/// For queries that return a list. The library answers an empty result with
/// a null pointer and a clear `pbs_errno`, so null alone is not a failure.
pub(crate) unsafe fn check_listing<L: Library + ?Sized, T>(
    lib: &L, op: &'static str, handle: c_int, p: *mut T
) -> Result<Option<*mut T>, PbsError> {
    if !p.is_null() {
        return Ok(Some(p));
    }

    if lib.errno() == PBSE_NONE {
        debug!("{} on handle {} matched nothing", op, handle);
        Ok(None)
    } else {
        Err(last_error(lib, op, handle))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockLibrary};
    use std::ptr;

    #[test]
    fn failure_reads_the_global_code() {
        let mock = MockLibrary::new();
        mock.set_errno(mock::UNKNOWN_JOB);

        match unsafe { check_status(&mock, "pbs_deljob", 1, -1) } {
            Err(PbsError::Call { op, code, message, .. }) => {
                assert_eq!(op, "pbs_deljob");
                assert_eq!(code, mock::UNKNOWN_JOB);
                assert_eq!(message, "Unknown Job Id");
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn success_ignores_stale_state() {
        let mock = MockLibrary::new();
        mock.set_errno(mock::PERMISSION);

        unsafe {
            assert!(check_status(&mock, "pbs_deljob", 1, 0).is_ok());
            assert_eq!(check_count(&mock, "totpool", 1, 7).unwrap(), 7);
            let mut x = 0u8;
            assert!(check_pointer(&mock, "pbs_submit", 1, &mut x as *mut u8).is_ok());
        }

        assert_eq!(mock.errno_reads(), 0);
    }

    #[test]
    fn unknown_codes_still_get_a_message() {
        let mock = MockLibrary::new();
        assert_eq!(unsafe { describe(&mock, 424242) }, "unknown PBS error 424242");
    }

    #[test]
    fn negative_count_is_failure() {
        let mock = MockLibrary::new();
        mock.set_errno(mock::PERMISSION);
        let e = unsafe { check_count(&mock, "usepool", 1, -1) }.unwrap_err();
        assert_eq!(e.code(), Some(mock::PERMISSION));
    }

    #[test]
    fn null_listing_with_clear_errno_is_empty() {
        let mock = MockLibrary::new();
        let p: *mut u8 = ptr::null_mut();
        assert_eq!(unsafe { check_listing(&mock, "pbs_statjob", 1, p) }.unwrap(), None);

        mock.set_errno(mock::UNKNOWN_JOB);
        assert!(unsafe { check_listing(&mock, "pbs_statjob", 1, p) }.is_err());
    }
}
