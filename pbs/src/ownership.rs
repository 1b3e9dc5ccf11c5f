// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Who frees what.

Every value that crosses the foreign boundary falls into one of three
classes:

- *Statically owned* by the library (the default server name, error
  strings). We copy these out and never free them; see [`borrow_static`].
- *Host allocated*: strings and attribute chains that we build in the
  foreign heap to pass as arguments. We free every node and every field,
  once, after the call returns.
- *Library allocated*: results handed back to us. A batch status chain is
  released with one `pbs_statfree`; anything else (a job id, the job id
  array from `pbs_selectjob`) is a single block released with one `free`,
  however many strings live inside it.

A [`CallScope`] is the arena for one operation. Everything allocated or
adopted through it is released when it is dropped, on every exit path.

*/

use libc::{c_char, c_void};
use std::ffi::CStr;
use std::mem;
use std::ptr;

use crate::error::{PbsError, Result};
use crate::ffi::{attrl, batch_status, Library};


/// A foreign value awaiting release, tagged with how to release it.
#[derive(Debug)]
enum Pending {
    /// A string we copied into the foreign heap.
    HostString(*mut c_char),

    /// An attribute chain we built: every node and each of its strings.
    HostChain(*mut attrl),

    /// A status chain from one of the `pbs_stat*` calls.
    StatusChain(*mut batch_status),

    /// A single library allocation.
    Block(*mut c_void),
}


/// The release list for one call into the library.
pub(crate) struct CallScope<'a, L: Library + ?Sized> {
    lib: &'a L,
    pending: Vec<Pending>,
}

impl<'a, L: Library + ?Sized> CallScope<'a, L> {
    pub fn new(lib: &'a L) -> Self {
        CallScope {
            lib,
            pending: Vec::new(),
        }
    }

    pub fn lib(&self) -> &'a L {
        self.lib
    }

    /// Copy `s` into the foreign heap for the duration of the call.
    pub fn c_string(&mut self, what: &'static str, s: &str) -> Result<*mut c_char> {
        let p = self.raw_string(what, s)?;
        self.pending.push(Pending::HostString(p));
        Ok(p)
    }

    /// Like `c_string`, but `None` becomes a null pointer.
    pub fn c_string_opt(&mut self, what: &'static str, s: Option<&str>) -> Result<*mut c_char> {
        match s {
            Some(s) => self.c_string(what, s),
            None => Ok(ptr::null_mut()),
        }
    }

    /// Copy `s` into the foreign heap without registering it. The caller
    /// must hang it somewhere that is registered, such as a chain node.
    pub fn raw_string(&mut self, what: &'static str, s: &str) -> Result<*mut c_char> {
        if s.as_bytes().contains(&0) {
            return Err(PbsError::InteriorNul { what });
        }

        let size = s.len() + 1;
        let p = unsafe { self.lib.malloc(size) } as *mut c_char;

        if p.is_null() {
            return Err(PbsError::OutOfMemory { size });
        }

        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr() as *const c_char, p, s.len());
            *p.add(s.len()) = 0;
        }

        Ok(p)
    }

    /// Allocate a zeroed chain node without registering it.
    pub fn raw_node(&mut self) -> Result<*mut attrl> {
        let size = mem::size_of::<attrl>();
        let p = unsafe { self.lib.malloc(size) } as *mut attrl;

        if p.is_null() {
            return Err(PbsError::OutOfMemory { size });
        }

        unsafe {
            ptr::write(p, attrl {
                next: ptr::null_mut(),
                name: ptr::null_mut(),
                resource: ptr::null_mut(),
                value: ptr::null_mut(),
                op: 0,
            });
        }

        Ok(p)
    }

    /// Take responsibility for a chain whose head we allocated. Nodes linked
    /// onto it later, and strings hung on those nodes, are covered too.
    pub fn adopt_chain(&mut self, head: *mut attrl) {
        if !head.is_null() {
            self.pending.push(Pending::HostChain(head));
        }
    }

    pub fn adopt_status(&mut self, status: *mut batch_status) {
        if !status.is_null() {
            self.pending.push(Pending::StatusChain(status));
        }
    }

    pub fn adopt_block<T>(&mut self, block: *mut T) {
        if !block.is_null() {
            self.pending.push(Pending::Block(block as *mut c_void));
        }
    }

    unsafe fn release(&self, item: Pending) {
        match item {
            Pending::HostString(p) => self.lib.free(p as *mut c_void),

            Pending::HostChain(head) => {
                let mut node = head;

                while !node.is_null() {
                    let next = (*node).next;

                    for field in &[(*node).name, (*node).resource, (*node).value] {
                        if !field.is_null() {
                            self.lib.free(*field as *mut c_void);
                        }
                    }

                    self.lib.free(node as *mut c_void);
                    node = next;
                }
            },

            Pending::StatusChain(p) => self.lib.statfree(p),

            Pending::Block(p) => self.lib.free(p),
        }
    }
}

impl<'a, L: Library + ?Sized> Drop for CallScope<'a, L> {
    fn drop(&mut self) {
        let n = self.pending.len();

        while let Some(item) = self.pending.pop() {
            unsafe { self.release(item) };
        }

        if n > 0 {
            trace!("released {} foreign values", n);
        }
    }
}


/// Copy out a string that the library owns and that we must never free.
///
/// Returns `None` for a null pointer.
pub(crate) unsafe fn borrow_static(p: *const c_char) -> Option<String> {
    if p.is_null() {
        None
    } else {
        Some(CStr::from_ptr(p).to_string_lossy().into_owned())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Attribute, Operator};
    use crate::codec;
    use crate::mock::MockLibrary;

    #[test]
    fn strings_are_released_at_scope_exit() {
        let mock = MockLibrary::new();

        {
            let mut scope = CallScope::new(&mock);
            scope.c_string("job id", "12.server").unwrap();
            scope.c_string("extend", "").unwrap();
            assert_eq!(mock.live(), 2);
        }

        assert_eq!(mock.allocated(), 2);
        assert_eq!(mock.released(), 2);
        assert!(mock.bad_frees().is_empty());
    }

    #[test]
    fn interior_nul_allocates_nothing() {
        let mock = MockLibrary::new();

        {
            let mut scope = CallScope::new(&mock);
            match scope.c_string("job id", "12\0server") {
                Err(PbsError::InteriorNul { what: "job id" }) => {},
                other => panic!("unexpected result {:?}", other),
            }
        }

        assert_eq!(mock.allocated(), 0);
    }

    #[test]
    fn chain_release_frees_each_node_and_field() {
        let mock = MockLibrary::new();
        let attrs = vec![
            Attribute::new("Job_Name", "a").with_resource("x"),
            Attribute::filter("job_state", Operator::Eq, "R"),
        ];

        {
            let mut scope = CallScope::new(&mock);
            codec::encode(&mut scope, &attrs).unwrap();
        }

        // two nodes, two names, two values, one resource
        assert_eq!(mock.allocated(), 7);
        assert_eq!(mock.released(), 7);
        assert_eq!(mock.live(), 0);
        assert!(mock.bad_frees().is_empty());
    }

    #[test]
    fn partial_chain_is_released_when_encoding_fails() {
        let mock = MockLibrary::new();
        let attrs = vec![
            Attribute::new("Job_Name", "fine"),
            Attribute::new("Output_Path", "bad\0path"),
        ];

        {
            let mut scope = CallScope::new(&mock);
            assert!(codec::encode(&mut scope, &attrs).is_err());
        }

        assert!(mock.allocated() > 0);
        assert_eq!(mock.allocated(), mock.released());
        assert!(mock.bad_frees().is_empty());
    }

    #[test]
    fn static_strings_are_copied_not_freed() {
        let mock = MockLibrary::new();
        let s = unsafe { borrow_static(mock.default_server()) };
        assert_eq!(s.as_ref().map(|s| s.as_str()), Some(MockLibrary::DEFAULT_SERVER));
        assert_eq!(unsafe { borrow_static(ptr::null()) }, None);
        assert_eq!(mock.released(), 0);
    }
}
