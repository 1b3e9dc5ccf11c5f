// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! A stand-in for the PBS client library, for tests.

[`MockLibrary`] implements [`Library`] with a scripted "server" and an
allocator that keeps books: every allocation and release is counted, and a
free of anything that is not a live allocation of the right kind is recorded
rather than performed. It also imitates the library's global error state and
the single-block layout of `pbs_selectjob` results.

Clones share state, so a test can keep one clone while a `Client` owns
another.

*/

use libc::{c_char, c_int, c_uint, c_void, size_t};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::mem;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::attr::{Attribute, Operator, StatusRecord};
use crate::ffi::{attrl, attropl, batch_status, Library};


/// The code the mock reports for an unknown job.
pub const UNKNOWN_JOB: c_int = 15001;

/// The code the mock reports for a refused request.
pub const PERMISSION: c_int = 15007;


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    Host,
    StatusChain,
    Block,
}


#[derive(Default)]
struct Books {
    live: HashMap<usize, Kind>,
    allocated: usize,
    released: usize,
    block_frees: usize,
    bad_frees: Vec<usize>,
}


#[derive(Default)]
struct Daemon {
    errno: c_int,
    errno_reads: usize,
    fail_next: Option<(c_int, Option<String>)>,
    messages: HashMap<c_int, CString>,
    next_handle: c_int,
    sessions: HashMap<c_int, String>,
    next_job: u32,
    records: Vec<StatusRecord>,
    corrupt_operators: bool,
    selection: Vec<String>,
    filter: Option<Vec<Attribute>>,
    calls: Vec<String>,
    args: HashMap<String, Vec<String>>,
}


struct Inner {
    books: Books,
    daemon: Daemon,
    default_server: CString,
    answer: CString,
    error_texts: Vec<(c_int, CString)>,
}


/// A scripted, allocation-counting implementation of the PBS client library.
#[derive(Clone)]
pub struct MockLibrary(Arc<Mutex<Inner>>);

impl Default for MockLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLibrary {
    pub const DEFAULT_SERVER: &'static str = "mock-server";
    pub const TOTAL_NODES: u32 = 8;
    pub const USED_NODES: u32 = 3;

    pub fn new() -> Self {
        let text = |s: &str| CString::new(s).unwrap_or_default();

        MockLibrary(Arc::new(Mutex::new(Inner {
            books: Books::default(),
            daemon: Daemon {
                next_handle: 1,
                next_job: 1,
                ..Daemon::default()
            },
            default_server: text(Self::DEFAULT_SERVER),
            answer: text("yes"),
            error_texts: vec![
                (UNKNOWN_JOB, text("Unknown Job Id")),
                (PERMISSION, text("Unauthorized Request")),
            ],
        })))
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Scripting.

    /// Make the next library call fail with `code`.
    pub fn fail_next(&self, code: c_int) {
        self.inner().daemon.fail_next = Some((code, None));
    }

    /// Make the next library call fail with `code`, leaving `message` as the
    /// session's error message.
    pub fn fail_next_with_message(&self, code: c_int, message: &str) {
        self.inner().daemon.fail_next = Some((code, Some(message.to_owned())));
    }

    /// Set the global error code without failing anything.
    pub fn set_errno(&self, code: c_int) {
        self.inner().daemon.errno = code;
    }

    /// The records that every status query will report.
    pub fn set_records(&self, records: Vec<StatusRecord>) {
        self.inner().daemon.records = records;
    }

    /// Report attribute operators that the binding cannot know about.
    pub fn corrupt_operators(&self, corrupt: bool) {
        self.inner().daemon.corrupt_operators = corrupt;
    }

    /// The job ids that `pbs_selectjob` will report.
    pub fn set_selection(&self, ids: &[&str]) {
        self.inner().daemon.selection = ids.iter().map(|s| (*s).to_owned()).collect();
    }

    // Inspection.

    pub fn allocated(&self) -> usize {
        self.inner().books.allocated
    }

    pub fn released(&self) -> usize {
        self.inner().books.released
    }

    /// How many allocations have not been released.
    pub fn live(&self) -> usize {
        self.inner().books.live.len()
    }

    /// How many single-block library results have been freed.
    pub fn block_frees(&self) -> usize {
        self.inner().books.block_frees
    }

    /// Addresses passed to `free` or `pbs_statfree` that were not live
    /// allocations of the matching kind.
    pub fn bad_frees(&self) -> Vec<usize> {
        self.inner().books.bad_frees.clone()
    }

    pub fn errno_reads(&self) -> usize {
        self.inner().daemon.errno_reads
    }

    /// The names of the library functions called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner().daemon.calls.clone()
    }

    /// The string arguments of the most recent call to `op`, after the
    /// handle and not counting `extend`.
    pub fn last_args(&self, op: &str) -> Vec<String> {
        self.inner().daemon.args.get(op).cloned().unwrap_or_default()
    }

    /// The server a session was opened to.
    pub fn server_of(&self, handle: c_int) -> Option<String> {
        self.inner().daemon.sessions.get(&handle).cloned()
    }

    pub fn open_sessions(&self) -> usize {
        self.inner().daemon.sessions.len()
    }

    /// The most recent attribute list passed to the library, as read
    /// directly from the chain.
    pub fn received_filter(&self) -> Vec<Attribute> {
        self.inner().daemon.filter.clone().unwrap_or_default()
    }

    /// Whether the most recent attribute list passed was a null pointer.
    pub fn received_null_filter(&self) -> bool {
        self.inner().daemon.filter.is_none()
    }

    /// Build a status chain the way the library would, as one library
    /// allocation to be released with `statfree`.
    pub fn build_status(&self, records: &[StatusRecord]) -> *mut batch_status {
        let mut inner = self.inner();
        let corrupt = inner.daemon.corrupt_operators;
        let head = unsafe { build_chain(records, corrupt) };

        if !head.is_null() {
            inner.books.allocated += 1;
            inner.books.live.insert(head as usize, Kind::StatusChain);
        }

        head
    }

    // Internals.

    /// Note a call. If a failure was scripted, set up the error state and
    /// return false.
    fn begin(&self, op: &str, handle: c_int, args: &[*mut c_char]) -> bool {
        let mut inner = self.inner();
        let d = &mut inner.daemon;
        d.calls.push(op.to_owned());
        d.args.insert(op.to_owned(), args.iter().map(|p| unsafe { lossy(*p) }).collect());

        match d.fail_next.take() {
            None => true,

            Some((code, message)) => {
                d.errno = code;

                match message.and_then(|m| CString::new(m).ok()) {
                    Some(m) => { d.messages.insert(handle, m); },
                    None => { d.messages.remove(&handle); },
                }

                false
            },
        }
    }

    fn status(&self, op: &str, handle: c_int, args: &[*mut c_char]) -> c_int {
        if self.begin(op, handle, args) { 0 } else { -1 }
    }

    fn record_filter(&self, mut node: *const attrl) {
        let filter = if node.is_null() {
            None
        } else {
            let mut attrs = Vec::new();

            while !node.is_null() {
                unsafe {
                    let resource = (*node).resource;

                    attrs.push(Attribute {
                        name: lossy((*node).name),
                        resource: if resource.is_null() { None } else { Some(lossy(resource)) },
                        value: lossy((*node).value),
                        op: Operator::from_raw((*node).op).unwrap_or_default(),
                    });

                    node = (*node).next;
                }
            }

            Some(attrs)
        };

        self.inner().daemon.filter = filter;
    }

    fn stat(&self, op: &str, handle: c_int, attrib: *mut attrl) -> *mut batch_status {
        self.record_filter(attrib);

        if !self.begin(op, handle, &[]) {
            return ptr::null_mut();
        }

        let records = self.inner().daemon.records.clone();

        if records.is_empty() {
            self.inner().daemon.errno = 0;
            return ptr::null_mut();
        }

        self.build_status(&records)
    }

    /// Hand out a copy of `s` as a single library allocation.
    fn block_string(&self, s: &str) -> *mut c_char {
        let p = unsafe { strdup(s) };
        let mut inner = self.inner();
        inner.books.allocated += 1;
        inner.books.live.insert(p as usize, Kind::Block);
        p
    }
}


unsafe fn lossy(p: *const c_char) -> String {
    if p.is_null() {
        String::new()
    } else {
        CStr::from_ptr(p).to_string_lossy().into_owned()
    }
}


unsafe fn strdup(s: &str) -> *mut c_char {
    let p = libc::malloc(s.len() + 1) as *mut c_char;
    assert!(!p.is_null());
    ptr::copy_nonoverlapping(s.as_ptr() as *const c_char, p, s.len());
    *p.add(s.len()) = 0;
    p
}


unsafe fn calloc<T>() -> *mut T {
    let p = libc::calloc(1, mem::size_of::<T>()) as *mut T;
    assert!(!p.is_null());
    p
}


unsafe fn build_chain(records: &[StatusRecord], corrupt: bool) -> *mut batch_status {
    let mut head: *mut batch_status = ptr::null_mut();
    let mut tail: *mut batch_status = ptr::null_mut();

    for rec in records {
        let node = calloc::<batch_status>();
        (*node).name = strdup(&rec.name);
        (*node).text = strdup(&rec.text);

        let mut attr_tail: *mut attrl = ptr::null_mut();

        for attr in &rec.attributes {
            let a = calloc::<attrl>();
            (*a).name = strdup(&attr.name);
            (*a).value = strdup(&attr.value);
            (*a).op = if corrupt { 99 } else { attr.op.to_raw() as c_uint };

            if let Some(ref r) = attr.resource {
                (*a).resource = strdup(r);
            }

            if attr_tail.is_null() {
                (*node).attribs = a;
            } else {
                (*attr_tail).next = a;
            }

            attr_tail = a;
        }

        if tail.is_null() {
            head = node;
        } else {
            (*tail).next = node;
        }

        tail = node;
    }

    head
}


unsafe fn free_chain(mut rec: *mut batch_status) {
    while !rec.is_null() {
        let mut a = (*rec).attribs;

        while !a.is_null() {
            let next = (*a).next;
            libc::free((*a).name as *mut c_void);
            libc::free((*a).resource as *mut c_void);
            libc::free((*a).value as *mut c_void);
            libc::free(a as *mut c_void);
            a = next;
        }

        let next = (*rec).next;
        libc::free((*rec).name as *mut c_void);
        libc::free((*rec).text as *mut c_void);
        libc::free(rec as *mut c_void);
        rec = next;
    }
}


impl Library for MockLibrary {
    unsafe fn connect(&self, server: *mut c_char) -> c_int {
        if !self.begin("pbs_connect", -1, &[server]) {
            return -1;
        }

        let mut inner = self.inner();
        let target = if server.is_null() || *server == 0 {
            MockLibrary::DEFAULT_SERVER.to_owned()
        } else {
            lossy(server)
        };

        let handle = inner.daemon.next_handle;
        inner.daemon.next_handle += 1;
        inner.daemon.sessions.insert(handle, target);
        handle
    }

    unsafe fn disconnect(&self, handle: c_int) -> c_int {
        if !self.begin("pbs_disconnect", handle, &[]) {
            return -1;
        }

        let mut inner = self.inner();

        if inner.daemon.sessions.remove(&handle).is_none() {
            inner.daemon.errno = PERMISSION;
            return -1;
        }

        inner.daemon.messages.remove(&handle);
        0
    }

    unsafe fn default_server(&self) -> *mut c_char {
        self.inner().default_server.as_ptr() as *mut c_char
    }

    unsafe fn fallback_server(&self) -> *mut c_char {
        ptr::null_mut()
    }

    unsafe fn server_list(&self) -> *mut c_char {
        self.inner().default_server.as_ptr() as *mut c_char
    }

    unsafe fn errno(&self) -> c_int {
        let mut inner = self.inner();
        inner.daemon.errno_reads += 1;
        inner.daemon.errno
    }

    unsafe fn strerror(&self, code: c_int) -> *mut c_char {
        self.inner().error_texts.iter()
            .find(|e| e.0 == code)
            .map(|e| e.1.as_ptr() as *mut c_char)
            .unwrap_or(ptr::null_mut())
    }

    unsafe fn geterrmsg(&self, handle: c_int) -> *mut c_char {
        self.inner().daemon.messages.get(&handle)
            .map(|m| m.as_ptr() as *mut c_char)
            .unwrap_or(ptr::null_mut())
    }

    unsafe fn deljob(&self, handle: c_int, id: *mut c_char, _extend: *mut c_char) -> c_int {
        self.status("pbs_deljob", handle, &[id])
    }

    unsafe fn holdjob(&self, handle: c_int, id: *mut c_char, hold_type: *mut c_char,
                      _extend: *mut c_char) -> c_int {
        self.status("pbs_holdjob", handle, &[id, hold_type])
    }

    unsafe fn rlsjob(&self, handle: c_int, id: *mut c_char, hold_type: *mut c_char,
                     _extend: *mut c_char) -> c_int {
        self.status("pbs_rlsjob", handle, &[id, hold_type])
    }

    unsafe fn sigjob(&self, handle: c_int, id: *mut c_char, signal: *mut c_char,
                     _extend: *mut c_char) -> c_int {
        self.status("pbs_sigjob", handle, &[id, signal])
    }

    unsafe fn msgjob(&self, handle: c_int, id: *mut c_char, file: c_int, message: *mut c_char,
                     _extend: *mut c_char) -> c_int {
        let file = CString::new(file.to_string()).unwrap_or_default();
        self.status("pbs_msgjob", handle, &[id, file.as_ptr() as *mut c_char, message])
    }

    unsafe fn orderjob(&self, handle: c_int, id1: *mut c_char, id2: *mut c_char,
                       _extend: *mut c_char) -> c_int {
        self.status("pbs_orderjob", handle, &[id1, id2])
    }

    unsafe fn movejob(&self, handle: c_int, id: *mut c_char, destination: *mut c_char,
                      _extend: *mut c_char) -> c_int {
        self.status("pbs_movejob", handle, &[id, destination])
    }

    unsafe fn runjob(&self, handle: c_int, id: *mut c_char, location: *mut c_char,
                     _extend: *mut c_char) -> c_int {
        self.status("pbs_runjob", handle, &[id, location])
    }

    unsafe fn rerunjob(&self, handle: c_int, id: *mut c_char, _extend: *mut c_char) -> c_int {
        self.status("pbs_rerunjob", handle, &[id])
    }

    unsafe fn checkpointjob(&self, handle: c_int, id: *mut c_char, _extend: *mut c_char) -> c_int {
        self.status("pbs_checkpointjob", handle, &[id])
    }

    unsafe fn terminate(&self, handle: c_int, manner: c_int, _extend: *mut c_char) -> c_int {
        let manner = CString::new(manner.to_string()).unwrap_or_default();
        self.status("pbs_terminate", handle, &[manner.as_ptr() as *mut c_char])
    }

    unsafe fn gpumode(&self, handle: c_int, node: *mut c_char, _gpu_id: c_int,
                      _gpu_mode: c_int) -> c_int {
        self.status("pbs_gpumode", handle, &[node])
    }

    unsafe fn gpureset(&self, handle: c_int, node: *mut c_char, _gpu_id: c_int,
                       ecc_perm: c_int, ecc_vol: c_int) -> c_int {
        let perm = CString::new(ecc_perm.to_string()).unwrap_or_default();
        let vol = CString::new(ecc_vol.to_string()).unwrap_or_default();
        self.status("pbs_gpureset", handle, &[node, perm.as_ptr() as *mut c_char,
                                               vol.as_ptr() as *mut c_char])
    }

    unsafe fn locjob(&self, handle: c_int, id: *mut c_char, _extend: *mut c_char) -> *mut c_char {
        if !self.begin("pbs_locjob", handle, &[id]) {
            return ptr::null_mut();
        }

        self.block_string(MockLibrary::DEFAULT_SERVER)
    }

    unsafe fn submit(&self, handle: c_int, attrib: *mut attropl, script: *mut c_char,
                     destination: *mut c_char, _extend: *mut c_char) -> *mut c_char {
        self.record_filter(attrib);

        if !self.begin("pbs_submit", handle, &[script, destination]) {
            return ptr::null_mut();
        }

        let id = {
            let mut inner = self.inner();
            let n = inner.daemon.next_job;
            inner.daemon.next_job += 1;
            format!("{}.mock", n)
        };

        self.block_string(&id)
    }

    unsafe fn statjob(&self, handle: c_int, _id: *mut c_char, attrib: *mut attrl,
                      _extend: *mut c_char) -> *mut batch_status {
        self.stat("pbs_statjob", handle, attrib)
    }

    unsafe fn statnode(&self, handle: c_int, _id: *mut c_char, attrib: *mut attrl,
                       _extend: *mut c_char) -> *mut batch_status {
        self.stat("pbs_statnode", handle, attrib)
    }

    unsafe fn statque(&self, handle: c_int, _id: *mut c_char, attrib: *mut attrl,
                      _extend: *mut c_char) -> *mut batch_status {
        self.stat("pbs_statque", handle, attrib)
    }

    unsafe fn statserver(&self, handle: c_int, attrib: *mut attrl,
                         _extend: *mut c_char) -> *mut batch_status {
        self.stat("pbs_statserver", handle, attrib)
    }

    unsafe fn statfree(&self, status: *mut batch_status) {
        if status.is_null() {
            return;
        }

        let mut inner = self.inner();

        match inner.books.live.get(&(status as usize)).cloned() {
            Some(Kind::StatusChain) => {
                inner.books.live.remove(&(status as usize));
                inner.books.released += 1;
                free_chain(status);
            },

            _ => inner.books.bad_frees.push(status as usize),
        }
    }

    unsafe fn selectjob(&self, handle: c_int, attrib: *mut attropl,
                        _extend: *mut c_char) -> *mut *mut c_char {
        self.record_filter(attrib);

        if !self.begin("pbs_selectjob", handle, &[]) {
            return ptr::null_mut();
        }

        let ids = self.inner().daemon.selection.clone();

        if ids.is_empty() {
            self.inner().daemon.errno = 0;
            return ptr::null_mut();
        }

        // One allocation: the pointer array, then the strings it points at.
        let array_size = (ids.len() + 1) * mem::size_of::<*mut c_char>();
        let text_size: usize = ids.iter().map(|s| s.len() + 1).sum();
        let block = libc::malloc(array_size + text_size) as *mut *mut c_char;
        assert!(!block.is_null());

        let mut text = (block as *mut c_char).add(array_size);

        for (i, id) in ids.iter().enumerate() {
            ptr::copy_nonoverlapping(id.as_ptr() as *const c_char, text, id.len());
            *text.add(id.len()) = 0;
            *block.add(i) = text;
            text = text.add(id.len() + 1);
        }

        *block.add(ids.len()) = ptr::null_mut();

        let mut inner = self.inner();
        inner.books.allocated += 1;
        inner.books.live.insert(block as usize, Kind::Block);
        block
    }

    unsafe fn avail(&self, handle: c_int, resc: *mut c_char) -> *mut c_char {
        if !self.begin("avail", handle, &[resc]) {
            return ptr::null_mut();
        }

        self.inner().answer.as_ptr() as *mut c_char
    }

    unsafe fn totpool(&self, handle: c_int, _update: c_int) -> c_int {
        if !self.begin("totpool", handle, &[]) {
            return -1;
        }

        MockLibrary::TOTAL_NODES as c_int
    }

    unsafe fn usepool(&self, handle: c_int, _update: c_int) -> c_int {
        if !self.begin("usepool", handle, &[]) {
            return -1;
        }

        MockLibrary::USED_NODES as c_int
    }

    unsafe fn malloc(&self, size: size_t) -> *mut c_void {
        let p = libc::malloc(size);

        if !p.is_null() {
            let mut inner = self.inner();
            inner.books.allocated += 1;
            inner.books.live.insert(p as usize, Kind::Host);
        }

        p
    }

    unsafe fn free(&self, ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }

        let mut inner = self.inner();

        match inner.books.live.remove(&(ptr as usize)) {
            Some(Kind::Host) => {
                inner.books.released += 1;
                libc::free(ptr);
            },

            Some(Kind::Block) => {
                inner.books.released += 1;
                inner.books.block_frees += 1;
                libc::free(ptr);
            },

            Some(Kind::StatusChain) => {
                // Wrong release path: put it back and complain.
                inner.books.live.insert(ptr as usize, Kind::StatusChain);
                inner.books.bad_frees.push(ptr as usize);
            },

            None => inner.books.bad_frees.push(ptr as usize),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeing_inside_a_select_block_is_caught() {
        let mock = MockLibrary::new();
        mock.set_selection(&["1.mock", "2.mock"]);

        unsafe {
            let block = mock.selectjob(1, ptr::null_mut(), ptr::null_mut());
            mock.free(*block.add(1) as *mut c_void);
            assert_eq!(mock.bad_frees().len(), 1);

            mock.free(block as *mut c_void);
            assert_eq!(mock.block_frees(), 1);
        }

        assert_eq!(mock.live(), 0);
    }

    #[test]
    fn double_free_is_caught() {
        let mock = MockLibrary::new();

        unsafe {
            let p = mock.malloc(4);
            mock.free(p);
            mock.free(p);
        }

        assert_eq!(mock.released(), 1);
        assert_eq!(mock.bad_frees().len(), 1);
    }
}
