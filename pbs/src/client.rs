// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Sessions and the operations that can be carried out on them.

Every operation follows the same sequence while holding the client lock:
encode the arguments into the foreign heap, make the call, bridge a failure
into a `PbsError`, decode whatever came back, and release everything that was
allocated along the way.

*/

use libc::{c_char, c_int};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::attr::{Attribute, HoldType, Manner, MessageStream, StatusRecord};
use crate::bridge;
use crate::codec;
use crate::error::{PbsError, Result};
use crate::ffi::{attrl, batch_status, Library};
use crate::ownership::{borrow_static, CallScope};


/// Identifies one connection to a PBS server.
///
/// A handle is only meaningful to the `Client` that opened it, and only
/// until it is disconnected.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SessionHandle(c_int);

impl SessionHandle {
    /// The library's own connection number.
    pub fn raw(self) -> c_int {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


struct State<L> {
    lib: L,
    open: HashSet<c_int>,
}


/// The gateway to the PBS client library.
///
/// The library keeps its error state, and in some versions its encoding
/// buffers, in process-global variables. A `Client` therefore serializes
/// every call it makes behind a single lock, across all of its sessions.
/// Only one `Client` should talk to a given library instance; for the real
/// library this is enforced by `TorqueLibrary::claim`.
///
/// No call is retried. Whether it is safe to repeat, say, a submission after
/// a failure depends on what the daemon did, which only the caller can
/// judge.
pub struct Client<L: Library> {
    state: Mutex<State<L>>,
}

impl<L: Library> Client<L> {
    pub fn new(lib: L) -> Self {
        Client {
            state: Mutex::new(State {
                lib,
                open: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<L>>> {
        self.state.lock().map_err(|_| PbsError::Poisoned)
    }

    /// Run `f` against the library on behalf of an open session. The scope
    /// handed to `f` is released before the lock is.
    fn call<T, F>(&self, handle: SessionHandle, op: &'static str, f: F) -> Result<T>
        where F: FnOnce(&mut CallScope<L>, c_int) -> Result<T>
    {
        let state = self.lock()?;

        if !state.open.contains(&handle.0) {
            return Err(PbsError::NotConnected { handle: handle.0 });
        }

        debug!("{} on handle {}", op, handle);
        let mut scope = CallScope::new(&state.lib);
        let result = f(&mut scope, handle.0);
        drop(scope);
        result
    }

    /// Connect to `server`, or to the library's default server if `server`
    /// is empty.
    pub fn connect(&self, server: &str) -> Result<SessionHandle> {
        let mut state = self.lock()?;

        let handle = {
            let mut scope = CallScope::new(&state.lib);
            let target = if server.is_empty() { None } else { Some(server) };
            let target = scope.c_string_opt("server", target)?;
            let lib = scope.lib();
            let handle = unsafe { lib.connect(target) };

            if handle < 0 {
                let code = unsafe { lib.errno() };

                return Err(PbsError::Connect {
                    server: server.to_owned(),
                    code,
                    message: unsafe { bridge::describe(lib, code) },
                });
            }

            handle
        };

        debug!("connected to \"{}\" as handle {}", server, handle);
        state.open.insert(handle);
        Ok(SessionHandle(handle))
    }

    /// Close a session. The handle may not be used afterwards, whether or
    /// not the disconnection succeeded.
    pub fn disconnect(&self, handle: SessionHandle) -> Result<()> {
        let mut state = self.lock()?;

        if !state.open.remove(&handle.0) {
            return Err(PbsError::NotConnected { handle: handle.0 });
        }

        debug!("disconnecting handle {}", handle);
        let lib = &state.lib;
        ustry!(lib, "pbs_disconnect", handle.0, lib.disconnect(handle.0));
        Ok(())
    }

    pub fn is_connected(&self, handle: SessionHandle) -> bool {
        match self.lock() {
            Ok(state) => state.open.contains(&handle.0),
            Err(_) => false,
        }
    }

    /// Give `f` direct access to the library, under the client lock.
    pub fn with_library<R, F: FnOnce(&L) -> R>(&self, f: F) -> Result<R> {
        let state = self.lock()?;
        Ok(f(&state.lib))
    }

    fn static_string<F>(&self, f: F) -> Result<Option<String>>
        where F: FnOnce(&L) -> *mut c_char
    {
        let state = self.lock()?;
        Ok(unsafe { borrow_static(f(&state.lib)) })
    }

    /// The name of the server that an empty `connect` would reach.
    pub fn default_server(&self) -> Result<Option<String>> {
        self.static_string(|lib| unsafe { lib.default_server() })
    }

    /// The name of the fallback server, if one is configured.
    pub fn fallback_server(&self) -> Result<Option<String>> {
        self.static_string(|lib| unsafe { lib.fallback_server() })
    }

    /// The list of servers the library would try, as configured.
    pub fn server_list(&self) -> Result<Option<String>> {
        self.static_string(|lib| unsafe { lib.server_list() })
    }

    /// The library's description of a numeric error code.
    pub fn strerror(&self, code: c_int) -> Result<Option<String>> {
        self.static_string(|lib| unsafe { lib.strerror(code) })
    }

    /// The last message the server sent on this session, if any.
    pub fn error_message(&self, handle: SessionHandle) -> Result<Option<String>> {
        self.call(handle, "pbs_geterrmsg", |scope, h| {
            Ok(unsafe { borrow_static(scope.lib().geterrmsg(h)) }.filter(|m| !m.is_empty()))
        })
    }

    /// The shape shared by the calls that act on a job and return a status.
    fn job_call<F>(&self, handle: SessionHandle, op: &'static str, id: &str,
                   extend: Option<&str>, f: F) -> Result<()>
        where F: FnOnce(&mut CallScope<L>, c_int, *mut c_char, *mut c_char) -> Result<c_int>
    {
        self.call(handle, op, |scope, h| {
            let id = scope.c_string("job id", id)?;
            let extend = scope.c_string_opt("extend", extend)?;
            let rc = f(scope, h, id, extend)?;
            unsafe { bridge::check_status(scope.lib(), op, h, rc) }
        })
    }

    /// Delete a job.
    pub fn delete_job(&self, handle: SessionHandle, id: &str, extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_deljob", id, extend, |scope, h, id, extend| {
            Ok(unsafe { scope.lib().deljob(h, id, extend) })
        })
    }

    /// Place a hold on a job.
    pub fn hold_job(&self, handle: SessionHandle, id: &str, hold: HoldType,
                    extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_holdjob", id, extend, |scope, h, id, extend| {
            let hold = scope.c_string("hold type", hold.token())?;
            Ok(unsafe { scope.lib().holdjob(h, id, hold, extend) })
        })
    }

    /// Release a hold on a job.
    pub fn release_hold(&self, handle: SessionHandle, id: &str, hold: HoldType,
                        extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_rlsjob", id, extend, |scope, h, id, extend| {
            let hold = scope.c_string("hold type", hold.token())?;
            Ok(unsafe { scope.lib().rlsjob(h, id, hold, extend) })
        })
    }

    /// Send a signal, named like `SIGTERM`, to a running job.
    pub fn signal_job(&self, handle: SessionHandle, id: &str, signal: &str,
                      extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_sigjob", id, extend, |scope, h, id, extend| {
            let signal = scope.c_string("signal", signal)?;
            Ok(unsafe { scope.lib().sigjob(h, id, signal, extend) })
        })
    }

    /// Append a message to one of a job's output files.
    pub fn message_job(&self, handle: SessionHandle, id: &str, stream: MessageStream,
                       message: &str, extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_msgjob", id, extend, |scope, h, id, extend| {
            let message = scope.c_string("message", message)?;
            Ok(unsafe { scope.lib().msgjob(h, id, stream.to_raw(), message, extend) })
        })
    }

    /// Swap the queue positions of two jobs.
    pub fn order_jobs(&self, handle: SessionHandle, first: &str, second: &str,
                      extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_orderjob", first, extend, |scope, h, first, extend| {
            let second = scope.c_string("job id", second)?;
            Ok(unsafe { scope.lib().orderjob(h, first, second, extend) })
        })
    }

    /// Move a job to another queue or server.
    pub fn move_job(&self, handle: SessionHandle, id: &str, destination: &str,
                    extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_movejob", id, extend, |scope, h, id, extend| {
            let destination = scope.c_string("destination", destination)?;
            Ok(unsafe { scope.lib().movejob(h, id, destination, extend) })
        })
    }

    /// Start a job now, optionally on particular hosts.
    pub fn run_job(&self, handle: SessionHandle, id: &str, location: Option<&str>,
                   extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_runjob", id, extend, |scope, h, id, extend| {
            let location = scope.c_string_opt("location", location)?;
            Ok(unsafe { scope.lib().runjob(h, id, location, extend) })
        })
    }

    /// Requeue a running job.
    pub fn rerun_job(&self, handle: SessionHandle, id: &str, extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_rerunjob", id, extend, |scope, h, id, extend| {
            Ok(unsafe { scope.lib().rerunjob(h, id, extend) })
        })
    }

    /// Checkpoint a running job.
    pub fn checkpoint_job(&self, handle: SessionHandle, id: &str,
                          extend: Option<&str>) -> Result<()> {
        self.job_call(handle, "pbs_checkpointjob", id, extend, |scope, h, id, extend| {
            Ok(unsafe { scope.lib().checkpointjob(h, id, extend) })
        })
    }

    /// Shut down the server.
    pub fn terminate(&self, handle: SessionHandle, manner: Manner,
                     extend: Option<&str>) -> Result<()> {
        self.call(handle, "pbs_terminate", |scope, h| {
            let extend = scope.c_string_opt("extend", extend)?;
            let lib = scope.lib();
            ustry!(lib, "pbs_terminate", h, lib.terminate(h, manner.to_raw(), extend));
            Ok(())
        })
    }

    /// Set the compute mode of a GPU on a node.
    pub fn gpu_mode(&self, handle: SessionHandle, node: &str, gpu_id: i32,
                    mode: i32) -> Result<()> {
        self.call(handle, "pbs_gpumode", |scope, h| {
            let node = scope.c_string("node", node)?;
            let lib = scope.lib();
            ustry!(lib, "pbs_gpumode", h, lib.gpumode(h, node, gpu_id, mode));
            Ok(())
        })
    }

    /// Reset the ECC error counters of a GPU on a node. Nonzero
    /// `ecc_perm` clears the permanent counters and nonzero `ecc_vol` the
    /// volatile ones.
    pub fn gpu_reset(&self, handle: SessionHandle, node: &str, gpu_id: i32,
                     ecc_perm: i32, ecc_vol: i32) -> Result<()> {
        self.call(handle, "pbs_gpureset", |scope, h| {
            let node = scope.c_string("node", node)?;
            let lib = scope.lib();
            ustry!(lib, "pbs_gpureset", h, lib.gpureset(h, node, gpu_id, ecc_perm, ecc_vol));
            Ok(())
        })
    }

    /// Find out which server a job lives on.
    pub fn locate_job(&self, handle: SessionHandle, id: &str,
                      extend: Option<&str>) -> Result<String> {
        self.call(handle, "pbs_locjob", |scope, h| {
            let id = scope.c_string("job id", id)?;
            let extend = scope.c_string_opt("extend", extend)?;
            let lib = scope.lib();
            let location = unsafe {
                bridge::check_pointer(lib, "pbs_locjob", h, lib.locjob(h, id, extend))
            }?;
            scope.adopt_block(location);
            Ok(unsafe { borrow_static(location) }.unwrap_or_default())
        })
    }

    /// Submit the job script at path `script`, returning the new job's id.
    ///
    /// An empty `destination` means the server's default queue.
    pub fn submit(&self, handle: SessionHandle, attrs: &[Attribute], script: &str,
                  destination: &str, extend: Option<&str>) -> Result<String> {
        self.call(handle, "pbs_submit", |scope, h| {
            let attrib = codec::encode(scope, attrs)?;
            let script = scope.c_string("script", script)?;
            let destination = scope.c_string("destination", destination)?;
            let extend = scope.c_string_opt("extend", extend)?;
            let lib = scope.lib();
            let id = unsafe {
                bridge::check_pointer(lib, "pbs_submit", h,
                                      lib.submit(h, attrib, script, destination, extend))
            }?;
            scope.adopt_block(id);
            let id = unsafe { borrow_static(id) }.unwrap_or_default();
            debug!("submitted job {}", id);
            Ok(id)
        })
    }

    /// The shape shared by the status queries.
    fn stat<F>(&self, handle: SessionHandle, op: &'static str, id: Option<&str>,
               attrs: &[Attribute], extend: Option<&str>, f: F) -> Result<Vec<StatusRecord>>
        where F: FnOnce(&L, c_int, *mut c_char, *mut attrl, *mut c_char) -> *mut batch_status
    {
        self.call(handle, op, |scope, h| {
            let id = scope.c_string_opt("id", id)?;
            let attrib = codec::encode(scope, attrs)?;
            let extend = scope.c_string_opt("extend", extend)?;
            let lib = scope.lib();
            let status = f(lib, h, id, attrib, extend);

            let status = match unsafe { bridge::check_listing(lib, op, h, status) }? {
                Some(s) => s,
                None => return Ok(Vec::new()),
            };

            scope.adopt_status(status);
            let records = unsafe { codec::decode_status(op, status) }?;
            debug!("{} returned {} records", op, records.len());
            Ok(records)
        })
    }

    /// Get the status of a job, or of all jobs if `id` is empty.
    ///
    /// If `attrs` is not empty, only the named attributes are reported.
    pub fn stat_job(&self, handle: SessionHandle, id: &str, attrs: &[Attribute],
                    extend: Option<&str>) -> Result<Vec<StatusRecord>> {
        self.stat(handle, "pbs_statjob", Some(id), attrs, extend, |lib, h, id, a, e| {
            unsafe { lib.statjob(h, id, a, e) }
        })
    }

    /// Get the status of a node, or of all nodes if `id` is empty.
    pub fn stat_node(&self, handle: SessionHandle, id: &str, attrs: &[Attribute],
                     extend: Option<&str>) -> Result<Vec<StatusRecord>> {
        self.stat(handle, "pbs_statnode", Some(id), attrs, extend, |lib, h, id, a, e| {
            unsafe { lib.statnode(h, id, a, e) }
        })
    }

    /// Get the status of a queue, or of all queues if `id` is empty.
    pub fn stat_queue(&self, handle: SessionHandle, id: &str, attrs: &[Attribute],
                      extend: Option<&str>) -> Result<Vec<StatusRecord>> {
        self.stat(handle, "pbs_statque", Some(id), attrs, extend, |lib, h, id, a, e| {
            unsafe { lib.statque(h, id, a, e) }
        })
    }

    /// Get the status of the server.
    pub fn stat_server(&self, handle: SessionHandle, attrs: &[Attribute],
                       extend: Option<&str>) -> Result<Vec<StatusRecord>> {
        self.stat(handle, "pbs_statserver", None, attrs, extend, |lib, h, _id, a, e| {
            unsafe { lib.statserver(h, a, e) }
        })
    }

    /// List the ids of the jobs matching every clause of `filter`.
    ///
    /// An empty filter matches every job.
    pub fn select_jobs(&self, handle: SessionHandle, filter: &[Attribute],
                       extend: Option<&str>) -> Result<Vec<String>> {
        self.call(handle, "pbs_selectjob", |scope, h| {
            let attrib = codec::encode(scope, filter)?;
            let extend = scope.c_string_opt("extend", extend)?;
            let lib = scope.lib();
            let ids = unsafe { lib.selectjob(h, attrib, extend) };

            let ids = match unsafe { bridge::check_listing(lib, "pbs_selectjob", h, ids) }? {
                Some(ids) => ids,
                None => return Ok(Vec::new()),
            };

            // The strings live inside the array's own allocation, so the
            // array is released as one block and the elements never are.
            scope.adopt_block(ids);
            unsafe { codec::decode_string_array("pbs_selectjob", ids) }
        })
    }

    /// Ask whether the resources described by `resource`, such as
    /// `nodes=2`, are available. The answer is one of `yes`, `no`, `never`,
    /// or `?`.
    pub fn available(&self, handle: SessionHandle, resource: &str) -> Result<String> {
        self.call(handle, "avail", |scope, h| {
            let resource = scope.c_string("resource", resource)?;
            let lib = scope.lib();
            let answer = unsafe { bridge::check_pointer(lib, "avail", h, lib.avail(h, resource)) }?;
            Ok(unsafe { borrow_static(answer) }.unwrap_or_default())
        })
    }

    /// The total number of nodes in the pool, refreshing the library's
    /// cached node list first if `update` is set.
    pub fn total_pool(&self, handle: SessionHandle, update: bool) -> Result<u32> {
        self.call(handle, "totpool", |scope, h| {
            let lib = scope.lib();
            let n = unsafe { bridge::check_count(lib, "totpool", h, lib.totpool(h, update as c_int)) }?;
            Ok(n as u32)
        })
    }

    /// The number of nodes in the pool that are in use.
    pub fn used_pool(&self, handle: SessionHandle, update: bool) -> Result<u32> {
        self.call(handle, "usepool", |scope, h| {
            let lib = scope.lib();
            let n = unsafe { bridge::check_count(lib, "usepool", h, lib.usepool(h, update as c_int)) }?;
            Ok(n as u32)
        })
    }
}

impl<L: Library> Drop for Client<L> {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(s) => s,
            Err(_) => return,
        };

        for handle in state.open.drain() {
            warn!("PBS session {} still open at shutdown; disconnecting", handle);

            if unsafe { state.lib.disconnect(handle) } != 0 {
                let code = unsafe { state.lib.errno() };
                warn!("failed to disconnect PBS session {} cleanly (error {})", handle, code);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{names, AttributeList, Operator};
    use crate::error::ErrorKind;
    use crate::mock::{self, MockLibrary};

    fn setup() -> (MockLibrary, Client<MockLibrary>, SessionHandle) {
        let mock = MockLibrary::new();
        let client = Client::new(mock.clone());
        let handle = client.connect("").unwrap();
        (mock, client, handle)
    }

    fn assert_balanced(mock: &MockLibrary) {
        assert_eq!(mock.allocated(), mock.released(),
                   "allocations and releases differ");
        assert_eq!(mock.live(), 0);
        assert!(mock.bad_frees().is_empty(), "bad frees: {:?}", mock.bad_frees());
    }

    fn job(name: &str, attrs: Vec<Attribute>) -> StatusRecord {
        StatusRecord {
            name: name.to_owned(),
            text: String::new(),
            attributes: attrs.into(),
        }
    }

    #[test]
    fn empty_server_means_default() {
        let (mock, _client, handle) = setup();
        assert_eq!(mock.server_of(handle.raw()).as_ref().map(|s| s.as_str()),
                   Some(MockLibrary::DEFAULT_SERVER));
    }

    #[test]
    fn named_server_is_passed_through() {
        let mock = MockLibrary::new();
        let client = Client::new(mock.clone());
        let handle = client.connect("batch.example.edu").unwrap();
        assert_eq!(mock.server_of(handle.raw()).as_ref().map(|s| s.as_str()),
                   Some("batch.example.edu"));
        assert_balanced(&mock);
    }

    #[test]
    fn failed_connect_is_a_connection_error() {
        let mock = MockLibrary::new();
        mock.fail_next(mock::PERMISSION);
        let client = Client::new(mock.clone());
        let e = client.connect("nowhere").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Connection);
        assert_eq!(e.code(), Some(mock::PERMISSION));
        assert_balanced(&mock);
    }

    #[test]
    fn double_disconnect_is_a_precondition_violation() {
        let (mock, client, handle) = setup();
        client.disconnect(handle).unwrap();
        assert!(!client.is_connected(handle));

        let e = client.disconnect(handle).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Precondition);
        assert_eq!(mock.calls().iter().filter(|c| *c == "pbs_disconnect").count(), 1);
    }

    #[test]
    fn stale_handles_are_rejected_before_the_library_sees_them() {
        let (mock, client, handle) = setup();
        client.disconnect(handle).unwrap();
        let n_calls = mock.calls().len();

        match client.stat_job(handle, "", &[], None) {
            Err(PbsError::NotConnected { .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }

        assert_eq!(mock.calls().len(), n_calls);
    }

    #[test]
    fn stat_job_decodes_every_record_in_order() {
        let (mock, client, handle) = setup();
        let records = vec![
            job("1.mock", vec![
                Attribute::new(names::ATTR_N, "first"),
                Attribute::new(names::ATTR_state, "R"),
            ]),
            job("2.mock", vec![Attribute::new(names::ATTR_state, "Q")]),
            job("3.mock", vec![]),
        ];
        mock.set_records(records.clone());

        let got = client.stat_job(handle, "", &[], None).unwrap();
        assert_eq!(got, records);
        assert_balanced(&mock);
    }

    #[test]
    fn stat_filter_reaches_the_library_in_order() {
        let (mock, client, handle) = setup();
        let wanted = vec![
            Attribute::named(names::ATTR_state),
            Attribute::named(names::ATTR_l).with_resource("walltime"),
            Attribute::named(names::ATTR_owner),
        ];

        client.stat_job(handle, "7.mock", &wanted, Some("")).unwrap();
        assert_eq!(mock.received_filter(), wanted);
        assert_balanced(&mock);
    }

    #[test]
    fn empty_filter_is_sent_as_null() {
        let (mock, client, handle) = setup();
        client.select_jobs(handle, &[], None).unwrap();
        assert!(mock.received_null_filter());
        assert_balanced(&mock);
    }

    #[test]
    fn empty_listing_is_not_an_error() {
        let (mock, client, handle) = setup();
        assert!(client.stat_queue(handle, "", &[], None).unwrap().is_empty());
        assert!(client.select_jobs(handle, &[], None).unwrap().is_empty());
        assert_balanced(&mock);
    }

    #[test]
    fn failed_stat_releases_the_request() {
        let (mock, client, handle) = setup();
        mock.fail_next_with_message(mock::UNKNOWN_JOB, "no such job 99.mock");

        let filter = vec![Attribute::named(names::ATTR_state)];

        match client.stat_job(handle, "99.mock", &filter, None) {
            Err(PbsError::Call { op, code, message, detail }) => {
                assert_eq!(op, "pbs_statjob");
                assert_eq!(code, mock::UNKNOWN_JOB);
                assert_eq!(message, "Unknown Job Id");
                assert_eq!(detail.as_ref().map(|s| s.as_str()), Some("no such job 99.mock"));
            },
            other => panic!("unexpected result {:?}", other),
        }

        assert_balanced(&mock);
    }

    #[test]
    fn decode_failure_still_releases_everything() {
        let (mock, client, handle) = setup();
        mock.set_records(vec![job("1.mock", vec![Attribute::new(names::ATTR_state, "R")])]);
        mock.corrupt_operators(true);

        let e = client.stat_job(handle, "", &[Attribute::named(names::ATTR_state)], None)
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Decode);
        assert_balanced(&mock);
    }

    #[test]
    fn select_releases_the_id_block_once() {
        let (mock, client, handle) = setup();
        mock.set_selection(&["1.mock", "2.mock", "3.mock"]);

        let filter = vec![Attribute::filter(names::ATTR_u, Operator::Eq, "alice")];
        let allocated_before = mock.allocated();
        let released_before = mock.released();

        let ids = client.select_jobs(handle, &filter, None).unwrap();
        assert_eq!(ids, vec!["1.mock", "2.mock", "3.mock"]);

        // two strings and one node for the filter, plus the result block
        assert_eq!(mock.allocated() - allocated_before, 4);
        assert_eq!(mock.released() - released_before, 4);
        assert_eq!(mock.block_frees(), 1);
        assert_balanced(&mock);
    }

    #[test]
    fn success_never_reads_stale_errors() {
        let (mock, client, handle) = setup();
        mock.set_errno(mock::PERMISSION);

        client.delete_job(handle, "1.mock", None).unwrap();
        client.hold_job(handle, "1.mock", HoldType::User, None).unwrap();
        client.release_hold(handle, "1.mock", HoldType::User, None).unwrap();
        client.signal_job(handle, "1.mock", "SIGTERM", None).unwrap();
        client.submit(handle, &[], "job.sh", "", None).unwrap();

        assert_eq!(mock.errno_reads(), 0);
        assert_balanced(&mock);
    }

    #[test]
    fn job_operations_pass_their_arguments() {
        let (mock, client, handle) = setup();

        client.hold_job(handle, "1.mock", HoldType::System, None).unwrap();
        client.message_job(handle, "1.mock", MessageStream::Stderr, "hello", None).unwrap();
        client.order_jobs(handle, "1.mock", "2.mock", None).unwrap();
        client.move_job(handle, "1.mock", "long@other", None).unwrap();
        client.run_job(handle, "1.mock", None, None).unwrap();
        client.rerun_job(handle, "1.mock", None).unwrap();
        client.checkpoint_job(handle, "1.mock", None).unwrap();
        client.terminate(handle, Manner::Delay, None).unwrap();
        client.gpu_mode(handle, "node01", 0, 1).unwrap();

        assert_eq!(mock.last_args("pbs_holdjob"), vec!["1.mock", "s"]);
        assert_eq!(mock.last_args("pbs_msgjob"), vec!["1.mock", "2", "hello"]);
        assert_eq!(mock.last_args("pbs_orderjob"), vec!["1.mock", "2.mock"]);
        assert_eq!(mock.last_args("pbs_movejob"), vec!["1.mock", "long@other"]);
        assert_eq!(mock.last_args("pbs_terminate"), vec!["1"]);
        assert_balanced(&mock);
    }

    #[test]
    fn every_failing_operation_releases_its_arguments() {
        let (mock, client, handle) = setup();
        let attrs = vec![Attribute::new(names::ATTR_N, "x").with_resource("r")];

        let outcomes = vec![
            { mock.fail_next(mock::PERMISSION); client.delete_job(handle, "1", Some("e")).is_err() },
            { mock.fail_next(mock::PERMISSION); client.hold_job(handle, "1", HoldType::User, None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.signal_job(handle, "1", "SIGKILL", None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.submit(handle, &attrs, "s", "q", None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.locate_job(handle, "1", None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.select_jobs(handle, &attrs, None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.stat_server(handle, &attrs, None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.total_pool(handle, true).is_err() },
            { mock.fail_next(mock::PERMISSION); client.available(handle, "nodes=1").is_err() },
            { mock.fail_next(mock::PERMISSION); client.terminate(handle, Manner::Quick, Some("e")).is_err() },
            { mock.fail_next(mock::PERMISSION); client.gpu_mode(handle, "node01", 0, 1).is_err() },
            { mock.fail_next(mock::PERMISSION); client.gpu_reset(handle, "node01", 0, 1, 0).is_err() },
            { mock.fail_next(mock::PERMISSION); client.stat_node(handle, "node01", &attrs, None).is_err() },
            { mock.fail_next(mock::PERMISSION); client.stat_queue(handle, "batch", &attrs, Some("e")).is_err() },
            { mock.fail_next(mock::PERMISSION); client.used_pool(handle, false).is_err() },
            { mock.fail_next(mock::PERMISSION); client.disconnect(handle).is_err() },
        ];

        assert!(outcomes.iter().all(|failed| *failed));
        assert!(!client.is_connected(handle));
        assert_balanced(&mock);
    }

    #[test]
    fn gpu_reset_passes_its_arguments() {
        let (mock, client, handle) = setup();
        client.gpu_reset(handle, "node07", 1, 1, 0).unwrap();
        assert_eq!(mock.last_args("pbs_gpureset"), vec!["node07", "1", "0"]);
        assert_balanced(&mock);
    }

    #[test]
    fn failed_gpu_reset_is_a_call_error() {
        let (mock, client, handle) = setup();
        mock.fail_next(mock::PERMISSION);

        let e = client.gpu_reset(handle, "node07", 1, 0, 1).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Call);
        assert_eq!(e.code(), Some(mock::PERMISSION));
        assert_balanced(&mock);
    }

    #[test]
    fn failed_disconnect_at_drop_is_tolerated() {
        let (mock, client, _handle) = setup();
        mock.fail_next(mock::PERMISSION);
        drop(client);
        assert_eq!(mock.calls().iter().filter(|c| *c == "pbs_disconnect").count(), 1);
        assert_balanced(&mock);
    }

    #[test]
    fn submit_returns_the_new_id_and_frees_it() {
        let (mock, client, handle) = setup();
        let attrs: AttributeList = vec![
            Attribute::new(names::ATTR_N, "sleeper"),
            Attribute::new(names::ATTR_l, "1:ppn=2").with_resource("nodes"),
        ].into();

        let id = client.submit(handle, &attrs, "job.sh", "batch", None).unwrap();
        assert_eq!(id, "1.mock");
        assert_eq!(mock.received_filter(), attrs.into_vec());
        assert_balanced(&mock);
    }

    #[test]
    fn resource_queries() {
        let (mock, client, handle) = setup();
        assert_eq!(client.available(handle, "nodes=1").unwrap(), "yes");
        assert_eq!(client.total_pool(handle, true).unwrap(), MockLibrary::TOTAL_NODES);
        assert_eq!(client.used_pool(handle, false).unwrap(), MockLibrary::USED_NODES);
        assert_eq!(client.locate_job(handle, "1.mock", None).unwrap(),
                   MockLibrary::DEFAULT_SERVER);
        assert_balanced(&mock);
    }

    #[test]
    fn static_strings() {
        let (mock, client, handle) = setup();
        assert_eq!(client.default_server().unwrap().as_ref().map(|s| s.as_str()),
                   Some(MockLibrary::DEFAULT_SERVER));
        assert_eq!(client.fallback_server().unwrap(), None);
        assert_eq!(client.strerror(mock::UNKNOWN_JOB).unwrap().as_ref().map(|s| s.as_str()),
                   Some("Unknown Job Id"));
        assert_eq!(client.error_message(handle).unwrap(), None);
        assert_eq!(mock.released(), mock.allocated());
    }

    #[test]
    fn dropping_the_client_closes_open_sessions() {
        let (mock, client, handle) = setup();
        let _second = client.connect("other").unwrap();
        client.disconnect(handle).unwrap();
        drop(client);
        assert_eq!(mock.calls().iter().filter(|c| *c == "pbs_disconnect").count(), 2);
        assert_eq!(mock.open_sessions(), 0);
    }
}
