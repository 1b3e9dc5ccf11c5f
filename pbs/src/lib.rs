// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Interface to PBS-family batch resource managers, such as TORQUE.

All communication with the batch server goes through the C client library.
A [`Client`] owns that library, opens sessions on it with
[`Client::connect`], and offers one method per operation (submitting,
querying, holding, signalling, deleting jobs and so on). Arguments are
copied into the library's heap as the linked structures it expects, and
results are copied back out into plain Rust values such as
[`StatusRecord`], so no foreign memory outlives the call that produced it.

The C library is not thread safe, most visibly in how it reports errors:
the reason for a failure is left in a process-global variable. A `Client`
serializes all calls to the library behind a single lock so that an error is
always attributed to the call that caused it. If you need to talk to the
batch server from several threads, share one `Client` between them.

With the `torque` cargo feature enabled, [`TorqueLibrary`] provides the real
library. Without it, this crate builds anywhere, which is mostly useful for
testing code against the `mock` module (feature `test_utils`).

```ignore
let client = pbs::Client::new(pbs::TorqueLibrary::claim()?);
let session = client.connect("")?;

for job in client.stat_job(session, "", &[], None)? {
    println!("{} {}", job.name, job.get(pbs::names::ATTR_state).unwrap_or("?"));
}
```

*/

#[macro_use] extern crate failure_derive;
#[macro_use] extern crate log;
extern crate libc;
#[cfg(feature = "torque")] extern crate torque_sys;


/// Most PBS calls return zero on success and leave the reason for a failure
/// in `pbs_errno`. This macro makes such a call, which is always unsafe, and
/// converts a failure into a `PbsError` with the `?` operator.
macro_rules! ustry {
    ($lib:expr, $op:expr, $handle:expr, $call:expr) => {{
        let rc = unsafe { $call };
        let checked = unsafe { $crate::bridge::check_status($lib, $op, $handle, rc) };
        checked?
    }}
}


pub mod attr;
mod bridge;
mod client;
mod codec;
pub mod error;
pub mod ffi;
#[cfg(any(test, feature = "test_utils"))]
pub mod mock;
mod ownership;
#[cfg(feature = "torque")]
mod torque;

pub use crate::attr::{names, Attribute, AttributeList, HoldType, Manner, MessageStream,
                      Operator, StatusRecord};
pub use crate::bridge::PBSE_NONE;
pub use crate::client::{Client, SessionHandle};
pub use crate::error::{ErrorKind, PbsError, Result};
pub use crate::ffi::Library;
#[cfg(feature = "torque")]
pub use crate::torque::TorqueLibrary;
