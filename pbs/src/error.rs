// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Errors reported by the binding.

*/

use libc::c_int;
use std::result;


/// The broad classes of failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// A session could not be established.
    Connection,

    /// The daemon or the library rejected an operation.
    Call,

    /// The library handed back something we could not make sense of. This
    /// means our idea of the ABI is wrong, not that the request was bad.
    Decode,

    /// The caller misused the binding: a stale handle, a second binding, a
    /// bad argument.
    Precondition,
}


/// An error from the PBS binding.
#[derive(Debug, Fail)]
pub enum PbsError {
    #[fail(display = "cannot connect to PBS server \"{}\": {} (error {})", server, message, code)]
    Connect {
        server: String,
        code: c_int,
        message: String,
    },

    #[fail(display = "{} failed: {} (error {})", op, message, code)]
    Call {
        op: &'static str,
        code: c_int,
        message: String,
        /// The daemon's own message for the session, if it left one.
        detail: Option<String>,
    },

    #[fail(display = "malformed response from {}: {}", op, reason)]
    Decode {
        op: &'static str,
        reason: String,
    },

    #[fail(display = "session handle {} is not connected", handle)]
    NotConnected {
        handle: c_int,
    },

    #[fail(display = "the PBS client library is already claimed by another binding")]
    AlreadyClaimed,

    #[fail(display = "a previous call into the PBS client library panicked")]
    Poisoned,

    #[fail(display = "{} argument contains an interior NUL byte", what)]
    InteriorNul {
        what: &'static str,
    },

    #[fail(display = "could not allocate {} bytes in the foreign heap", size)]
    OutOfMemory {
        size: usize,
    },
}

impl PbsError {
    /// Which class of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match *self {
            PbsError::Connect { .. } => ErrorKind::Connection,
            PbsError::Call { .. } => ErrorKind::Call,
            PbsError::Decode { .. } => ErrorKind::Decode,
            PbsError::NotConnected { .. } |
            PbsError::AlreadyClaimed |
            PbsError::Poisoned |
            PbsError::InteriorNul { .. } |
            PbsError::OutOfMemory { .. } => ErrorKind::Precondition,
        }
    }

    /// The numeric PBS error code, for errors that came from the library.
    pub fn code(&self) -> Option<c_int> {
        match *self {
            PbsError::Connect { code, .. } | PbsError::Call { code, .. } => Some(code),
            _ => None,
        }
    }

    pub(crate) fn decode<S: Into<String>>(op: &'static str, reason: S) -> Self {
        PbsError::Decode { op, reason: reason.into() }
    }
}


pub type Result<T> = result::Result<T, PbsError>;
