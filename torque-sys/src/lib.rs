// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT license.

//! Low-level bindings to the `libtorque` client library.
//!
//! [TORQUE](https://github.com/adaptivecomputing/torque) is a PBS-family
//! resource manager for scheduling and running batch jobs on computing
//! clusters. Its client library speaks the PBS batch protocol to a
//! `pbs_server` daemon.
//!
//! These bindings provide nothing beyond the barest minimum needed to
//! interface to the C code unsafely. As such, this crate has no documentation
//! beyond the text you see here. Use a higher-level Rust crate in application
//! code.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
