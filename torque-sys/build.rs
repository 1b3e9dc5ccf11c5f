// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT license.

// Not every TORQUE install ships a pkg-config file, so if the probe fails
// we fall back to linking `-ltorque` from the default search path.

extern crate bindgen;
extern crate pkg_config;

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/wrapper.h");

    let mut builder = bindgen::Builder::default()
        .header("src/wrapper.h");

    match pkg_config::Config::new().probe("torque") {
        Ok(torque) => {
            for path in &torque.include_paths {
                builder = builder.clang_arg(format!("-I{}", path.display()));
            }
        },

        Err(_) => {
            println!("cargo:rustc-link-lib=torque");
        },
    }

    let bindings = builder
        .allowlist_type("attrl")
        .allowlist_type("attropl")
        .allowlist_type("batch_status")
        .allowlist_type("batch_op")
        .allowlist_function("pbs_.*")
        .allowlist_function("avail")
        .allowlist_function("totpool")
        .allowlist_function("usepool")
        .allowlist_var("pbs_errno")
        .allowlist_var("PBSE_.*")
        .allowlist_var("SHUT_.*")
        .allowlist_var("MSG_.*")
        .generate()
        .expect("Unable to generate bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");
}
