// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! List the jobs belonging to a user, with their states.
 */

#[macro_use] extern crate clap;
extern crate failure;
extern crate pbs;

use clap::{Arg, App};
use failure::Error;
use pbs::{names, Attribute, Operator};
use std::process;

fn main() {
    let matches = App::new("qselect")
        .version(crate_version!())
        .about("List the jobs belonging to a user")
        .arg(Arg::with_name("server")
             .long("server")
             .takes_value(true)
             .help("The PBS server to query; defaults to the library default"))
        .arg(Arg::with_name("USER")
             .help("The user whose jobs to list")
             .required(true)
             .index(1))
        .get_matches();

    let server = matches.value_of("server").unwrap_or("");
    let user = matches.value_of("USER").unwrap();

    process::exit(match inner(server, user) {
        Ok(code) => code,

        Err(e) => {
            eprintln!("fatal error in qselect");
            for cause in e.iter_chain() {
                eprintln!("  caused by: {}", cause);
            }
            1
        },
    });
}


fn inner(server: &str, user: &str) -> Result<i32, Error> {
    let client = pbs::Client::new(pbs::TorqueLibrary::claim()?);
    let session = client.connect(server)?;

    let filter = vec![Attribute::filter(names::ATTR_u, Operator::Eq, user)];
    let wanted = vec![Attribute::named(names::ATTR_name), Attribute::named(names::ATTR_state)];

    for id in client.select_jobs(session, &filter, None)? {
        for job in client.stat_job(session, &id, &wanted, None)? {
            println!("{} {} {}",
                     job.name,
                     job.get(names::ATTR_state).unwrap_or("?"),
                     job.get(names::ATTR_name).unwrap_or(""));
        }
    }

    client.disconnect(session)?;
    Ok(0)
}
