// Copyright 2018 Peter Williams <peter@newton.cx>
// Licensed under the MIT License.

//! The main CLI driver logic.

#![cfg_attr(not(feature = "torque"), allow(dead_code))]

#[macro_use] extern crate failure;
#[macro_use] extern crate log;

use failure::Error;
use pbs::{Client, Library, SessionHandle};
use std::process;
use structopt::StructOpt;

#[macro_use] mod colorio;
mod jobs;
mod queues;
mod status;
mod util;

use crate::colorio::ColorIo;


#[derive(Debug, StructOpt)]
#[structopt(name = "pbsplus", about = "Better commands for interacting with PBS/TORQUE.")]
struct PbsPlusCli {
    #[structopt(short = "s", long = "server", default_value = "")]
    /// The server to talk to; by default, the one the library is configured with.
    server: String,

    #[structopt(subcommand)]
    command: Command,
}

impl PbsPlusCli {
    fn cli<L: Library>(self, cio: &mut ColorIo, lib: L) -> Result<i32, Error> {
        let client = Client::new(lib);
        let session = client.connect(&self.server)?;
        debug!("connected to {:?} as session {}", self.server, session);

        let result = self.command.cli(cio, &client, session);

        if let Err(e) = client.disconnect(session) {
            warn!("failed to disconnect cleanly: {}", e);
        }

        result
    }
}


#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(name = "jobs")]
    /// List a user's jobs
    Jobs(jobs::JobsCommand),

    #[structopt(name = "queues")]
    /// Summarize the server's queues
    Queues(queues::QueuesCommand),

    #[structopt(name = "status")]
    /// Get the status of a job
    Status(status::StatusCommand),
}

impl Command {
    fn cli<L: Library>(self, cio: &mut ColorIo, client: &Client<L>,
                       session: SessionHandle) -> Result<i32, Error> {
        match self {
            Command::Jobs(cmd) => cmd.cli(cio, client, session),
            Command::Queues(cmd) => cmd.cli(cio, client, session),
            Command::Status(cmd) => cmd.cli(cio, client, session),
        }
    }
}


#[cfg(feature = "torque")]
fn run(cio: &mut ColorIo, program: PbsPlusCli) -> Result<i32, Error> {
    let lib = pbs::TorqueLibrary::claim()?;
    program.cli(cio, lib)
}

#[cfg(not(feature = "torque"))]
fn run(_cio: &mut ColorIo, _program: PbsPlusCli) -> Result<i32, Error> {
    Err(format_err!("pbsplus was built without the \"torque\" feature and cannot reach a batch server"))
}


fn main() {
    env_logger::init();

    let program = PbsPlusCli::from_args();
    let mut cio = ColorIo::new();

    process::exit(match run(&mut cio, program) {
        Ok(code) => code,

        Err(e) => {
            cio.print_error(e);
            1
        },
    });
}


#[cfg(test)]
mod tests {
    use super::*;
    use pbs::mock::MockLibrary;

    #[test]
    fn server_option_reaches_connect() {
        let mock = MockLibrary::new();
        let program = PbsPlusCli::from_iter(&["pbsplus", "--server", "alpha", "queues"]);
        assert_eq!(program.server, "alpha");

        let mut cio = ColorIo::new();
        assert_eq!(program.cli(&mut cio, mock.clone()).unwrap(), 0);
        assert!(mock.calls().iter().any(|c| c == "pbs_statque"));
        assert_eq!(mock.open_sessions(), 0);
        assert_eq!(mock.live(), 0);
    }

    #[test]
    fn failing_command_still_disconnects() {
        let mock = MockLibrary::new();
        let program = PbsPlusCli::from_iter(&["pbsplus", "status", "99.mock"]);
        mock.set_records(vec![pbs::StatusRecord {
            name: "99.mock".to_owned(),
            text: String::new(),
            attributes: vec![pbs::Attribute::new(pbs::names::ATTR_state, "R")].into(),
        }]);
        mock.corrupt_operators(true);

        let mut cio = ColorIo::new();
        assert!(program.cli(&mut cio, mock.clone()).is_err());
        assert!(mock.calls().iter().any(|c| c == "pbs_disconnect"));
        assert_eq!(mock.open_sessions(), 0);
        assert_eq!(mock.live(), 0);
    }

    #[test]
    fn refused_connection_is_an_error() {
        let mock = MockLibrary::new();
        let program = PbsPlusCli::from_iter(&["pbsplus", "queues"]);
        mock.fail_next(pbs::mock::PERMISSION);

        let mut cio = ColorIo::new();
        assert!(program.cli(&mut cio, mock.clone()).is_err());
        assert!(!mock.calls().iter().any(|c| c == "pbs_statque"));
    }

    #[test]
    fn unknown_job_is_reported() {
        let mock = MockLibrary::new();
        let program = PbsPlusCli::from_iter(&["pbsplus", "status", "99.mock"]);

        let mut cio = ColorIo::new();
        assert_eq!(program.cli(&mut cio, mock.clone()).unwrap(), 1);
        assert_eq!(mock.open_sessions(), 0);
    }
}
