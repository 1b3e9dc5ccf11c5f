// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Query the status of a job.

This command is most similar to TORQUE's `qstat -f`, but it only prints the
attributes that are usually interesting, unless asked for all of them.

*/

use chrono::Utc;
use crate::colorio::ColorIo;
use crate::util::{self, JobState};
use failure::Error;
use pbs::{names, Client, Library, SessionHandle, StatusRecord};
use structopt::StructOpt;


#[derive(Debug, StructOpt)]
pub struct StatusCommand {
    #[structopt(help = "The ID of the job to query.")]
    jobid: String,

    #[structopt(short = "a", long = "all")]
    /// Print every attribute the server reports.
    all: bool,
}

impl StatusCommand {
    pub fn cli<L: Library>(self, cio: &mut ColorIo, client: &Client<L>,
                           session: SessionHandle) -> Result<i32, Error> {
        let records = client.stat_job(session, &self.jobid, &[], None)?;

        let job = match records.iter().find(|r| r.name == self.jobid).or_else(|| records.first()) {
            Some(j) => j,
            None => {
                ecprintln!(cio, red, "no such job: {}", self.jobid);
                return Ok(1);
            },
        };

        let state = JobState::from_code(job.get(names::ATTR_state).unwrap_or(""));
        cprint!(cio, hl, "{}", job.name);
        cprint!(cio, pl, " {} ", job.get(names::ATTR_N).unwrap_or(""));
        util::colorize_state(cio, state);
        cprintln!(cio, pl, "");

        for line in summarize(job) {
            cprintln!(cio, pl, "  {}", line);
        }

        if self.all {
            cprintln!(cio, hl, "  all attributes:");

            for attr in &job.attributes {
                match attr.resource {
                    Some(ref r) => { cprintln!(cio, pl, "    {}.{} = {}", attr.name, r, attr.value); },
                    None => { cprintln!(cio, pl, "    {} = {}", attr.name, attr.value); },
                }
            }
        }

        Ok(0)
    }
}


/// The interesting facts about a job, one line each.
fn summarize(job: &StatusRecord) -> Vec<String> {
    let mut lines = Vec::new();
    let now = Utc::now();

    if let Some(owner) = job.get(names::ATTR_owner) {
        lines.push(format!("owner: {}", owner));
    }

    if let Some(queue) = job.get(names::ATTR_queue) {
        lines.push(format!("queue: {}", queue));
    }

    if let Some(t) = job.get(names::ATTR_qtime).and_then(util::parse_epoch) {
        let wait = now.signed_duration_since(t);
        lines.push(format!("time since submission: {}", util::dur_to_text(&wait)));
    }

    if let Some(hosts) = job.get(names::ATTR_exechost) {
        lines.push(format!("running on: {}", hosts));
    }

    for attr in &job.attributes {
        if let Some(ref resource) = attr.resource {
            if attr.name == names::ATTR_l {
                lines.push(format!("requested {}: {}", resource, attr.value));
            } else if attr.name == names::ATTR_used {
                lines.push(format!("used {}: {}", resource, attr.value));
            }
        }
    }

    if let Some(code) = job.get(names::ATTR_exitstat) {
        lines.push(format!("exit status: {}", code));
    }

    if !job.text.is_empty() {
        lines.push(format!("server says: {}", job.text));
    }

    lines
}


#[cfg(test)]
mod tests {
    use super::*;
    use pbs::Attribute;

    #[test]
    fn summary_picks_out_resources() {
        let job = StatusRecord {
            name: "12.mock".to_owned(),
            text: String::new(),
            attributes: vec![
                Attribute::new(names::ATTR_owner, "alice@login"),
                Attribute::new(names::ATTR_l, "01:00:00").with_resource("walltime"),
                Attribute::new(names::ATTR_used, "00:10:00").with_resource("walltime"),
                Attribute::new(names::ATTR_exitstat, "0"),
            ].into(),
        };

        assert_eq!(summarize(&job), vec![
            "owner: alice@login".to_owned(),
            "requested walltime: 01:00:00".to_owned(),
            "used walltime: 00:10:00".to_owned(),
            "exit status: 0".to_owned(),
        ]);
    }

    #[test]
    fn summary_of_bare_record_is_empty() {
        assert!(summarize(&StatusRecord::default()).is_empty());
    }
}
