// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Make a list of the jobs belonging to a user.
 */

use chrono::{DateTime, Utc};
use crate::colorio::ColorIo;
use crate::util::{self, JobState};
use failure::Error;
use itertools::Itertools;
use pbs::{names, Attribute, Client, Library, Operator, SessionHandle, StatusRecord};
use std::cmp;
use std::collections::HashSet;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub struct JobsCommand {
    #[structopt(short = "u", long = "user")]
    /// Whose jobs to list; defaults to the current user.
    user: Option<String>,

    #[structopt(short = "l", long = "limit", default_value = "30")]
    /// Limit the output to at most this number of recent jobs.
    limit: usize,
}

impl JobsCommand {
    pub fn cli<L: Library>(self, cio: &mut ColorIo, client: &Client<L>,
                           session: SessionHandle) -> Result<i32, Error> {
        let user = match self.user {
            Some(u) => u,
            None => users::get_current_username()
                .and_then(|name| name.into_string().ok())
                .ok_or_else(|| format_err!("cannot determine the name of the current user"))?,
        };

        let now = Utc::now();
        let jobs = gather(client, session, &user, &now)?;

        if jobs.is_empty() {
            cprintln!(cio, pl, "no jobs for user {}", user);
            return Ok(0);
        }

        let mut max_name_len = 0;
        let mut max_queue_len = 0;
        let mut max_time_len = 0;

        for info in &jobs {
            max_name_len = cmp::max(max_name_len, info.name.len());
            max_queue_len = cmp::max(max_queue_len, info.queue.len());
            max_time_len = cmp::max(max_time_len, info.submit_text.len());
        }

        let skip = jobs.len().saturating_sub(self.limit);

        for info in jobs.iter().skip(skip) {
            info.emit(cio, max_name_len, max_queue_len, max_time_len);
        }

        Ok(0)
    }
}


/// What we print about one job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub queue: String,
    pub state: JobState,
    pub submit_time: Option<DateTime<Utc>>,
    pub submit_text: String,
}

impl JobInfo {
    fn new(record: &StatusRecord, now: &DateTime<Utc>) -> Self {
        let submit_time = record.get(names::ATTR_qtime).and_then(util::parse_epoch);

        let submit_text = match submit_time {
            Some(t) => format!("{} ago", util::dur_to_text(&now.signed_duration_since(t))),
            None => "unknown".to_owned(),
        };

        JobInfo {
            id: record.name.clone(),
            name: record.get(names::ATTR_N).unwrap_or("").to_owned(),
            queue: record.get(names::ATTR_queue).unwrap_or("").to_owned(),
            state: JobState::from_code(record.get(names::ATTR_state).unwrap_or("")),
            submit_time,
            submit_text,
        }
    }

    fn emit(&self, cio: &mut ColorIo, max_name_len: usize, max_queue_len: usize,
            max_time_len: usize) {
        cprint!(cio, hl, "{}", self.id);
        cprint!(cio, pl, " {1:0$}", max_name_len, self.name);
        cprint!(cio, pl, "  {1:0$}", max_queue_len, self.queue);
        cprint!(cio, pl, "  {1:0$}  ", max_time_len, self.submit_text);
        util::colorize_state(cio, self.state);
        cprintln!(cio, pl, "");
    }
}


/// Find the jobs belonging to `user`, oldest submission first.
pub fn gather<L: Library>(client: &Client<L>, session: SessionHandle, user: &str,
                          now: &DateTime<Utc>) -> Result<Vec<JobInfo>, Error> {
    let filter = [Attribute::filter(names::ATTR_u, Operator::Eq, user)];
    let ids: HashSet<String> = client.select_jobs(session, &filter, None)?.into_iter().collect();
    debug!("{} jobs selected for {}", ids.len(), user);

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let wanted = [
        Attribute::named(names::ATTR_N),
        Attribute::named(names::ATTR_queue),
        Attribute::named(names::ATTR_state),
        Attribute::named(names::ATTR_qtime),
    ];

    // One status query covers every selected job.
    let records = client.stat_job(session, "", &wanted, None)?;

    Ok(records
        .iter()
        .filter(|rec| ids.contains(&rec.name))
        .map(|rec| JobInfo::new(rec, now))
        .sorted_by_key(|info| info.submit_time)
        .collect())
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pbs::mock::MockLibrary;
    use pbs::AttributeList;

    fn job(id: &str, name: &str, state: &str, qtime: &str) -> StatusRecord {
        let attributes: AttributeList = vec![
            Attribute::new(names::ATTR_N, name),
            Attribute::new(names::ATTR_queue, "batch"),
            Attribute::new(names::ATTR_state, state),
            Attribute::new(names::ATTR_qtime, qtime),
        ].into();

        StatusRecord {
            name: id.to_owned(),
            text: String::new(),
            attributes,
        }
    }

    #[test]
    fn lists_selected_jobs_oldest_first() {
        let mock = MockLibrary::new();
        mock.set_selection(&["2.mock", "1.mock"]);
        mock.set_records(vec![
            job("2.mock", "later", "Q", "1500003600"),
            job("1.mock", "earlier", "R", "1500000000"),
            job("3.mock", "someone-else", "R", "1400000000"),
        ]);

        let client = Client::new(mock.clone());
        let session = client.connect("").unwrap();
        let now = Utc.timestamp_opt(1_500_007_200, 0).unwrap();
        let jobs = gather(&client, session, "alice", &now).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, "1.mock");
        assert_eq!(jobs[0].state, JobState::Running);
        assert_eq!(jobs[0].submit_text, "120 minutes ago");
        assert_eq!(jobs[1].name, "later");
        assert_eq!(jobs[1].queue, "batch");

        let filter = mock.received_filter();
        assert_eq!(filter.len(), 4);
        client.disconnect(session).unwrap();
        assert_eq!(mock.live(), 0);
    }

    #[test]
    fn select_filter_names_the_user() {
        let mock = MockLibrary::new();
        let client = Client::new(mock.clone());
        let session = client.connect("").unwrap();

        let jobs = gather(&client, session, "bob", &Utc::now()).unwrap();
        assert!(jobs.is_empty());

        let filter = mock.received_filter();
        assert_eq!(filter, vec![Attribute::filter(names::ATTR_u, Operator::Eq, "bob")]);
    }

    #[test]
    fn missing_queue_time_is_unknown() {
        let record = StatusRecord {
            name: "7.mock".to_owned(),
            ..StatusRecord::default()
        };

        let info = JobInfo::new(&record, &Utc::now());
        assert_eq!(info.submit_time, None);
        assert_eq!(info.submit_text, "unknown");
        assert_eq!(info.state, JobState::Unknown);
    }
}
