// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Summarize the server's queues and node pool.
 */

use crate::colorio::ColorIo;
use failure::Error;
use pbs::{names, Client, Library, SessionHandle, StatusRecord};
use std::cmp;
use structopt::StructOpt;


#[derive(Debug, StructOpt)]
pub struct QueuesCommand {
    #[structopt(long = "no-update")]
    /// Use the library's cached node counts instead of asking again.
    no_update: bool,
}

impl QueuesCommand {
    pub fn cli<L: Library>(self, cio: &mut ColorIo, client: &Client<L>,
                           session: SessionHandle) -> Result<i32, Error> {
        let queues = client.stat_queue(session, "", &[], None)?;
        let max_name_len = queues.iter().fold(0, |m, q| cmp::max(m, q.name.len()));

        for queue in &queues {
            let summary = QueueSummary::new(queue);
            cprint!(cio, hl, "{1:0$}", max_name_len, summary.name);
            cprint!(cio, pl, "  {:9}", summary.kind);

            if summary.open {
                cprint!(cio, green, "  open  ");
            } else {
                cprint!(cio, yellow, "  closed");
            }

            cprintln!(cio, pl, "  {} jobs  {}", summary.total, summary.states);
        }

        let total = client.total_pool(session, !self.no_update)?;
        let used = client.used_pool(session, false)?;
        cprint!(cio, hl, "nodes:");
        cprintln!(cio, pl, " {} of {} in use", used, total);
        Ok(0)
    }
}


#[derive(Clone, Debug, Eq, PartialEq)]
struct QueueSummary {
    name: String,
    kind: String,
    open: bool,
    total: String,
    states: String,
}

impl QueueSummary {
    fn new(queue: &StatusRecord) -> Self {
        let flag = |name: &str| queue.get(name).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);

        QueueSummary {
            name: queue.name.clone(),
            kind: queue.get(names::ATTR_qtype).unwrap_or("?").to_owned(),
            open: flag(names::ATTR_enable) && flag(names::ATTR_start),
            total: queue.get(names::ATTR_total).unwrap_or("0").to_owned(),
            states: queue.get(names::ATTR_count).unwrap_or("").to_owned(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pbs::mock::MockLibrary;
    use pbs::Attribute;

    #[test]
    fn summary_from_record() {
        let queue = StatusRecord {
            name: "batch".to_owned(),
            text: String::new(),
            attributes: vec![
                Attribute::new(names::ATTR_qtype, "Execution"),
                Attribute::new(names::ATTR_total, "4"),
                Attribute::new(names::ATTR_enable, "True"),
                Attribute::new(names::ATTR_start, "False"),
            ].into(),
        };

        let s = QueueSummary::new(&queue);
        assert_eq!(s.kind, "Execution");
        assert_eq!(s.total, "4");
        assert!(!s.open);
        assert_eq!(s.states, "");
    }

    #[test]
    fn pool_counts_come_from_the_library() {
        let mock = MockLibrary::new();
        let client = Client::new(mock.clone());
        let session = client.connect("").unwrap();

        assert_eq!(client.total_pool(session, true).unwrap(), MockLibrary::TOTAL_NODES);
        assert_eq!(client.used_pool(session, false).unwrap(), MockLibrary::USED_NODES);
        assert!(client.stat_queue(session, "", &[], None).unwrap().is_empty());
        client.disconnect(session).unwrap();
    }
}
