// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Miscellaneous utility functions.

 */

use chrono::{DateTime, Duration, TimeZone, Utc};
use crate::colorio::ColorIo;


/// The state of a job, as reported in its `job_state` attribute.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum JobState {
    Queued,
    Waiting,
    Held,
    Transit,
    Running,
    Exiting,
    Suspended,
    Complete,
    Unknown,
}

impl JobState {
    pub fn from_code(code: &str) -> JobState {
        match code {
            "Q" => JobState::Queued,
            "W" => JobState::Waiting,
            "H" => JobState::Held,
            "T" => JobState::Transit,
            "R" => JobState::Running,
            "E" => JobState::Exiting,
            "S" => JobState::Suspended,
            "C" => JobState::Complete,
            _ => JobState::Unknown,
        }
    }

    pub fn shortcode(&self) -> &'static str {
        match *self {
            JobState::Queued => "Q",
            JobState::Waiting => "W",
            JobState::Held => "H",
            JobState::Transit => "T",
            JobState::Running => "R",
            JobState::Exiting => "E",
            JobState::Suspended => "S",
            JobState::Complete => "C",
            JobState::Unknown => "?",
        }
    }
}


/// Print out a shortcode for a job state with affective color.
pub fn colorize_state(cio: &mut ColorIo, state: JobState) {
    match state {
        JobState::Queued | JobState::Waiting | JobState::Transit => {
            cprint!(cio, pl, "{}", state.shortcode());
        },

        JobState::Running | JobState::Exiting => {
            cprint!(cio, hl, "{}", state.shortcode());
        },

        JobState::Complete => {
            cprint!(cio, green, "{}", state.shortcode());
        },

        JobState::Unknown => {
            cprint!(cio, red, "{}", state.shortcode());
        },

        JobState::Held | JobState::Suspended => {
            cprint!(cio, yellow, "{}", state.shortcode());
        },
    }
}


/// Parse one of the epoch-seconds timestamps that the server reports, such
/// as `qtime`.
pub fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    let secs = text.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}


/// Express a duration in text, approximately.
pub fn dur_to_text(dur: &Duration) -> String {
    if dur.num_days() > 2 {
        format!("{} days", dur.num_days())
    } else if dur.num_hours() > 2 {
        format!("{} hours", dur.num_hours())
    } else if dur.num_minutes() > 2 {
        format!("{} minutes", dur.num_minutes())
    } else {
        format!("{} seconds", dur.num_seconds())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes() {
        assert_eq!(JobState::from_code("R"), JobState::Running);
        assert_eq!(JobState::from_code("H").shortcode(), "H");
        assert_eq!(JobState::from_code("X"), JobState::Unknown);
    }

    #[test]
    fn epoch_parsing() {
        let t = parse_epoch("1500000000").unwrap();
        assert_eq!(t.timestamp(), 1_500_000_000);
        assert!(parse_epoch("soon").is_none());
    }

    #[test]
    fn durations() {
        assert_eq!(dur_to_text(&Duration::seconds(30)), "30 seconds");
        assert_eq!(dur_to_text(&Duration::hours(5)), "5 hours");
        assert_eq!(dur_to_text(&Duration::days(9)), "9 days");
    }
}
