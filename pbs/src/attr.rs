// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Attributes, status records, and the constant vocabularies of the batch
protocol.

These are plain owned values. They are built by the caller for requests, or
decoded from library responses by the `codec` module; nothing here refers to
foreign memory.

*/

use libc::{c_int, c_uint};
use std::fmt;
use std::iter::FromIterator;
use std::ops::Deref;
use std::slice;
use std::vec;


/// How an attribute's value relates to its name.
///
/// Submissions and alterations use the assignment operators; selection
/// filters use the comparisons. The discriminants are the values of the C
/// library's `enum batch_op`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum Operator {
    Set = 0,
    Unset = 1,
    Incr = 2,
    Decr = 3,
    Eq = 4,
    Ne = 5,
    Ge = 6,
    Gt = 7,
    Le = 8,
    Lt = 9,
    Default = 10,
    Merge = 11,
    IncrOld = 12,
}

impl Operator {
    pub fn to_raw(self) -> c_uint {
        self as c_uint
    }

    pub fn from_raw(raw: c_uint) -> Option<Operator> {
        Some(match raw {
            0 => Operator::Set,
            1 => Operator::Unset,
            2 => Operator::Incr,
            3 => Operator::Decr,
            4 => Operator::Eq,
            5 => Operator::Ne,
            6 => Operator::Ge,
            7 => Operator::Gt,
            8 => Operator::Le,
            9 => Operator::Lt,
            10 => Operator::Default,
            11 => Operator::Merge,
            12 => Operator::IncrOld,
            _ => return None,
        })
    }

    /// The name of the operator in the C header.
    pub fn token(self) -> &'static str {
        match self {
            Operator::Set => "SET",
            Operator::Unset => "UNSET",
            Operator::Incr => "INCR",
            Operator::Decr => "DECR",
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Ge => "GE",
            Operator::Gt => "GT",
            Operator::Le => "LE",
            Operator::Lt => "LT",
            Operator::Default => "DFLT",
            Operator::Merge => "MERGE",
            Operator::IncrOld => "INCR_OLD",
        }
    }
}

impl Default for Operator {
    fn default() -> Self {
        Operator::Set
    }
}


/// A single named property of a job, node, queue, or server.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Attribute {
    pub name: String,

    /// Present when the attribute is indexed by resource, as with
    /// `Resource_List.nodes`.
    pub resource: Option<String>,

    pub value: String,
    pub op: Operator,
}

impl Attribute {
    /// Create a plain `name = value` assignment.
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Attribute {
            name: name.into(),
            resource: None,
            value: value.into(),
            op: Operator::Set,
        }
    }

    /// Create a selection clause comparing `name` against `value`.
    pub fn filter<N: Into<String>, V: Into<String>>(name: N, op: Operator, value: V) -> Self {
        Attribute {
            name: name.into(),
            resource: None,
            value: value.into(),
            op,
        }
    }

    /// Name an attribute without giving it a value, as when asking a status
    /// query to report only certain attributes.
    pub fn named<N: Into<String>>(name: N) -> Self {
        Attribute::new(name, "")
    }

    pub fn with_resource<R: Into<String>>(mut self, resource: R) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_op(mut self, op: Operator) -> Self {
        self.op = op;
        self
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.resource {
            Some(ref r) => write!(f, "{}.{} = {}", self.name, r, self.value),
            None => write!(f, "{} = {}", self.name, self.value),
        }
    }
}


/// An ordered sequence of attributes.
///
/// Order is significant: the list is transmitted as a linked chain and is
/// reconstructed in the same order on the other side.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct AttributeList(Vec<Attribute>);

impl AttributeList {
    pub fn new() -> Self {
        AttributeList(Vec::new())
    }

    pub fn push(&mut self, attr: Attribute) -> &mut Self {
        self.0.push(attr);
        self
    }

    /// Find the first unindexed attribute with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter()
            .find(|a| a.name == name && a.resource.is_none())
            .map(|a| a.value.as_str())
    }

    /// Find the first attribute with the given name and resource index.
    pub fn get_resource(&self, name: &str, resource: &str) -> Option<&str> {
        self.0.iter()
            .find(|a| a.name == name && a.resource.as_deref() == Some(resource))
            .map(|a| a.value.as_str())
    }

    pub fn into_vec(self) -> Vec<Attribute> {
        self.0
    }
}

impl Deref for AttributeList {
    type Target = [Attribute];

    fn deref(&self) -> &[Attribute] {
        &self.0
    }
}

impl From<Vec<Attribute>> for AttributeList {
    fn from(v: Vec<Attribute>) -> Self {
        AttributeList(v)
    }
}

impl FromIterator<Attribute> for AttributeList {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        AttributeList(iter.into_iter().collect())
    }
}

impl IntoIterator for AttributeList {
    type Item = Attribute;
    type IntoIter = vec::IntoIter<Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a Attribute;
    type IntoIter = slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}


/// One entity reported by a status query: a job, node, queue, or server.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusRecord {
    pub name: String,
    pub text: String,
    pub attributes: AttributeList,
}

impl StatusRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    pub fn get_resource(&self, name: &str, resource: &str) -> Option<&str> {
        self.attributes.get_resource(name, resource)
    }
}


/// The kinds of hold that can be placed on or released from a job.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HoldType {
    User,
    Other,
    System,
}

impl HoldType {
    /// The token the C header defines for this hold type.
    pub fn token(self) -> &'static str {
        match self {
            HoldType::User => "u",
            HoldType::Other => "o",
            HoldType::System => "s",
        }
    }
}


/// How the server should shut down.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Manner {
    /// Stop now, checkpointing or requeueing running jobs.
    Immediate,

    /// Stop accepting work and wait for running jobs to finish.
    Delay,

    /// Stop now, leaving running jobs alone.
    Quick,
}

impl Manner {
    pub fn to_raw(self) -> c_int {
        match self {
            Manner::Immediate => 0,
            Manner::Delay => 1,
            Manner::Quick => 2,
        }
    }
}


/// Which output file of a job a message is appended to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageStream {
    Stdout,
    Stderr,
}

impl MessageStream {
    pub fn to_raw(self) -> c_int {
        match self {
            MessageStream::Stdout => 1,
            MessageStream::Stderr => 2,
        }
    }
}


/// Attribute names understood by the server, with the names the C header
/// gives them.
#[allow(non_upper_case_globals)]
pub mod names {
    pub const ATTR_a: &str = "Execution_Time";
    pub const ATTR_c: &str = "Checkpoint";
    pub const ATTR_e: &str = "Error_Path";
    pub const ATTR_f: &str = "fault_tolerant";
    pub const ATTR_g: &str = "group_list";
    pub const ATTR_h: &str = "Hold_Types";
    pub const ATTR_j: &str = "Join_Path";
    pub const ATTR_k: &str = "Keep_Files";
    pub const ATTR_l: &str = "Resource_List";
    pub const ATTR_m: &str = "Mail_Points";
    pub const ATTR_o: &str = "Output_Path";
    pub const ATTR_p: &str = "Priority";
    pub const ATTR_q: &str = "destination";
    pub const ATTR_r: &str = "Rerunable";
    pub const ATTR_t: &str = "job_array_request";
    pub const ATTR_array_id: &str = "job_array_id";
    pub const ATTR_u: &str = "User_List";
    pub const ATTR_v: &str = "Variable_List";
    pub const ATTR_A: &str = "Account_Name";
    pub const ATTR_args: &str = "job_arguments";
    pub const ATTR_M: &str = "Mail_Users";
    pub const ATTR_N: &str = "Job_Name";
    pub const ATTR_S: &str = "Shell_Path_List";
    pub const ATTR_depend: &str = "depend";
    pub const ATTR_inter: &str = "interactive";
    pub const ATTR_stagein: &str = "stagein";
    pub const ATTR_stageout: &str = "stageout";
    pub const ATTR_jobtype: &str = "jobtype";
    pub const ATTR_submit_host: &str = "submit_host";
    pub const ATTR_init_work_dir: &str = "init_work_dir";
    pub const ATTR_ctime: &str = "ctime";
    pub const ATTR_exechost: &str = "exec_host";
    pub const ATTR_execport: &str = "exec_port";
    pub const ATTR_mtime: &str = "mtime";
    pub const ATTR_qtime: &str = "qtime";
    pub const ATTR_session: &str = "session_id";
    pub const ATTR_euser: &str = "euser";
    pub const ATTR_egroup: &str = "egroup";
    pub const ATTR_hashname: &str = "hashname";
    pub const ATTR_hopcount: &str = "hop_count";
    pub const ATTR_security: &str = "security";
    pub const ATTR_sched_hint: &str = "sched_hint";
    pub const ATTR_substate: &str = "substate";
    pub const ATTR_name: &str = "Job_Name";
    pub const ATTR_owner: &str = "Job_Owner";
    pub const ATTR_used: &str = "resources_used";
    pub const ATTR_state: &str = "job_state";
    pub const ATTR_queue: &str = "queue";
    pub const ATTR_server: &str = "server";
    pub const ATTR_maxrun: &str = "max_running";
    pub const ATTR_maxreport: &str = "max_report";
    pub const ATTR_total: &str = "total_jobs";
    pub const ATTR_qtype: &str = "queue_type";
    pub const ATTR_count: &str = "state_count";
    pub const ATTR_enable: &str = "enabled";
    pub const ATTR_start: &str = "started";
    pub const ATTR_comment: &str = "comment";
    pub const ATTR_cookie: &str = "cookie";
    pub const ATTR_qrank: &str = "queue_rank";
    pub const ATTR_altid: &str = "alt_id";
    pub const ATTR_etime: &str = "etime";
    pub const ATTR_exitstat: &str = "exit_status";
    pub const ATTR_forwardx11: &str = "forward_x11";
    pub const ATTR_submit_args: &str = "submit_args";
    pub const ATTR_tokens: &str = "tokens";
    pub const ATTR_netcounter: &str = "net_counter";
    pub const ATTR_umask: &str = "umask";
    pub const ATTR_start_time: &str = "start_time";
    pub const ATTR_start_count: &str = "start_count";
    pub const ATTR_checkpoint_dir: &str = "checkpoint_dir";
    pub const ATTR_checkpoint_name: &str = "checkpoint_name";
    pub const ATTR_checkpoint_time: &str = "checkpoint_time";
    pub const ATTR_checkpoint_restart_status: &str = "checkpoint_restart_status";
    pub const ATTR_restart_name: &str = "restart_name";
    pub const ATTR_comp_time: &str = "comp_time";
    pub const ATTR_reported: &str = "reported";
    pub const ATTR_intcmd: &str = "inter_cmd";
    pub const ATTR_P: &str = "proxy_user";
    pub const ATTR_node_exclusive: &str = "node_exclusive";
    pub const ATTR_exec_gpus: &str = "exec_gpus";
    pub const ATTR_J: &str = "job_radix";
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_raw_values_match_batch_op() {
        assert_eq!(Operator::Set.to_raw(), 0);
        assert_eq!(Operator::Eq.to_raw(), 4);
        assert_eq!(Operator::IncrOld.to_raw(), 12);

        for raw in 0..13 {
            assert_eq!(Operator::from_raw(raw).map(Operator::to_raw), Some(raw));
        }

        assert_eq!(Operator::from_raw(13), None);
    }

    #[test]
    fn queue_attribute_names() {
        assert_eq!(names::ATTR_qtype, "queue_type");
        assert_eq!(names::ATTR_count, "state_count");
        assert_eq!(names::ATTR_enable, "enabled");
        assert_eq!(names::ATTR_start, "started");
    }

    #[test]
    fn lookup_distinguishes_resources() {
        let attrs: AttributeList = vec![
            Attribute::new(names::ATTR_l, "ignored").with_resource("walltime"),
            Attribute::new(names::ATTR_N, "sleeper"),
            Attribute::new(names::ATTR_l, "2").with_resource("nodes"),
        ].into();

        assert_eq!(attrs.get(names::ATTR_N), Some("sleeper"));
        assert_eq!(attrs.get(names::ATTR_l), None);
        assert_eq!(attrs.get_resource(names::ATTR_l, "nodes"), Some("2"));
        assert_eq!(attrs.get_resource(names::ATTR_N, "nodes"), None);
    }

    #[test]
    fn display_shows_resource_index() {
        let a = Attribute::new("Resource_List", "1:ppn=4").with_resource("nodes");
        assert_eq!(a.to_string(), "Resource_List.nodes = 1:ppn=4");
    }
}
