//! Shared helpers for query log integration tests

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;

use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};

use quell_core::{FilterResult, Reason, ResultRule};
use quell_querylog::{AddParams, QueryLog, QueryLogConfig, QueryLogSettings, SearchResult};

/// Settings for a log in `dir` that never rotates on its own during a test
pub fn settings(dir: &Path, file_enabled: bool, size_memory: usize) -> QueryLogSettings {
    QueryLogSettings {
        file_enabled,
        size_memory,
        dir: dir.to_path_buf(),
        ..Default::default()
    }
}

pub fn config(dir: &Path, file_enabled: bool, size_memory: usize) -> QueryLogConfig {
    settings(dir, file_enabled, size_memory).validate().unwrap()
}

pub async fn open(dir: &Path, file_enabled: bool, size_memory: usize) -> QueryLog {
    QueryLog::open(config(dir, file_enabled, size_memory)).await.unwrap()
}

/// An A query for `host` from `client`, answered with `answer`
pub fn params(host: &str, answer: Ipv4Addr, client: Ipv4Addr) -> AddParams {
    let name = Name::from_str(&format!("{host}.")).unwrap();
    let question = Query::query(name.clone(), RecordType::A);

    let mut msg = Message::new();
    msg.set_message_type(MessageType::Response);
    msg.add_query(question.clone());
    msg.add_answer(Record::from_rdata(name, 300, RData::A(A::from(answer))));

    let result = FilterResult::filtered(Reason::Rewritten)
        .with_rule(ResultRule::new(1, "SomeRule"))
        .with_service("SomeService");

    AddParams::new(question, IpAddr::V4(client))
        .with_answer(msg.clone())
        .with_orig_answer(msg)
        .with_result(result)
        .with_upstream("upstream")
}

/// Numbered record: host `host{n}.example`, answer 1.1.1.n, client 2.2.2.n
pub fn numbered(n: u8) -> AddParams {
    params(
        &format!("host{n}.example"),
        Ipv4Addr::new(1, 1, 1, n),
        Ipv4Addr::new(2, 2, 2, n),
    )
}

pub fn hosts(result: &SearchResult) -> Vec<String> {
    result.entries.iter().map(|e| e.qhost.clone()).collect()
}

pub fn clients(result: &SearchResult) -> Vec<String> {
    result.entries.iter().map(|e| e.client_ip.to_string()).collect()
}

/// First answer record of an entry's final answer, in presentation format
pub fn first_answer(entry: &quell_querylog::LogEntry) -> Option<String> {
    let msg = entry.answer_message()?.ok()?;
    msg.answers().first().map(|r| r.to_string())
}
