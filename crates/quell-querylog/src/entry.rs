//! Query log entries and their persisted form
//!
//! A [`LogEntry`] is built once from the [`AddParams`] of a resolved query and
//! never changes afterwards. On disk every entry is one JSON object on its own
//! line; DNS messages are kept as base64 of their exact wire bytes so the
//! original answer can be rebuilt byte-for-byte.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hickory_proto::op::{Message, Query};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use serde::{Deserialize, Serialize};

use quell_core::{ClientProto, FilterResult};

use crate::error::{QueryLogError, QueryLogResult};
use crate::ignore::normalize;

/// A resolved query handed to the query log by the resolution pipeline
#[derive(Debug, Clone)]
pub struct AddParams {
    /// The question that was asked
    pub question: Query,
    /// Final answer sent to the client
    pub answer: Option<Message>,
    /// Answer as received before any rewrite
    pub orig_answer: Option<Message>,
    /// Filtering decision for the query
    pub result: Option<FilterResult>,
    /// Upstream resolver that answered
    pub upstream: Option<String>,
    /// Client address
    pub client_ip: IpAddr,
    /// Client identifier from an encrypted transport
    pub client_id: Option<String>,
    /// Transport the client used
    pub client_proto: ClientProto,
    /// Time spent resolving
    pub elapsed: Duration,
    /// Whether the answer came from cache
    pub cached: bool,
}

impl AddParams {
    /// Create params for a question from a client
    pub fn new(question: Query, client_ip: IpAddr) -> Self {
        Self {
            question,
            answer: None,
            orig_answer: None,
            result: None,
            upstream: None,
            client_ip,
            client_id: None,
            client_proto: ClientProto::Plain,
            elapsed: Duration::ZERO,
            cached: false,
        }
    }

    pub fn with_answer(mut self, answer: Message) -> Self {
        self.answer = Some(answer);
        self
    }

    pub fn with_orig_answer(mut self, orig_answer: Message) -> Self {
        self.orig_answer = Some(orig_answer);
        self
    }

    pub fn with_result(mut self, result: FilterResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_client_proto(mut self, proto: ClientProto) -> Self {
        self.client_proto = proto;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

/// A single recorded query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the query was recorded
    #[serde(rename = "t")]
    pub time: DateTime<Utc>,
    /// Client address, possibly anonymized
    #[serde(rename = "ip")]
    pub client_ip: IpAddr,
    /// Client identifier from an encrypted transport
    #[serde(rename = "cid", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Transport the client used
    #[serde(rename = "cp", default)]
    pub client_proto: ClientProto,
    /// Queried host, lower-cased without the trailing dot
    #[serde(rename = "qh")]
    pub qhost: String,
    /// Query type, e.g. `A`
    #[serde(rename = "qt")]
    pub qtype: String,
    /// Query class, e.g. `IN`
    #[serde(rename = "qc")]
    pub qclass: String,
    /// Wire bytes of the final answer
    #[serde(rename = "ans", default, with = "wire", skip_serializing_if = "Option::is_none")]
    pub answer: Option<Bytes>,
    /// Wire bytes of the answer before rewriting
    #[serde(rename = "orig", default, with = "wire", skip_serializing_if = "Option::is_none")]
    pub orig_answer: Option<Bytes>,
    /// Upstream resolver that answered
    #[serde(rename = "up", default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Filtering decision
    #[serde(rename = "res", default)]
    pub result: FilterResult,
    /// Time spent resolving
    #[serde(rename = "el", default)]
    pub elapsed: Duration,
    /// Whether the answer came from cache
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl LogEntry {
    /// Build an entry from a resolved query
    ///
    /// Fails only if one of the DNS messages cannot be serialized.
    pub fn from_params(params: AddParams, anonymize_client_ip: bool) -> QueryLogResult<Self> {
        let question = &params.question;
        let client_ip = if anonymize_client_ip {
            anonymize_ip(params.client_ip)
        } else {
            params.client_ip
        };

        Ok(Self {
            time: Utc::now(),
            client_ip,
            client_id: params.client_id,
            client_proto: params.client_proto,
            qhost: normalize(&question.name().to_ascii()),
            qtype: question.query_type().to_string(),
            qclass: question.query_class().to_string(),
            answer: pack(params.answer.as_ref())?,
            orig_answer: pack(params.orig_answer.as_ref())?,
            upstream: params.upstream,
            result: params.result.unwrap_or_default(),
            elapsed: params.elapsed,
            cached: params.cached,
        })
    }

    /// Serialize to one newline-terminated line
    pub fn encode_line(&self) -> QueryLogResult<Vec<u8>> {
        let mut line =
            serde_json::to_vec(self).map_err(|e| QueryLogError::encode(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parse one line, with or without its terminator
    pub fn decode_line(line: &[u8]) -> QueryLogResult<Self> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        serde_json::from_slice(line).map_err(|e| QueryLogError::decode(e.to_string()))
    }

    /// Rebuild the final answer message
    pub fn answer_message(&self) -> Option<QueryLogResult<Message>> {
        self.answer.as_deref().map(unpack)
    }

    /// Rebuild the answer message as it was before rewriting
    pub fn orig_answer_message(&self) -> Option<QueryLogResult<Message>> {
        self.orig_answer.as_deref().map(unpack)
    }
}

/// Mask the host part of a client address
///
/// IPv4 addresses keep their /24 prefix and IPv6 addresses their /48 prefix.
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            IpAddr::V4(Ipv4Addr::new(a, b, c, 0))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            octets[6..].fill(0);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    }
}

fn pack(msg: Option<&Message>) -> QueryLogResult<Option<Bytes>> {
    msg.map(|m| {
        m.to_bytes()
            .map(Bytes::from)
            .map_err(|e| QueryLogError::encode(format!("packing DNS message: {e}")))
    })
    .transpose()
}

fn unpack(bytes: &[u8]) -> QueryLogResult<Message> {
    Message::from_bytes(bytes).map_err(|e| QueryLogError::decode(format!("unpacking DNS message: {e}")))
}

/// Base64 representation of DNS wire bytes
mod wire {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| {
                STANDARD
                    .decode(s)
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
