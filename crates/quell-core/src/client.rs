//! Client transport protocol

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Transport a client used to send its query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientProto {
    /// Plain DNS over UDP or TCP
    #[default]
    Plain,
    /// DNS-over-HTTPS
    Doh,
    /// DNS-over-TLS
    Dot,
    /// DNS-over-QUIC
    Doq,
    /// DNSCrypt
    #[serde(rename = "dnscrypt")]
    DnsCrypt,
}

impl ClientProto {
    /// Stable textual name of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientProto::Plain => "plain",
            ClientProto::Doh => "doh",
            ClientProto::Dot => "dot",
            ClientProto::Doq => "doq",
            ClientProto::DnsCrypt => "dnscrypt",
        }
    }

    /// Whether the transport is encrypted
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, ClientProto::Plain)
    }
}

impl fmt::Display for ClientProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientProto {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "plain" => Ok(ClientProto::Plain),
            "doh" => Ok(ClientProto::Doh),
            "dot" => Ok(ClientProto::Dot),
            "doq" => Ok(ClientProto::Doq),
            "dnscrypt" => Ok(ClientProto::DnsCrypt),
            other => Err(CoreError::UnknownProto(other.to_string())),
        }
    }
}
