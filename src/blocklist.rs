// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! DNS blocklist (DNSBL) reputation lookups.
//!
//! A client address is checked by querying `A` records for the reversed
//! address under the blocklist zone, e.g. `4.3.2.1.all.s5h.net` for
//! `1.2.3.4`. NXDOMAIN means not listed. Any `A` answer means listed, in
//! which case the `TXT` record under the same name is fetched for the reason.
//! Queries go straight to a recursive resolver over UDP.

use crate::config::BlocklistConfig;
use async_trait::async_trait;
use hickory_proto::error::ProtoError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

/// Outcome of a blocklist lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// Address is not listed
    Pass,
    /// Address is listed
    Fail,
    /// The lookup itself failed
    Error,
}

/// Lookup verdict with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub status: LookupStatus,
    pub reason: String,
}

impl Lookup {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            status: LookupStatus::Pass,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: LookupStatus::Fail,
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: LookupStatus::Error,
            reason: reason.into(),
        }
    }
}

/// An external reputation service consulted per client address.
#[async_trait]
pub trait BlocklistOracle: Send + Sync {
    async fn lookup(&self, client_ip: &str) -> Lookup;
}

/// Oracle used when blocklist checks are turned off.
pub struct DisabledOracle;

#[async_trait]
impl BlocklistOracle for DisabledOracle {
    async fn lookup(&self, _client_ip: &str) -> Lookup {
        Lookup::pass("blocklist disabled")
    }
}

/// Blocklist lookup errors.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("not an IP address: {0}")]
    InvalidAddress(String),

    #[error("DNS protocol error: {0}")]
    Proto(#[from] ProtoError),

    #[error("DNS transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DNS query timed out after {0:?}")]
    Timeout(Duration),

    #[error("DNS server answered {0}")]
    ServerFailure(ResponseCode),
}

/// DNSBL oracle speaking raw DNS over UDP.
pub struct DnsblOracle {
    zone: String,
    resolver: SocketAddr,
    timeout: Duration,
}

impl DnsblOracle {
    pub fn new(config: &BlocklistConfig) -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            zone: config.zone.trim_end_matches('.').to_string(),
            resolver: config.resolver.parse()?,
            timeout: config.timeout(),
        })
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    async fn check(&self, client_ip: &str) -> Result<Lookup, LookupError> {
        let ip: IpAddr = client_ip
            .trim()
            .parse()
            .map_err(|_| LookupError::InvalidAddress(client_ip.to_string()))?;
        let name = Name::from_ascii(format!("{}.{}.", reverse_labels(ip), self.zone))?;

        let response = self.query(&name, RecordType::A).await?;
        if !is_listed(&response)? {
            return Ok(Lookup::pass(format!("not listed in {}", self.zone)));
        }

        // The reason is best-effort; a listing stands without it.
        let reason = match self.query(&name, RecordType::TXT).await {
            Ok(txt) => txt_reason(&txt),
            Err(e) => {
                debug!(%ip, error = %e, "DNSBL TXT lookup failed");
                None
            }
        };
        Ok(Lookup::fail(
            reason.unwrap_or_else(|| format!("listed in {}", self.zone)),
        ))
    }

    async fn query(&self, name: &Name, record_type: RecordType) -> Result<Message, LookupError> {
        let id: u16 = rand::random();
        let mut request = Message::new();
        request
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(name.clone(), record_type));
        let wire = request.to_bytes()?;

        let bind_addr = if self.resolver.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.resolver).await?;
        socket.send(&wire).await?;

        let mut buf = vec![0u8; 4096];
        tokio::time::timeout(self.timeout, async {
            loop {
                let len = socket.recv(&mut buf).await?;
                let response = Message::from_bytes(&buf[..len])?;
                // Stray datagrams for other queries are dropped
                if response.id() == id && response.message_type() == MessageType::Response {
                    return Ok::<_, LookupError>(response);
                }
            }
        })
        .await
        .map_err(|_| LookupError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl BlocklistOracle for DnsblOracle {
    async fn lookup(&self, client_ip: &str) -> Lookup {
        match self.check(client_ip).await {
            Ok(lookup) => lookup,
            Err(e) => Lookup::error(e.to_string()),
        }
    }
}

/// Reverse an address into DNSBL label order.
///
/// IPv4 reverses the octets; IPv6 reverses all 32 nibbles.
pub fn reverse_labels(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}")
        }
        IpAddr::V6(v6) => v6
            .octets()
            .iter()
            .rev()
            .flat_map(|byte| [byte & 0x0f, byte >> 4])
            .map(|nibble| format!("{nibble:x}"))
            .collect::<Vec<_>>()
            .join("."),
    }
}

/// Whether an `A` response lists the queried address.
fn is_listed(response: &Message) -> Result<bool, LookupError> {
    match response.response_code() {
        ResponseCode::NXDomain => Ok(false),
        ResponseCode::NoError => Ok(response
            .answers()
            .iter()
            .any(|record| matches!(record.data(), Some(RData::A(_))))),
        other => Err(LookupError::ServerFailure(other)),
    }
}

/// Join all TXT strings in a response into one reason.
fn txt_reason(response: &Message) -> Option<String> {
    let parts: Vec<String> = response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::TXT(txt)) => Some(
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect::<String>(),
            ),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
