//! Commands and replies
//!
//! Commands arrive from the replication layer as tagged payloads such as
//! `{"op":"move","shard":3,"gid":101}`. Only the four kinds below are
//! recognized; any other tag is an invalid operation.

use crate::config::{Config, Gid};
use crate::error::{ControllerError, Result};
use serde::de::value::MapAccessDeserializer;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A shard controller command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    /// Add groups (gid -> servers)
    Join { servers: BTreeMap<Gid, Vec<String>> },
    /// Remove groups
    Leave { gids: Vec<Gid> },
    /// Hand one shard to a group
    Move { shard: usize, gid: Gid },
    /// Fetch config `num`, or the latest if out of range
    Query { num: i64 },
}

/// Untyped command as read off the wire.
///
/// Deserialized as a plain struct so integer map keys decode the same way
/// in every format. Only read through [`RawOp::from_map`]: the derived impl
/// would also take a positional sequence, which carries no `op` tag.
#[derive(Debug, Default, Deserialize)]
struct RawOp {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    servers: Option<BTreeMap<Gid, Vec<String>>>,
    #[serde(default)]
    gids: Option<Vec<Gid>>,
    #[serde(default)]
    shard: Option<usize>,
    #[serde(default)]
    gid: Option<Gid>,
    #[serde(default)]
    num: Option<i64>,
}

impl RawOp {
    fn from_map<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RawOpVisitor)
    }
}

struct RawOpVisitor;

impl<'de> Visitor<'de> for RawOpVisitor {
    type Value = RawOp;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a command object")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<RawOp, A::Error> {
        RawOp::deserialize(MapAccessDeserializer::new(map))
    }
}

fn missing(kind: &str, field: &str) -> ControllerError {
    ControllerError::Codec(format!("{} command missing field '{}'", kind, field))
}

impl TryFrom<RawOp> for Op {
    type Error = ControllerError;

    fn try_from(raw: RawOp) -> Result<Self> {
        let kind = raw
            .op
            .ok_or_else(|| ControllerError::InvalidOperation("missing op tag".to_string()))?;

        match kind.as_str() {
            "join" => Ok(Op::Join {
                servers: raw.servers.ok_or_else(|| missing("join", "servers"))?,
            }),
            "leave" => Ok(Op::Leave {
                gids: raw.gids.ok_or_else(|| missing("leave", "gids"))?,
            }),
            "move" => Ok(Op::Move {
                shard: raw.shard.ok_or_else(|| missing("move", "shard"))?,
                gid: raw.gid.ok_or_else(|| missing("move", "gid"))?,
            }),
            "query" => Ok(Op::Query {
                num: raw.num.unwrap_or(-1),
            }),
            other => Err(ControllerError::InvalidOperation(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawOp::from_map(deserializer)?;
        Op::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl Op {
    /// Decode a JSON command payload.
    ///
    /// A payload that is not an object, or whose `op` tag is missing, not a
    /// string, or unrecognized, is an
    /// [`InvalidOperation`](ControllerError::InvalidOperation). Invalid JSON
    /// and malformed fields are a [`Codec`](ControllerError::Codec) error.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        let fields = value.as_object().ok_or_else(|| {
            ControllerError::InvalidOperation("command payload is not an object".to_string())
        })?;
        match fields.get("op") {
            None | Some(serde_json::Value::String(_)) => {}
            Some(tag) => {
                return Err(ControllerError::InvalidOperation(format!(
                    "op tag is not a string: {}",
                    tag
                )))
            }
        }

        let mut deserializer = serde_json::Deserializer::from_slice(payload);
        let raw = RawOp::from_map(&mut deserializer)?;
        Op::try_from(raw)
    }

    /// Encode as a JSON command payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Command kind name
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Join { .. } => "join",
            Op::Leave { .. } => "leave",
            Op::Move { .. } => "move",
            Op::Query { .. } => "query",
        }
    }

    /// Check if applying this command appends a configuration
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Op::Query { .. })
    }
}

/// Reply status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    InvalidOperation,
    ShardOutOfRange,
    UnknownGroup,
}

impl From<&ControllerError> for Status {
    fn from(err: &ControllerError) -> Self {
        match err {
            ControllerError::ShardOutOfRange { .. } => Status::ShardOutOfRange,
            ControllerError::UnknownGroup(_) => Status::UnknownGroup,
            ControllerError::InvalidOperation(_)
            | ControllerError::Codec(_)
            | ControllerError::Configuration(_) => Status::InvalidOperation,
        }
    }
}

/// Result of applying one command.
///
/// `config` is only meaningful for queries; every other command replies with
/// an empty configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub config: Config,
    pub status: Status,
}

impl Reply {
    /// Successful reply carrying a configuration
    pub fn ok(config: Config) -> Self {
        Self {
            config,
            status: Status::Ok,
        }
    }

    /// Successful reply with an empty configuration
    pub fn done() -> Self {
        Self::ok(Config::default())
    }

    /// Failed reply with an empty configuration
    pub fn failed(err: &ControllerError) -> Self {
        Self {
            config: Config::default(),
            status: Status::from(err),
        }
    }

    /// Check if the command succeeded
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
