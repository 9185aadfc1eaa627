// src/server/protocol.rs

//! Wire types for the newline-delimited JSON protocol.
//!
//! ```text
//! -> {"seq": 1, "op": "spawn", "id": "build", "binary": "/bin/sh", "arguments": [["-c", "make"]]}
//! <- {"status": "ok", "seq": 1, "result": true}
//! -> {"seq": 2, "op": "get-output", "id": "nope"}
//! <- {"status": "not-found", "seq": 2}
//! <- {"event": "watch-dir-update", "path": "/src", "tree": {...}}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProchubError;
use crate::types::{GroupSnapshot, ListEntry};
use crate::watch::{DirNode, DirUpdate};

/// One operation requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    Spawn {
        id: String,
        binary: String,
        #[serde(default)]
        arguments: Vec<Vec<String>>,
    },
    List,
    Get {
        id: String,
    },
    #[serde(alias = "get-stdout")]
    GetOutput {
        id: String,
    },
    Kill {
        id: String,
    },
    WatchDir {
        path: PathBuf,
    },
    WatchDirClear {
        path: PathBuf,
    },
}

/// A request with the caller's correlation number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestEnvelope {
    pub seq: u64,
    #[serde(flatten)]
    pub request: Request,
}

/// A line that could not be decoded into a [`RequestEnvelope`].
#[derive(Debug)]
pub struct MalformedRequest {
    /// Recovered when the line was valid JSON with a numeric `seq`.
    pub seq: Option<u64>,
    pub error: ProchubError,
}

/// Decode one input line.
pub fn parse_request_line(line: &str) -> Result<RequestEnvelope, MalformedRequest> {
    let value: Value = serde_json::from_str(line).map_err(|err| MalformedRequest {
        seq: None,
        error: err.into(),
    })?;

    let seq = value.get("seq").and_then(Value::as_u64);
    serde_json::from_value(value).map_err(|err| MalformedRequest {
        seq,
        error: err.into(),
    })
}

/// Successful result payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Accepted(bool),
    Listing(Vec<ListEntry>),
    Group(GroupSnapshot),
    Output(Vec<String>),
}

/// Answer to exactly one request, matched by `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    Ok {
        seq: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Reply>,
    },
    NotFound {
        seq: Option<u64>,
    },
    Error {
        seq: Option<u64>,
        message: String,
    },
}

impl Response {
    pub fn ok(seq: u64, reply: Reply) -> Self {
        Response::Ok {
            seq: Some(seq),
            result: Some(reply),
        }
    }

    /// Success with no payload.
    pub fn ack(seq: u64) -> Self {
        Response::Ok {
            seq: Some(seq),
            result: None,
        }
    }

    pub fn not_found(seq: u64) -> Self {
        Response::NotFound { seq: Some(seq) }
    }

    pub fn error(seq: Option<u64>, err: &ProchubError) -> Self {
        Response::Error {
            seq,
            message: err.to_string(),
        }
    }
}

/// Unsolicited notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Push {
    WatchDirUpdate { path: String, tree: DirNode },
}

impl From<DirUpdate> for Push {
    fn from(update: DirUpdate) -> Self {
        Push::WatchDirUpdate {
            path: update.path.to_string_lossy().into_owned(),
            tree: update.tree,
        }
    }
}

/// Anything written to the output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Response(Response),
    Push(Push),
}
