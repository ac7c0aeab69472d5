// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod client;

use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    Started,
    Completed,
    Stopped,
}

impl fmt::Display for TrackerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerEvent::Started => write!(f, "started"),
            TrackerEvent::Completed => write!(f, "completed"),
            TrackerEvent::Stopped => write!(f, "stopped"),
        }
    }
}

/// One announce to an HTTP tracker. `left` is the byte count still missing;
/// trackers use it to tell leechers from seeders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub announce_url: String,
    pub info_hash: [u8; 20],
    pub peer_id: String,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub numwant: Option<u32>,
    pub event: Option<TrackerEvent>,
    pub tracker_id: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TrackerResponse {
    pub warning_message: Option<String>,
    pub interval: i64,
    pub min_interval: Option<i64>,
    pub tracker_id: Option<String>,
    pub complete: i64,
    pub incomplete: i64,
    pub peers: Vec<Peer>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Peer {
    pub peer_id: Vec<u8>,
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PeerDictModel {
    pub(crate) ip: String,
    pub(crate) port: u16,
    #[serde(rename = "peer id", default)]
    #[serde(with = "serde_bytes")]
    pub(crate) peer_id: Vec<u8>,
}

/// Trackers answer with either dictionary peers or the compact 6-byte form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Peers {
    Compact(#[serde(with = "serde_bytes")] Vec<u8>),
    Dicts(Vec<PeerDictModel>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTrackerResponse {
    #[serde(rename = "failure reason", default)]
    pub(crate) failure_reason: Option<String>,
    #[serde(rename = "warning message", default)]
    pub(crate) warning_message: Option<String>,
    #[serde(default)]
    pub(crate) interval: i64,
    #[serde(rename = "min interval", default)]
    pub(crate) min_interval: Option<i64>,
    #[serde(rename = "tracker id", default)]
    pub(crate) tracker_id: Option<String>,
    #[serde(default)]
    pub(crate) complete: i64,
    #[serde(default)]
    pub(crate) incomplete: i64,
    pub(crate) peers: Option<Peers>,
}
