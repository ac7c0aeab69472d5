// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashSet;
use std::net::Ipv4Addr;

use rand::Rng;
use reqwest::Client;
use serde_bencode::from_bytes;
use tracing::{event, Level};

use crate::errors::TrackerError;
use crate::tracker::{AnnounceRequest, Peer, Peers, RawTrackerResponse, TrackerResponse};

const PEER_ID_PREFIX: &str = "-PK0100-";
const PEER_ID_RANDOM_LEN: usize = 12;

/// Performs one HTTP announce round-trip.
pub async fn announce(request: &AnnounceRequest) -> Result<TrackerResponse, TrackerError> {
    event!(
        Level::DEBUG,
        info_hash = %hex::encode(request.info_hash),
        url = %request.announce_url,
        "announcing to tracker"
    );
    let link = build_announce_url(request);
    let client = Client::builder().build()?;
    let body = client.get(link).send().await?.bytes().await?;
    parse_response(&body)
}

fn build_announce_url(request: &AnnounceRequest) -> String {
    let mut link = format!(
        "{}?info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
        request.announce_url,
        encode_query_bytes(&request.info_hash),
        encode_query_bytes(request.peer_id.as_bytes()),
        request.port,
        request.uploaded,
        request.downloaded,
        request.left,
    );

    if let Some(numwant) = request.numwant {
        link.push_str(&format!("&numwant={}", numwant));
    }
    if let Some(event) = request.event {
        link.push_str(&format!("&event={}", event));
    }
    if let Some(ref tracker_id) = request.tracker_id {
        link.push_str(&format!("&trackerid={}", encode_query_bytes(tracker_id.as_bytes())));
    }

    link
}

fn parse_response(body: &[u8]) -> Result<TrackerResponse, TrackerError> {
    let raw: RawTrackerResponse = from_bytes(body)?;

    if let Some(reason) = raw.failure_reason {
        return Err(TrackerError::Tracker(reason));
    }

    let peers = match raw.peers {
        Some(Peers::Compact(bytes)) => bytes
            .chunks_exact(6)
            .map(|chunk| {
                let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
                let port = u16::from_be_bytes([chunk[4], chunk[5]]);
                Peer {
                    peer_id: Vec::new(), // Not available in compact form
                    ip: ip.to_string(),
                    port,
                }
            })
            .collect(),
        Some(Peers::Dicts(dicts)) => dicts
            .into_iter()
            .map(|d| Peer {
                peer_id: d.peer_id,
                ip: d.ip,
                port: d.port,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(TrackerResponse {
        warning_message: raw.warning_message,
        interval: raw.interval,
        min_interval: raw.min_interval,
        tracker_id: raw.tracker_id,
        complete: raw.complete,
        incomplete: raw.incomplete,
        peers,
    })
}

/// Percent-encodes everything outside the RFC 3986 unreserved set, byte by
/// byte. Binary values like the info-hash need this form, not UTF-8 escaping.
fn encode_query_bytes(param: &[u8]) -> String {
    let allowed_chars: HashSet<u8> =
        "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-_~"
            .bytes()
            .collect();

    param
        .iter()
        .map(|&byte| {
            if allowed_chars.contains(&byte) {
                return String::from(byte as char);
            }
            format!("%{:02X}", &byte)
        })
        .collect()
}

/// Azureus-style peer id: client prefix plus random alphanumeric tail.
pub fn generate_peer_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let mut rng = rand::thread_rng();
    let random_chars: String = (0..PEER_ID_RANDOM_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{}{}", PEER_ID_PREFIX, random_chars)
}
