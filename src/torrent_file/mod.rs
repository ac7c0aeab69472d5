// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod parser;

use serde::Deserialize;
use serde::Serialize;
use sha1::{Digest, Sha1};

pub const PIECE_HASH_LENGTH: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Torrent {
    // Not present in the bencode source; parser::from_bytes fills it in with
    // the canonical re-encoding of the 'info' dictionary.
    #[serde(skip)]
    pub info_dict_bencode: Vec<u8>,

    pub info: Info,
    pub announce: Option<String>,

    #[serde(rename = "announce-list", default)]
    pub announce_list: Option<Vec<Vec<String>>>,

    #[serde(rename = "creation date", default)]
    pub creation_date: Option<i64>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(rename = "created by", default)]
    pub created_by: Option<String>,

    #[serde(default)]
    pub encoding: Option<String>,
}

impl Torrent {
    /// SHA-1 of the canonical bencoding of the `info` dictionary. Identifies
    /// the torrent on the wire and toward trackers.
    pub fn info_hash(&self) -> [u8; PIECE_HASH_LENGTH] {
        Sha1::digest(&self.info_dict_bencode).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Info {
    #[serde(rename = "piece length")]
    pub piece_length: i64,

    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,

    #[serde(default)]
    pub private: Option<i64>,

    // Present for multi-file torrents, absent for single-file ones.
    #[serde(default)]
    pub files: Option<Vec<InfoFile>>,

    pub name: String,

    // The single-file counterpart of `files`.
    #[serde(default)]
    pub length: Option<i64>,

    #[serde(default)]
    pub md5sum: Option<String>,
}

impl Info {
    pub fn piece_count(&self) -> usize {
        self.pieces.len() / PIECE_HASH_LENGTH
    }

    /// The declared 20-byte SHA-1 digests, one per piece, in index order.
    pub fn piece_hashes(&self) -> impl Iterator<Item = &[u8]> {
        self.pieces.chunks_exact(PIECE_HASH_LENGTH)
    }

    /// Sum of the declared byte lengths of all logical files. Only meaningful
    /// once the layout planner has validated the lengths as non-negative.
    pub fn total_size(&self) -> u64 {
        match &self.files {
            Some(files) => files.iter().map(|f| f.length.max(0) as u64).sum(),
            None => self.length.unwrap_or(0).max(0) as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfoFile {
    pub length: i64,
    #[serde(default)]
    pub md5sum: Option<String>,
    // A relative path, one component per list entry.
    pub path: Vec<String>,
}
