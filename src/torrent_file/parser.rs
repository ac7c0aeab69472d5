// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use serde_bencode::de;
use serde_bencode::value::Value;

use crate::errors::MetadataError;
use crate::torrent_file::Torrent;

/// Decodes a `.torrent` file.
///
/// The data is walked twice: once as a generic bencode value so the raw
/// `info` dictionary can be pulled out and re-encoded on its own, and once
/// into the typed [`Torrent`] model. serde_bencode writes dictionary keys in
/// sorted order, so the re-encoding is canonical and safe to hash even when
/// the file on disk used a different key order.
pub fn from_bytes(bencode_data: &[u8]) -> Result<Torrent, MetadataError> {
    let document: Value = de::from_bytes(bencode_data)?;

    let info_value = match document {
        Value::Dict(mut entries) => entries
            .remove("info".as_bytes())
            .ok_or(MetadataError::MissingInfoDict)?,
        _ => return Err(MetadataError::MissingInfoDict),
    };
    let info_dict_bencode = serde_bencode::to_bytes(&info_value)?;

    let mut torrent: Torrent = de::from_bytes(bencode_data)?;
    torrent.info_dict_bencode = info_dict_bencode;

    Ok(torrent)
}
