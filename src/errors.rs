// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to parse bencoded torrent data")]
    Bencode(#[from] serde_bencode::Error),

    #[error("Missing 'info' dictionary in torrent file")]
    MissingInfoDict,
}

/// Rejections raised while planning the on-disk layout. All of these mean the
/// metadata itself is unusable; none of them involve disk state.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Piece length must be positive, got {0}")]
    NonPositivePieceLength(i64),

    #[error("Multi-file torrent declares no files")]
    EmptyFileList,

    #[error("File {path:?} declares a negative length ({length})")]
    NegativeFileLength { path: String, length: i64 },

    #[error("Piece hash blob is {byte_length} bytes, not a multiple of 20")]
    RaggedPieceHashes { byte_length: usize },

    #[error("Torrent carries {hashes} piece hashes but the declared sizes need {expected}")]
    PieceCountMismatch { hashes: usize, expected: usize },

    #[error("Unsafe path component {0:?} in file list")]
    UnsafePathComponent(String),

    #[error("File {path:?} is too short to complete the piece straddling into it")]
    UnsplittableStraddle { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path:?}")]
    Unlink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Piece {piece} has neither scratch nor merged bytes for {path:?}")]
    MissingPieceData { piece: u32, path: PathBuf },

    #[error("Piece index {0} is outside this torrent")]
    UnknownPiece(u32),

    #[error("Piece {piece} payload holds {actual} bytes, expected {expected}")]
    PieceLengthMismatch {
        piece: u32,
        expected: u64,
        actual: usize,
    },

    #[error("Block request exceeds piece bounds: piece {piece}, offset {offset}, length {length}")]
    BlockOutOfBounds { piece: u32, offset: u32, length: u32 },
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Request failed networking with tracker.")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse bencoded tracker response")]
    Bencode(#[from] serde_bencode::Error),

    #[error("Tracker returned a failure reason: {0}")]
    Tracker(String),
}
