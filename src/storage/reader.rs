// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::{self, try_exists, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::errors::StorageError;
use crate::storage::mapping::{PieceMapping, PieceSegment};

/// Reads one full piece, segment by segment. Each segment comes from its
/// scratch file while that file exists and from the embedded location in the
/// final file afterwards. Scratch wins the tie during a merge: a dependency
/// is only unlinked after its bytes are durably appended, so whichever source
/// the existence probe selects holds the piece's bytes.
pub async fn read_piece(mapping: &PieceMapping, index: u32) -> Result<Vec<u8>, StorageError> {
    let segments = mapping
        .segments(index)
        .ok_or(StorageError::UnknownPiece(index))?;

    let mut piece = Vec::with_capacity(mapping.piece_len(index) as usize);
    for segment in segments {
        read_segment(index, segment, &mut piece).await?;
    }
    Ok(piece)
}

/// Resolves a block request against a piece. The whole piece is read and the
/// requested window sliced out of it.
pub async fn read_block(
    mapping: &PieceMapping,
    piece: u32,
    offset: u32,
    length: u32,
) -> Result<Vec<u8>, StorageError> {
    if (piece as usize) >= mapping.piece_count() {
        return Err(StorageError::UnknownPiece(piece));
    }
    let end = u64::from(offset) + u64::from(length);
    if end > mapping.piece_len(piece) {
        return Err(StorageError::BlockOutOfBounds {
            piece,
            offset,
            length,
        });
    }

    let bytes = read_piece(mapping, piece).await?;
    Ok(bytes[offset as usize..end as usize].to_vec())
}

async fn read_segment(
    index: u32,
    segment: &PieceSegment,
    piece: &mut Vec<u8>,
) -> Result<(), StorageError> {
    if probe(&segment.scratch).await? {
        let bytes = fs::read(&segment.scratch)
            .await
            .map_err(|source| StorageError::Read {
                path: segment.scratch.clone(),
                source,
            })?;
        piece.extend_from_slice(&bytes);
        return Ok(());
    }

    let embedded = &segment.embedded;
    if !probe(&embedded.path).await? {
        return Err(StorageError::MissingPieceData {
            piece: index,
            path: segment.scratch.clone(),
        });
    }

    let mut file = File::open(&embedded.path)
        .await
        .map_err(|source| StorageError::Read {
            path: embedded.path.clone(),
            source,
        })?;
    file.seek(SeekFrom::Start(embedded.offset))
        .await
        .map_err(|source| StorageError::Read {
            path: embedded.path.clone(),
            source,
        })?;

    let mut buffer = vec![0u8; embedded.length as usize];
    file.read_exact(&mut buffer)
        .await
        .map_err(|source| StorageError::Read {
            path: embedded.path.clone(),
            source,
        })?;
    piece.extend_from_slice(&buffer);
    Ok(())
}

async fn probe(path: &Path) -> Result<bool, StorageError> {
    try_exists(path).await.map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })
}
