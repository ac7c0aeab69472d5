// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;

use tokio::fs::{self, try_exists, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{event, Level};

use crate::errors::StorageError;
use crate::storage::layout::{FileStructure, MergePlan, SplitPiece, StoragePlan};

/// Writes a batch of verified pieces into their scratch locations, then
/// assembles every final file whose scratch dependencies are all present.
///
/// Replaying pieces that were already merged away is harmless: a scratch
/// write is skipped when the scratch file is gone and its owning final file
/// is fully assembled.
pub async fn write_batch(
    plan: &StoragePlan,
    pieces: &[(u32, Vec<u8>)],
) -> Result<(), StorageError> {
    for (index, bytes) in pieces {
        write_piece(plan, *index, bytes).await?;
    }
    merge_completed(plan).await
}

async fn write_piece(plan: &StoragePlan, index: u32, bytes: &[u8]) -> Result<(), StorageError> {
    let slot = index as usize;
    if slot >= plan.geometry.piece_count() {
        return Err(StorageError::UnknownPiece(index));
    }
    let expected = plan.geometry.piece_len(index);
    if bytes.len() as u64 != expected {
        return Err(StorageError::PieceLengthMismatch {
            piece: index,
            expected,
            actual: bytes.len(),
        });
    }

    match &plan.structure {
        FileStructure::Simple { scratch, .. } => {
            write_scratch(&plan.merges, &scratch[slot], bytes).await
        }
        FileStructure::Multi { splits, .. } => match &splits[slot] {
            SplitPiece::Normal(path) => write_scratch(&plan.merges, path, bytes).await,
            SplitPiece::Straddling {
                prefix_len,
                front,
                back,
            } => {
                let (head, tail) = bytes.split_at(*prefix_len as usize);
                write_scratch(&plan.merges, front, head).await?;
                write_scratch(&plan.merges, back, tail).await
            }
        },
    }
}

/// Whole-file overwrite of one scratch file, creating its directory on
/// demand. Skips the write when the scratch is gone because its final file
/// was already assembled.
async fn write_scratch(
    merges: &[MergePlan],
    path: &Path,
    bytes: &[u8],
) -> Result<(), StorageError> {
    if !probe(path).await? {
        if let Some(owner) = merges.iter().find(|m| m.deps.iter().any(|d| d == path)) {
            if is_merged(owner).await? {
                event!(
                    Level::DEBUG,
                    path = ?path,
                    "scratch already merged into its final file, skipping rewrite"
                );
                return Ok(());
            }
        }
        if let Some(parent) = path.parent() {
            if !probe(parent).await? {
                fs::create_dir_all(parent).await.map_err(|source| {
                    StorageError::Write {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }
    }

    fs::write(path, bytes).await.map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// A final file counts as merged once it exists and every one of its scratch
/// dependencies has been unlinked.
async fn is_merged(merge: &MergePlan) -> Result<bool, StorageError> {
    if !probe(&merge.target).await? {
        return Ok(false);
    }
    for dep in &merge.deps {
        if probe(dep).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The merge sweep. Every final file whose dependencies are all on disk is
/// assembled by appending them in declared order; each dependency is synced
/// before it is unlinked, so a reader that no longer finds a scratch file is
/// guaranteed to find its bytes at the embedded location.
async fn merge_completed(plan: &StoragePlan) -> Result<(), StorageError> {
    for merge in &plan.merges {
        if merge.deps.is_empty() {
            // Zero-length file: nothing to append, just materialize it once.
            if !probe(&merge.target).await? {
                touch(&merge.target).await?;
            }
            continue;
        }

        let mut ready = true;
        for dep in &merge.deps {
            if !probe(dep).await? {
                ready = false;
                break;
            }
        }
        if !ready {
            continue;
        }

        event!(
            Level::INFO,
            target = ?merge.target,
            deps = merge.deps.len(),
            "assembling final file from scratch pieces"
        );

        if let Some(parent) = merge.target.parent() {
            if !probe(parent).await? {
                fs::create_dir_all(parent).await.map_err(|source| {
                    StorageError::Write {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let mut output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&merge.target)
            .await
            .map_err(|source| StorageError::Write {
                path: merge.target.clone(),
                source,
            })?;

        for dep in &merge.deps {
            let bytes = fs::read(dep).await.map_err(|source| StorageError::Read {
                path: dep.clone(),
                source,
            })?;
            output
                .write_all(&bytes)
                .await
                .map_err(|source| StorageError::Write {
                    path: merge.target.clone(),
                    source,
                })?;
            output
                .sync_data()
                .await
                .map_err(|source| StorageError::Write {
                    path: merge.target.clone(),
                    source,
                })?;
            fs::remove_file(dep).await.map_err(|source| StorageError::Unlink {
                path: dep.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

async fn probe(path: &Path) -> Result<bool, StorageError> {
    try_exists(path).await.map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn touch(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !probe(parent).await? {
            fs::create_dir_all(parent).await.map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    fs::write(path, b"").await.map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::layout::StoragePlan;
    use crate::torrent_file::{Info, InfoFile, PIECE_HASH_LENGTH};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn single_info(name: &str, length: i64, piece_length: i64) -> Info {
        let pieces = (length as u64).div_ceil(piece_length as u64) as usize;
        Info {
            piece_length,
            pieces: vec![0; pieces * PIECE_HASH_LENGTH],
            private: None,
            files: None,
            name: name.to_string(),
            length: Some(length),
            md5sum: None,
        }
    }

    fn multi_info(name: &str, lengths: &[(&str, i64)], piece_length: i64) -> Info {
        let total: i64 = lengths.iter().map(|(_, len)| *len).sum();
        let pieces = (total as u64).div_ceil(piece_length as u64) as usize;
        Info {
            piece_length,
            pieces: vec![0; pieces * PIECE_HASH_LENGTH],
            private: None,
            files: Some(
                lengths
                    .iter()
                    .map(|(path, length)| InfoFile {
                        length: *length,
                        md5sum: None,
                        path: vec![path.to_string()],
                    })
                    .collect(),
            ),
            name: name.to_string(),
            length: None,
            md5sum: None,
        }
    }

    fn all_scratch_paths(plan: &StoragePlan) -> Vec<PathBuf> {
        plan.merges
            .iter()
            .flat_map(|merge| merge.deps.iter().cloned())
            .collect()
    }

    fn assert_no_scratch_left(plan: &StoragePlan) {
        for path in all_scratch_paths(plan) {
            assert!(!path.exists(), "scratch file {path:?} survived the merge");
        }
    }

    #[tokio::test]
    async fn single_file_single_piece_assembles_immediately() {
        let root = tempdir().unwrap();
        let plan = StoragePlan::new(root.path(), &single_info("hello.txt", 5, 16384)).unwrap();

        write_batch(&plan, &[(0, b"HELLO".to_vec())]).await.unwrap();

        let content = std::fs::read(root.path().join("hello.txt")).unwrap();
        assert_eq!(content, b"HELLO");
        assert_no_scratch_left(&plan);
    }

    #[tokio::test]
    async fn out_of_order_batches_merge_only_when_complete() {
        let root = tempdir().unwrap();
        let plan = StoragePlan::new(root.path(), &single_info("data.bin", 10, 4)).unwrap();
        let final_path = root.path().join("data.bin");

        write_batch(&plan, &[(2, b"IJ".to_vec())]).await.unwrap();
        assert!(!final_path.exists());
        assert!(root.path().join("piece-2.bin").exists());

        write_batch(&plan, &[(0, b"ABCD".to_vec())]).await.unwrap();
        assert!(!final_path.exists());

        write_batch(&plan, &[(1, b"EFGH".to_vec())]).await.unwrap();
        let content = std::fs::read(&final_path).unwrap();
        assert_eq!(content, b"ABCDEFGHIJ");
        assert_no_scratch_left(&plan);
    }

    #[tokio::test]
    async fn straddling_piece_splits_across_both_files() {
        let root = tempdir().unwrap();
        let info = multi_info("pair", &[("a.txt", 3), ("b.txt", 5)], 4);
        let plan = StoragePlan::new(root.path(), &info).unwrap();
        let content = root.path().join("pair");

        write_batch(&plan, &[(0, b"AAAB".to_vec()), (1, b"BBBB".to_vec())])
            .await
            .unwrap();

        assert_eq!(std::fs::read(content.join("a.txt")).unwrap(), b"AAA");
        assert_eq!(std::fs::read(content.join("b.txt")).unwrap(), b"BBBBB");
        assert_no_scratch_left(&plan);
    }

    #[tokio::test]
    async fn any_delivery_order_yields_the_same_files() {
        let expected_a = b"AAAAA".to_vec();
        let expected_b = b"BBB".to_vec();
        // total 8 bytes, piece length 4: piece 1 straddles a/b.
        let pieces: Vec<(u32, Vec<u8>)> = vec![
            (0, b"AAAA".to_vec()),
            (1, b"ABBB".to_vec()),
        ];

        for order in [vec![0usize, 1], vec![1, 0]] {
            let root = tempdir().unwrap();
            let info = multi_info("pair", &[("a.bin", 5), ("b.bin", 3)], 4);
            let plan = StoragePlan::new(root.path(), &info).unwrap();
            let content = root.path().join("pair");

            for slot in order {
                write_batch(&plan, &[pieces[slot].clone()]).await.unwrap();
            }

            assert_eq!(std::fs::read(content.join("a.bin")).unwrap(), expected_a);
            assert_eq!(std::fs::read(content.join("b.bin")).unwrap(), expected_b);
            assert_no_scratch_left(&plan);
        }
    }

    #[tokio::test]
    async fn replaying_merged_pieces_leaves_final_files_unchanged() {
        let root = tempdir().unwrap();
        let plan = StoragePlan::new(root.path(), &single_info("data.bin", 10, 4)).unwrap();
        let final_path = root.path().join("data.bin");
        let pieces = vec![
            (0u32, b"ABCD".to_vec()),
            (1u32, b"EFGH".to_vec()),
            (2u32, b"IJ".to_vec()),
        ];

        write_batch(&plan, &pieces).await.unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"ABCDEFGHIJ");

        // Full replay, then a partial one.
        write_batch(&plan, &pieces).await.unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"ABCDEFGHIJ");

        write_batch(&plan, &pieces[1..2]).await.unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"ABCDEFGHIJ");
        assert_no_scratch_left(&plan);
    }

    #[tokio::test]
    async fn short_straddling_last_piece_round_trips() {
        let root = tempdir().unwrap();
        let info = multi_info("pair", &[("a.bin", 3), ("b.bin", 2)], 8);
        let plan = StoragePlan::new(root.path(), &info).unwrap();
        let content = root.path().join("pair");

        write_batch(&plan, &[(0, b"AAABB".to_vec())]).await.unwrap();

        assert_eq!(std::fs::read(content.join("a.bin")).unwrap(), b"AAA");
        assert_eq!(std::fs::read(content.join("b.bin")).unwrap(), b"BB");
        assert_no_scratch_left(&plan);
    }

    #[tokio::test]
    async fn rejects_pieces_with_the_wrong_length() {
        let root = tempdir().unwrap();
        let plan = StoragePlan::new(root.path(), &single_info("data.bin", 10, 4)).unwrap();

        let result = write_batch(&plan, &[(0, b"ABC".to_vec())]).await;
        assert!(matches!(
            result,
            Err(StorageError::PieceLengthMismatch { piece: 0, .. })
        ));

        let result = write_batch(&plan, &[(9, b"ABCD".to_vec())]).await;
        assert!(matches!(result, Err(StorageError::UnknownPiece(9))));
    }

    #[tokio::test]
    async fn scratch_files_for_nested_targets_get_their_directories() {
        let root = tempdir().unwrap();
        let info = Info {
            piece_length: 4,
            pieces: vec![0; PIECE_HASH_LENGTH],
            private: None,
            files: Some(vec![InfoFile {
                length: 4,
                md5sum: None,
                path: vec!["sub".to_string(), "deep.bin".to_string()],
            }]),
            name: "nested".to_string(),
            length: None,
            md5sum: None,
        };
        let plan = StoragePlan::new(root.path(), &info).unwrap();

        write_batch(&plan, &[(0, b"DATA".to_vec())]).await.unwrap();

        let target = root.path().join("nested").join("sub").join("deep.bin");
        assert_eq!(std::fs::read(target).unwrap(), b"DATA");
        assert_no_scratch_left(&plan);
    }
}
