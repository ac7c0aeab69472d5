// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use crate::errors::LayoutError;
use crate::torrent_file::{Info, InfoFile, PIECE_HASH_LENGTH};

/// Piece arithmetic for one torrent. Every piece is `piece_size` bytes long
/// except possibly the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceGeometry {
    pub piece_size: u64,
    pub total_size: u64,
}

impl PieceGeometry {
    pub fn piece_count(&self) -> usize {
        self.total_size.div_ceil(self.piece_size) as usize
    }

    pub fn piece_start(&self, index: u32) -> u64 {
        u64::from(index) * self.piece_size
    }

    /// Byte length of piece `index`. Callers must pass a valid index.
    pub fn piece_len(&self, index: u32) -> u64 {
        (self.total_size - self.piece_start(index)).min(self.piece_size)
    }
}

/// One logical file of the torrent, resolved to its on-disk destination.
/// `offset` is the file's starting position within the torrent's complete
/// data stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub path: PathBuf,
    pub length: u64,
    pub offset: u64,
}

/// Where one piece's bytes land while the piece is still scratch data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitPiece {
    /// The whole piece goes to a single scratch file.
    Normal(PathBuf),
    /// The piece crosses a file boundary: the first `prefix_len` bytes belong
    /// to the file ending inside the piece (`front`, a `.end` scratch), the
    /// rest to the file starting inside it (`back`, a `.start` scratch).
    Straddling {
        prefix_len: u64,
        front: PathBuf,
        back: PathBuf,
    },
}

/// A final file and the scratch files whose concatenation, in order, is
/// exactly its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub target: PathBuf,
    pub deps: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStructure {
    Simple {
        target: TargetFile,
        scratch: Vec<PathBuf>,
    },
    Multi {
        files: Vec<TargetFile>,
        splits: Vec<SplitPiece>,
    },
}

/// The immutable output of layout planning. Computed once from metadata and
/// never mutated; the filesystem is the only state that changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePlan {
    pub geometry: PieceGeometry,
    pub structure: FileStructure,
    pub merges: Vec<MergePlan>,
}

impl StoragePlan {
    /// Plans the on-disk layout for `info` under `root`.
    ///
    /// Single-file torrents put the file and its per-piece scratches directly
    /// in `root`; multi-file torrents mirror the declared tree under
    /// `root/<name>/`. Fails only on unusable metadata, never on disk state.
    pub fn new(root: &Path, info: &Info) -> Result<Self, LayoutError> {
        if info.piece_length <= 0 {
            return Err(LayoutError::NonPositivePieceLength(info.piece_length));
        }
        let piece_size = info.piece_length as u64;

        let plan = match &info.files {
            Some(files) => plan_multi(root, &info.name, files, piece_size)?,
            None => plan_single(root, &info.name, info.length.unwrap_or(0), piece_size)?,
        };

        if info.pieces.len() % PIECE_HASH_LENGTH != 0 {
            return Err(LayoutError::RaggedPieceHashes {
                byte_length: info.pieces.len(),
            });
        }
        if info.piece_count() != plan.geometry.piece_count() {
            return Err(LayoutError::PieceCountMismatch {
                hashes: info.piece_count(),
                expected: plan.geometry.piece_count(),
            });
        }

        Ok(plan)
    }

    pub fn piece_count(&self) -> usize {
        self.geometry.piece_count()
    }
}

fn piece_scratch(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("piece-{index}.bin"))
}

/// `<final file>.start` or `<final file>.end`, alongside the final file.
fn edge_scratch(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

fn plan_single(
    root: &Path,
    name: &str,
    length: i64,
    piece_size: u64,
) -> Result<StoragePlan, LayoutError> {
    if length < 0 {
        return Err(LayoutError::NegativeFileLength {
            path: name.to_string(),
            length,
        });
    }
    validate_component(name)?;

    let geometry = PieceGeometry {
        piece_size,
        total_size: length as u64,
    };
    let target = TargetFile {
        path: root.join(name),
        length: length as u64,
        offset: 0,
    };
    let scratch: Vec<PathBuf> = (0..geometry.piece_count())
        .map(|index| piece_scratch(root, index))
        .collect();
    let merges = vec![MergePlan {
        target: target.path.clone(),
        deps: scratch.clone(),
    }];

    Ok(StoragePlan {
        geometry,
        structure: FileStructure::Simple { target, scratch },
        merges,
    })
}

/// The multi-file walk. Files are visited in declared order while a carry
/// tracks the piece left half-filled by the previous file: the carry holds
/// the previous file's `.end` scratch and the byte count the current file
/// still owes that piece.
fn plan_multi(
    root: &Path,
    name: &str,
    files: &[InfoFile],
    piece_size: u64,
) -> Result<StoragePlan, LayoutError> {
    if files.is_empty() {
        return Err(LayoutError::EmptyFileList);
    }
    validate_component(name)?;
    let content_root = root.join(name);

    let mut targets = Vec::with_capacity(files.len());
    let mut offset = 0u64;
    for file in files {
        if file.length < 0 {
            return Err(LayoutError::NegativeFileLength {
                path: file.path.join("/"),
                length: file.length,
            });
        }
        if file.path.is_empty() {
            return Err(LayoutError::UnsafePathComponent(String::new()));
        }
        let mut path = content_root.clone();
        for component in &file.path {
            validate_component(component)?;
            path.push(component);
        }
        targets.push(TargetFile {
            path,
            length: file.length as u64,
            offset,
        });
        offset += file.length as u64;
    }

    let geometry = PieceGeometry {
        piece_size,
        total_size: offset,
    };

    struct Carry {
        front: PathBuf,
        pending: u64,
    }

    let mut splits: Vec<SplitPiece> = Vec::with_capacity(geometry.piece_count());
    let mut merges = Vec::with_capacity(targets.len());
    let mut carry: Option<Carry> = None;
    let last = targets.len() - 1;

    for (position, target) in targets.iter().enumerate() {
        let dir = target
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| content_root.clone());
        let mut deps = Vec::new();
        let mut remaining = target.length;

        // Close the piece the previous file left open. The straddling slot is
        // splits.len(): nothing was pushed for it when the carry was opened.
        // A file too short to fill the suffix is only legal when the torrent
        // itself ends inside the carried piece (a short straddling last
        // piece); anywhere else the piece would span three files.
        if let Some(held) = carry.take() {
            if remaining < held.pending && position != last {
                return Err(LayoutError::UnsplittableStraddle {
                    path: target.path.clone(),
                });
            }
            let back = edge_scratch(&target.path, ".start");
            splits.push(SplitPiece::Straddling {
                prefix_len: piece_size - held.pending,
                front: held.front,
                back: back.clone(),
            });
            deps.push(back);
            remaining = remaining.saturating_sub(held.pending);
        }

        // From here the file is aligned to a piece boundary.
        let whole_pieces = remaining / piece_size;
        let tail = remaining % piece_size;

        for _ in 0..whole_pieces {
            let path = piece_scratch(&dir, splits.len());
            splits.push(SplitPiece::Normal(path.clone()));
            deps.push(path);
        }

        if tail > 0 {
            if position == last {
                // Short final piece of the torrent. It lives wholly in this
                // file and scratches at the content root.
                let path = piece_scratch(&content_root, splits.len());
                splits.push(SplitPiece::Normal(path.clone()));
                deps.push(path);
            } else {
                let front = edge_scratch(&target.path, ".end");
                deps.push(front.clone());
                carry = Some(Carry {
                    front,
                    pending: piece_size - tail,
                });
            }
        }

        merges.push(MergePlan {
            target: target.path.clone(),
            deps,
        });
    }

    debug_assert!(carry.is_none());
    debug_assert_eq!(splits.len(), geometry.piece_count());

    Ok(StoragePlan {
        geometry,
        structure: FileStructure::Multi {
            files: targets,
            splits,
        },
        merges,
    })
}

fn validate_component(component: &str) -> Result<(), LayoutError> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
        || component.contains('\0')
    {
        return Err(LayoutError::UnsafePathComponent(component.to_string()));
    }
    Ok(())
}
