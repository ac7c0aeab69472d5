// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod layout;
pub mod mapping;
pub mod reader;
pub mod writer;

pub use layout::{FileStructure, MergePlan, PieceGeometry, SplitPiece, StoragePlan, TargetFile};
pub use mapping::{EmbeddedLocation, PieceMapping, PieceSegment};
pub use reader::{read_block, read_piece};
pub use writer::write_batch;
