// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use tokio::sync::mpsc::Receiver;
use tracing::{event, Level};

use crate::disk_manager::{
    BlockIndex, DiskManagerParameters, PeerToWriter, WriterToPeer,
};
use crate::errors::StorageError;
use crate::piece_buffer::PieceBuffer;
use crate::storage::{read_block, write_batch, PieceMapping, StoragePlan};

/// The long-lived disk task. It exclusively owns the storage plan and the
/// piece mapping; peers talk to it through its inbox and the filesystem is
/// the only state shared with concurrent readers.
pub struct DiskManager {
    plan: StoragePlan,
    mapping: PieceMapping,
    piece_buffer: PieceBuffer,
    inbox: Receiver<PeerToWriter>,
}

impl DiskManager {
    pub fn new(parameters: DiskManagerParameters) -> Self {
        let DiskManagerParameters {
            plan,
            mapping,
            piece_buffer,
            inbox,
        } = parameters;

        Self {
            plan,
            mapping,
            piece_buffer,
            inbox,
        }
    }

    /// Serves the inbox until every sender is gone. A batch-write failure is
    /// fatal and surfaces to the supervising task; an unservable block
    /// request is dropped and the loop keeps going.
    pub async fn run(mut self) -> Result<(), StorageError> {
        while let Some(message) = self.inbox.recv().await {
            match message {
                PeerToWriter::BufferWritten => {
                    let pieces = self.piece_buffer.drain_completed().await;
                    if pieces.is_empty() {
                        continue;
                    }
                    event!(
                        Level::DEBUG,
                        count = pieces.len(),
                        "writing drained pieces to disk"
                    );
                    write_batch(&self.plan, &pieces).await?;
                }
                PeerToWriter::PieceRequest { peer, block } => {
                    match read_block(
                        &self.mapping,
                        block.piece_index,
                        block.block_offset,
                        block.block_length,
                    )
                    .await
                    {
                        Ok(data) => {
                            let reply = WriterToPeer::PieceFulfilled {
                                block: BlockIndex {
                                    piece_index: block.piece_index,
                                    block_offset: block.block_offset,
                                },
                                data,
                            };
                            if peer.send(reply).await.is_err() {
                                event!(
                                    Level::DEBUG,
                                    piece = block.piece_index,
                                    "peer hung up before block fulfillment"
                                );
                            }
                        }
                        Err(error) => {
                            event!(
                                Level::WARN,
                                piece = block.piece_index,
                                offset = block.block_offset,
                                %error,
                                "dropping unservable block request"
                            );
                        }
                    }
                }
            }
        }

        event!(Level::DEBUG, "disk manager inbox closed, shutting down");
        Ok(())
    }
}
