// SPDX-FileCopyrightText: 2026 The piecekeeper Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use tokio::sync::Mutex;

/// Hand-off point between piece verification and the disk writer.
///
/// The verification pipeline submits each piece once its hash checks out; the
/// disk writer drains everything accumulated since its last visit in one
/// atomic take. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct PieceBuffer {
    completed: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
}

impl PieceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submit(&self, index: u32, bytes: Vec<u8>) {
        self.completed.lock().await.push((index, bytes));
    }

    pub async fn drain_completed(&self) -> Vec<(u32, Vec<u8>)> {
        std::mem::take(&mut *self.completed.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_takes_everything_and_leaves_nothing() {
        let buffer = PieceBuffer::new();
        buffer.submit(3, vec![1, 2, 3]).await;
        buffer.submit(0, vec![4]).await;

        let drained = buffer.drain_completed().await;
        assert_eq!(drained, vec![(3, vec![1, 2, 3]), (0, vec![4])]);

        assert!(buffer.drain_completed().await.is_empty());
    }

    #[tokio::test]
    async fn clones_share_one_buffer() {
        let buffer = PieceBuffer::new();
        let writer_side = buffer.clone();

        buffer.submit(1, vec![9]).await;
        let drained = writer_side.drain_completed().await;
        assert_eq!(drained, vec![(1, vec![9])]);
        assert!(buffer.drain_completed().await.is_empty());
    }
}
