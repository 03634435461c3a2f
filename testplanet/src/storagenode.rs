//! Storage nodes which keep the pieces of the remote segments.

use parking_lot::RwLock;
use uplink::transport::NodeId;

use std::collections::HashMap;

/// Identifies a piece stored in the storage nodes.
pub type PieceId = [u8; 32];

/// An in-memory storage node.
#[derive(Debug)]
pub struct StorageNode {
    id: NodeId,
    pieces: RwLock<HashMap<PieceId, Vec<u8>>>,
}

impl StorageNode {
    /// Creates the storage node with the position `index` in the planet.
    pub(crate) fn new(index: usize) -> Self {
        let id = blake3::hash(format!("storagenode:{}", index).as_bytes());
        Self {
            id: NodeId(*id.as_bytes()),
            pieces: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the number of pieces that the node stores.
    pub fn piece_count(&self) -> usize {
        self.pieces.read().len()
    }

    /// Removes all the pieces, simulating a node that lost its data.
    pub fn wipe(&self) {
        self.pieces.write().clear();
        tracing::debug!(node = %self.id, "storage node wiped");
    }

    pub(crate) fn put(&self, piece: PieceId, data: Vec<u8>) {
        self.pieces.write().insert(piece, data);
    }

    pub(crate) fn get(&self, piece: &PieceId) -> Option<Vec<u8>> {
        self.pieces.read().get(piece).cloned()
    }

    pub(crate) fn delete(&self, piece: &PieceId) {
        self.pieces.write().remove(piece);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pieces() {
        let node = StorageNode::new(0);
        assert_ne!(node.id(), StorageNode::new(1).id(), "unique IDs");

        let piece = [9; 32];
        node.put(piece, b"data".to_vec());
        assert_eq!(node.piece_count(), 1, "piece count");
        assert_eq!(node.get(&piece), Some(b"data".to_vec()), "get");

        node.delete(&piece);
        assert_eq!(node.get(&piece), None, "deleted piece");

        node.put(piece, b"data".to_vec());
        node.wipe();
        assert_eq!(node.piece_count(), 0, "wiped node");
    }
}
