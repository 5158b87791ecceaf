//! Peers discovered on the local network.
//!
//! A [`DiscoveredPeer`] only exists while discovery is running.  The engine
//! reports peers as `{ id, name, address }`; the serde renames below map that
//! shape onto the domain names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A device advertising itself as pairing-ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPeer {
    /// Opaque identifier assigned by the engine.
    pub id: String,
    /// Human-readable device name.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Network address the peer was seen at, e.g. `"192.168.1.20:47000"`.
    #[serde(rename = "address")]
    pub network_address: String,
}

/// Deduplicates a peer list by id.
///
/// When the same id appears more than once the latest entry wins, since it
/// carries the freshest name and address.  Output order follows the first
/// appearance of each id; callers must not rely on it being meaningful.
pub fn dedup_peers(peers: Vec<DiscoveredPeer>) -> Vec<DiscoveredPeer> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(peers.len());
    let mut out: Vec<DiscoveredPeer> = Vec::with_capacity(peers.len());

    for peer in peers {
        match index.get(&peer.id) {
            Some(&slot) => out[slot] = peer,
            None => {
                index.insert(peer.id.clone(), out.len());
                out.push(peer);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, name: &str) -> DiscoveredPeer {
        DiscoveredPeer {
            id: id.to_string(),
            display_name: name.to_string(),
            network_address: "10.0.0.2:47000".to_string(),
        }
    }

    #[test]
    fn test_dedup_peers_keeps_single_entry_per_id() {
        // Arrange
        let peers = vec![peer("a", "Phone"), peer("b", "Tablet"), peer("a", "Phone")];

        // Act
        let out = dedup_peers(peers);

        // Assert
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_dedup_peers_latest_report_wins() {
        let peers = vec![peer("a", "Old name"), peer("a", "New name")];
        let out = dedup_peers(peers);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].display_name, "New name");
    }

    #[test]
    fn test_dedup_peers_empty_input_gives_empty_output() {
        assert!(dedup_peers(Vec::new()).is_empty());
    }

    #[test]
    fn test_discovered_peer_decodes_engine_shape() {
        // Arrange
        let json = r#"{"id":"p-1","name":"Kitchen iPad","address":"192.168.1.9:47000"}"#;

        // Act
        let peer: DiscoveredPeer = serde_json::from_str(json).expect("decode");

        // Assert
        assert_eq!(peer.id, "p-1");
        assert_eq!(peer.display_name, "Kitchen iPad");
        assert_eq!(peer.network_address, "192.168.1.9:47000");
    }
}
