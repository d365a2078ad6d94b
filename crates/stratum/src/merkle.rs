use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct MerkleNode(sha256d::Hash);

impl MerkleNode {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl FromStr for MerkleNode {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use bitcoin::hashes::Hash;
        sha256d::Hash::from_str(s)
            .map(MerkleNode)
            .map_err(|e| InternalError::Parse {
                message: format!("invalid merkle node hex '{s}': {e}"),
            })
    }
}

impl fmt::Display for MerkleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merkle_node_roundtrip() {
        let hex = "8e1e4935a8b4bbdd5a8d4dd26e47b5a21a98a5f3aa1b9e3b38f3e0a6a48fbd4e";
        let node = MerkleNode::from_str(hex).unwrap();
        assert_eq!(node.to_string(), hex);
    }

    #[test]
    fn merkle_node_rejects_bad_hex() {
        assert!(MerkleNode::from_str("not-hex").is_err());
    }

    #[test]
    fn merkle_node_serde_roundtrip() {
        let hex = "8e1e4935a8b4bbdd5a8d4dd26e47b5a21a98a5f3aa1b9e3b38f3e0a6a48fbd4e";
        let node: MerkleNode = serde_json::from_str(&format!("\"{hex}\"")).unwrap();
        assert_eq!(serde_json::to_string(&node).unwrap(), format!("\"{hex}\""));
    }
}
