use super::*;

/// The previous block hash as it appears in `mining.notify`. This agent never recomputes or
/// byte-swaps it; it is relayed to downstream miners exactly as the upstream pool sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct PrevHash([u8; 32]);

impl PrevHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for PrevHash {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| InternalError::Parse {
            message: format!("invalid prevhash hex '{s}': {e}"),
        })?;

        let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            InternalError::InvalidValue {
                reason: format!("prevhash must be 32 bytes, got {}", bytes.len()),
            }
        })?;

        Ok(Self(array))
    }
}

impl fmt::Display for PrevHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
