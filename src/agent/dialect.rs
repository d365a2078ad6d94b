use super::*;

/// Which mining protocol a downstream connection speaks, decided from its first
/// `mining.subscribe` / `eth_submitLogin` call and fixed for the life of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dialect {
    Bitcoin,
    /// NiceHash `EthereumStratum/1.0.0`: 3-byte nonce prefix negotiated via
    /// `GET_NONCE_PREFIX`/`SET_NONCE_PREFIX`.
    EthNiceHash,
    /// `eth_submitLogin`/`eth_getWork`/`eth_submitWork` (ETH-Proxy), one job per
    /// `eth_getWork` response rather than a pushed `mining.notify`.
    EthProxy,
}

impl Dialect {
    /// Inspects the second `mining.subscribe` parameter, where NiceHash miners send
    /// their extension marker.
    pub(crate) fn from_subscribe_user_agent(second_param: Option<&str>) -> Self {
        match second_param {
            Some(marker) if marker.starts_with("EthereumStratum/") => Self::EthNiceHash,
            _ => Self::Bitcoin,
        }
    }

    pub(crate) fn is_ethereum(self) -> bool {
        !matches!(self, Self::Bitcoin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_nicehash_marker() {
        assert_eq!(
            Dialect::from_subscribe_user_agent(Some("EthereumStratum/1.0.0")),
            Dialect::EthNiceHash
        );
    }

    #[test]
    fn defaults_to_bitcoin() {
        assert_eq!(Dialect::from_subscribe_user_agent(None), Dialect::Bitcoin);
        assert_eq!(Dialect::from_subscribe_user_agent(Some("cgminer")), Dialect::Bitcoin);
    }

    #[test]
    fn ethereum_dialects_report_is_ethereum() {
        assert!(Dialect::EthNiceHash.is_ethereum());
        assert!(Dialect::EthProxy.is_ethereum());
        assert!(!Dialect::Bitcoin.is_ethereum());
    }
}
