use lwk_wollet::ElementsNetwork;
use lwk_wollet::elements::{AddressParams, AssetId};
use serde::Deserialize;

/// Network variants for Liquid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Liquid,
    LiquidTestnet,
    LiquidRegtest,
}

impl Network {
    pub fn into_lwk(self) -> ElementsNetwork {
        match self {
            Network::Liquid => ElementsNetwork::Liquid,
            Network::LiquidTestnet => ElementsNetwork::LiquidTestnet,
            Network::LiquidRegtest => ElementsNetwork::default_regtest(),
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Liquid)
    }

    /// BIP44 coin type used in the wallet derivation path.
    pub fn coin_type(self) -> u32 {
        if self.is_mainnet() { 1776 } else { 1 }
    }

    /// The native (fee-paying) asset of the network.
    pub fn policy_asset(self) -> AssetId {
        self.into_lwk().policy_asset()
    }

    pub fn default_electrum_url(self) -> &'static str {
        match self {
            Network::Liquid => "ssl://blockstream.info:995",
            Network::LiquidTestnet => "ssl://blockstream.info:465",
            Network::LiquidRegtest => "tcp://localhost:50001",
        }
    }

    pub fn esplora_url(self) -> &'static str {
        match self {
            Network::Liquid => "https://blockstream.info/liquid/api",
            Network::LiquidTestnet => "https://blockstream.info/liquidtestnet/api",
            Network::LiquidRegtest => "http://localhost:3001",
        }
    }

    pub fn address_params(self) -> &'static AddressParams {
        match self {
            Network::Liquid => &AddressParams::LIQUID,
            Network::LiquidTestnet => &AddressParams::LIQUID_TESTNET,
            Network::LiquidRegtest => &AddressParams::ELEMENTS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Liquid => "mainnet",
            Network::LiquidTestnet => "testnet",
            Network::LiquidRegtest => "regtest",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "liquid" => Ok(Network::Liquid),
            "testnet" | "liquid-testnet" | "liquidtestnet" => Ok(Network::LiquidTestnet),
            "regtest" | "liquid-regtest" | "liquidregtest" => Ok(Network::LiquidRegtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("liquid".parse::<Network>().unwrap(), Network::Liquid);
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::LiquidTestnet);
        assert_eq!(
            "liquid-regtest".parse::<Network>().unwrap(),
            Network::LiquidRegtest
        );
        assert!("bitcoin".parse::<Network>().is_err());
    }

    #[test]
    fn coin_type_follows_network() {
        assert_eq!(Network::Liquid.coin_type(), 1776);
        assert_eq!(Network::LiquidTestnet.coin_type(), 1);
        assert_eq!(Network::LiquidRegtest.coin_type(), 1);
    }

    #[test]
    fn policy_asset_is_stable() {
        assert_eq!(
            Network::Liquid.policy_asset().to_string(),
            "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d"
        );
    }
}
