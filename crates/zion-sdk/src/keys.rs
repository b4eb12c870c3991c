//! Deterministic key material for the daemon wallet.
//!
//! Two fixed chains are derived from the mnemonic:
//!
//! ```text
//! receiving  m/84'/{coin}'/0'/0/0
//! change     m/84'/{coin}'/0'/1/0
//! ```
//!
//! Each chain gets a P2WPKH script and a SLIP-77 blinding keypair scoped to
//! that script, so blinding material is a pure function of seed and script.

use lwk_common::Signer;
use lwk_signer::SwSigner;
use lwk_wollet::bitcoin::bip32::DerivationPath;
use lwk_wollet::elements::secp256k1_zkp::{self, PublicKey, Secp256k1, SecretKey};
use lwk_wollet::elements::{Address, Script};

use crate::error::{Error, Result};
use crate::network::Network;

/// Which of the two wallet chains a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressRole {
    Receiving,
    Change,
}

impl AddressRole {
    pub fn branch(self) -> u32 {
        match self {
            AddressRole::Receiving => 0,
            AddressRole::Change => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AddressRole::Receiving => "receiving",
            AddressRole::Change => "change",
        }
    }
}

/// Signing and blinding keys for one address role.
#[derive(Clone)]
pub struct RoleKeys {
    pub role: AddressRole,
    pub signing_key: SecretKey,
    pub public_key: PublicKey,
    pub blinding_key: SecretKey,
    pub blinding_public_key: PublicKey,
    pub script_pubkey: Script,
    pub address: Address,
}

impl std::fmt::Debug for RoleKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleKeys")
            .field("role", &self.role)
            .field("public_key", &self.public_key)
            .field("address", &self.address.to_string())
            .finish_non_exhaustive()
    }
}

impl RoleKeys {
    /// The signing key as the compressed bitcoin key used in witnesses and
    /// PSET partial signatures.
    pub fn bitcoin_public_key(&self) -> lwk_wollet::elements::bitcoin::PublicKey {
        lwk_wollet::elements::bitcoin::PublicKey {
            inner: self.public_key,
            compressed: true,
        }
    }
}

/// Derivation path for a role: `m/84'/{coin}'/0'/{branch}/0`.
pub fn derivation_path(network: Network, role: AddressRole) -> Result<DerivationPath> {
    let path_str = format!("m/84'/{}'/0'/{}/0", network.coin_type(), role.branch());
    path_str
        .parse()
        .map_err(|e| Error::KeyDerivation(format!("{path_str}: {e}")))
}

/// Build the software signer for a mnemonic.
pub fn signer_from_mnemonic(mnemonic: &str, network: Network) -> Result<SwSigner> {
    SwSigner::new(mnemonic.trim(), network.is_mainnet())
        .map_err(|e| Error::KeyDerivation(format!("invalid mnemonic: {e}")))
}

/// Derive the signing keys, script, blinding keys and confidential address
/// for one role.
pub fn derive_role_keys(
    signer: &SwSigner,
    network: Network,
    role: AddressRole,
) -> Result<RoleKeys> {
    let secp = Secp256k1::new();
    let path = derivation_path(network, role)?;
    let derived = signer
        .derive_xprv(&path)
        .map_err(|e| Error::KeyDerivation(format!("{:?}", e)))?;
    let signing_key = secp256k1_zkp::SecretKey::from_slice(&derived.private_key.secret_bytes())
        .map_err(|e| Error::KeyDerivation(format!("{}", e)))?;
    let public_key = PublicKey::from_secret_key(&secp, &signing_key);
    let bitcoin_pk = lwk_wollet::elements::bitcoin::PublicKey {
        inner: public_key,
        compressed: true,
    };

    // The unconfidential script is the same whatever blinder the address
    // carries, so derive it first and scope the blinding key to it.
    let script_pubkey = Address::p2wpkh(&bitcoin_pk, None, network.address_params()).script_pubkey();

    let master_blinding_key = signer
        .slip77_master_blinding_key()
        .map_err(|e| Error::KeyDerivation(format!("slip77 key: {e}")))?;
    let blinding_key = master_blinding_key.blinding_private_key(&script_pubkey);
    let blinding_public_key = PublicKey::from_secret_key(&secp, &blinding_key);

    let address = Address::p2wpkh(
        &bitcoin_pk,
        Some(blinding_public_key),
        network.address_params(),
    );

    Ok(RoleKeys {
        role,
        signing_key,
        public_key,
        blinding_key,
        blinding_public_key,
        script_pubkey,
        address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TEST_MNEMONIC;

    #[test]
    fn paths_follow_network_coin_type() {
        let mainnet = derivation_path(Network::Liquid, AddressRole::Receiving).unwrap();
        assert_eq!(mainnet, "m/84'/1776'/0'/0/0".parse::<DerivationPath>().unwrap());
        let change = derivation_path(Network::LiquidTestnet, AddressRole::Change).unwrap();
        assert_eq!(change, "m/84'/1'/0'/1/0".parse::<DerivationPath>().unwrap());
    }

    #[test]
    fn derivation_is_deterministic() {
        let signer = signer_from_mnemonic(TEST_MNEMONIC, Network::LiquidRegtest).unwrap();
        let a = derive_role_keys(&signer, Network::LiquidRegtest, AddressRole::Receiving).unwrap();
        let b = derive_role_keys(&signer, Network::LiquidRegtest, AddressRole::Receiving).unwrap();
        assert_eq!(a.signing_key, b.signing_key);
        assert_eq!(a.blinding_key, b.blinding_key);
        assert_eq!(a.address, b.address);
    }

    #[test]
    fn roles_have_distinct_keys_and_scripts() {
        let signer = signer_from_mnemonic(TEST_MNEMONIC, Network::LiquidRegtest).unwrap();
        let recv = derive_role_keys(&signer, Network::LiquidRegtest, AddressRole::Receiving).unwrap();
        let change = derive_role_keys(&signer, Network::LiquidRegtest, AddressRole::Change).unwrap();
        assert_ne!(recv.signing_key, change.signing_key);
        assert_ne!(recv.blinding_key, change.blinding_key);
        assert_ne!(recv.script_pubkey, change.script_pubkey);
    }

    #[test]
    fn address_is_confidential_p2wpkh() {
        let signer = signer_from_mnemonic(TEST_MNEMONIC, Network::LiquidRegtest).unwrap();
        let keys = derive_role_keys(&signer, Network::LiquidRegtest, AddressRole::Receiving).unwrap();
        assert!(keys.address.is_blinded());
        assert_eq!(keys.address.blinding_pubkey, Some(keys.blinding_public_key));
        assert!(keys.script_pubkey.is_v0_p2wpkh());
        assert_eq!(keys.address.script_pubkey(), keys.script_pubkey);
    }

    #[test]
    fn malformed_mnemonic_is_rejected() {
        let err = signer_from_mnemonic("not a real seed phrase", Network::LiquidRegtest).unwrap_err();
        assert!(matches!(err, Error::KeyDerivation(_)));
    }
}
