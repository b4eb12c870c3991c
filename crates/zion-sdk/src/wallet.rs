use std::collections::HashMap;

use lwk_wollet::elements::secp256k1_zkp::SecretKey;
use lwk_wollet::elements::{Address, Script};

use crate::error::Result;
use crate::keys::{AddressRole, RoleKeys, derive_role_keys, signer_from_mnemonic};
use crate::network::Network;

/// Hex-encoded output script → blinding private key bytes.
pub type BlindingKeyMap = HashMap<String, Vec<u8>>;

/// Key used for a script in a [`BlindingKeyMap`].
pub fn script_hex(script: &Script) -> String {
    hex::encode(script.as_bytes())
}

/// A confidential address together with the blinding private key that
/// unblinds outputs paying to it.
#[derive(Debug, Clone)]
pub struct AddressAndBlindingKey {
    pub address: Address,
    pub blinding_private_key: SecretKey,
}

/// The daemon's single-market wallet: one receiving and one change chain,
/// derived once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Wallet {
    network: Network,
    receiving: RoleKeys,
    change: RoleKeys,
}

impl Wallet {
    pub fn from_mnemonic(mnemonic: &str, network: Network) -> Result<Self> {
        let signer = signer_from_mnemonic(mnemonic, network)?;
        let receiving = derive_role_keys(&signer, network, AddressRole::Receiving)?;
        let change = derive_role_keys(&signer, network, AddressRole::Change)?;
        log::debug!(
            "wallet ready on {}: receiving {}, change {}",
            network.as_str(),
            receiving.address,
            change.address
        );
        Ok(Self {
            network,
            receiving,
            change,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn address(&self) -> AddressAndBlindingKey {
        AddressAndBlindingKey {
            address: self.receiving.address.clone(),
            blinding_private_key: self.receiving.blinding_key,
        }
    }

    pub fn change_address(&self) -> AddressAndBlindingKey {
        AddressAndBlindingKey {
            address: self.change.address.clone(),
            blinding_private_key: self.change.blinding_key,
        }
    }

    pub fn receiving_script(&self) -> &Script {
        &self.receiving.script_pubkey
    }

    pub fn change_script(&self) -> &Script {
        &self.change.script_pubkey
    }

    pub fn role_keys(&self, role: AddressRole) -> &RoleKeys {
        match role {
            AddressRole::Receiving => &self.receiving,
            AddressRole::Change => &self.change,
        }
    }

    /// Keys owning `script`, if it is one of the wallet's two scripts.
    pub fn keys_for_script(&self, script: &Script) -> Option<&RoleKeys> {
        [&self.receiving, &self.change]
            .into_iter()
            .find(|keys| &keys.script_pubkey == script)
    }

    pub fn owns_script(&self, script: &Script) -> bool {
        self.keys_for_script(script).is_some()
    }

    /// Both addresses, receiving first, as passed to the UTXO source.
    pub fn addresses(&self) -> Vec<Address> {
        vec![
            self.receiving.address.clone(),
            self.change.address.clone(),
        ]
    }

    /// Blinding private keys for both addresses, matching [`Self::addresses`].
    pub fn blinding_private_keys(&self) -> Vec<SecretKey> {
        vec![self.receiving.blinding_key, self.change.blinding_key]
    }

    /// The wallet's own script-keyed blinding key map.
    pub fn blinding_keys(&self) -> BlindingKeyMap {
        [&self.receiving, &self.change]
            .into_iter()
            .map(|keys| {
                (
                    script_hex(&keys.script_pubkey),
                    keys.blinding_key.secret_bytes().to_vec(),
                )
            })
            .collect()
    }
}
