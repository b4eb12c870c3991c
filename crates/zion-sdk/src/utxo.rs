use lwk_wollet::elements::confidential::{Asset, AssetBlindingFactor, Value, ValueBlindingFactor};
use lwk_wollet::elements::secp256k1_zkp::{Secp256k1, SecretKey};
use lwk_wollet::elements::{AssetId, OutPoint, Script, TxOut, TxOutSecrets};

use crate::error::{Error, Result};

/// An unspent output with its amount and asset revealed.
///
/// Explicit outputs carry zero blinding factors; confidential ones carry the
/// factors recovered when unblinding.
#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub txout: TxOut,
    pub asset_id: AssetId,
    pub value: u64,
    pub asset_blinding_factor: AssetBlindingFactor,
    pub value_blinding_factor: ValueBlindingFactor,
    /// Confirmation height, `None` while in the mempool.
    pub height: Option<u32>,
}

impl Utxo {
    /// Reveal `txout`: explicit outputs directly, confidential outputs by
    /// trying each blinding key in turn.
    pub fn reveal(
        outpoint: OutPoint,
        txout: TxOut,
        height: Option<u32>,
        blinding_keys: &[SecretKey],
    ) -> Result<Self> {
        let secrets = reveal_txout(&txout, blinding_keys)
            .ok_or_else(|| Error::Blinding(format!("cannot unblind {outpoint}")))?;
        Ok(Self {
            outpoint,
            txout,
            asset_id: secrets.asset,
            value: secrets.value,
            asset_blinding_factor: secrets.asset_bf,
            value_blinding_factor: secrets.value_bf,
            height,
        })
    }

    pub fn script_pubkey(&self) -> &Script {
        &self.txout.script_pubkey
    }

    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }

    pub fn is_confidential(&self) -> bool {
        self.txout.is_partially_blinded()
    }

    /// The secrets `blind_last` needs for this output when spent.
    pub fn secrets(&self) -> TxOutSecrets {
        TxOutSecrets {
            asset: self.asset_id,
            asset_bf: self.asset_blinding_factor,
            value: self.value,
            value_bf: self.value_blinding_factor,
        }
    }
}

/// Secrets of an output: explicit outputs reveal themselves, confidential
/// outputs need a matching blinding key.
pub fn reveal_txout(txout: &TxOut, blinding_keys: &[SecretKey]) -> Option<TxOutSecrets> {
    if let (Asset::Explicit(asset), Value::Explicit(value)) = (txout.asset, txout.value) {
        return Some(TxOutSecrets {
            asset,
            asset_bf: AssetBlindingFactor::zero(),
            value,
            value_bf: ValueBlindingFactor::zero(),
        });
    }

    let secp = Secp256k1::new();
    blinding_keys
        .iter()
        .find_map(|key| txout.unblind(&secp, *key).ok())
}
