//! Test utilities: fixed keys, explicit and confidential outputs, a
//! counterparty PSET builder, and in-memory UTXO and price sources.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lwk_wollet::elements::confidential::{Asset, AssetBlindingFactor, Nonce, Value, ValueBlindingFactor};
use lwk_wollet::elements::hashes::Hash;
use lwk_wollet::elements::pset::{Input, Output, PartiallySignedTransaction};
use lwk_wollet::elements::secp256k1_zkp::{All, PublicKey, Secp256k1, SecretKey};
use lwk_wollet::elements::{
    Address, AddressParams, AssetId, OutPoint, Script, Sequence, Transaction, TxOut,
    TxOutSecrets, TxOutWitness, Txid,
};

use crate::chain::UtxoSource;
use crate::error::{Error, Result};
use crate::market::Market;
use crate::price::{Price, PriceSource};
use crate::utxo::Utxo;

/// BIP39 test vector mnemonic.
pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Outpoint with a fixed txid and the given vout.
pub fn test_outpoint(vout: u32) -> OutPoint {
    OutPoint::new(Txid::from_byte_array([0xab; 32]), vout)
}

/// Build an explicit (non-confidential) TxOut for tests.
pub fn explicit_txout(asset: AssetId, amount: u64, spk: &Script) -> TxOut {
    TxOut {
        asset: Asset::Explicit(asset),
        value: Value::Explicit(amount),
        nonce: Nonce::Null,
        script_pubkey: spk.clone(),
        witness: TxOutWitness::default(),
    }
}

/// Explicit UTXO paying to an anyone-can-spend script.
pub fn explicit_utxo(asset: AssetId, value: u64, vout: u32, height: Option<u32>) -> Utxo {
    let txout = explicit_txout(asset, value, &Script::from(vec![0x51]));
    Utxo::reveal(test_outpoint(vout), txout, height, &[]).expect("explicit output reveals")
}

/// Confirmed explicit UTXO paying to `script`.
pub fn explicit_utxo_for(asset: AssetId, value: u64, vout: u32, script: &Script) -> Utxo {
    let txout = explicit_txout(asset, value, script);
    Utxo::reveal(test_outpoint(vout), txout, Some(1), &[]).expect("explicit output reveals")
}

/// Confidential P2WPKH address whose blinding key is `blinding_key`.
pub fn test_address(secp: &Secp256k1<All>, blinding_key: &SecretKey) -> Address {
    let signing = SecretKey::from_slice(&[0x42; 32]).expect("valid key");
    let pk = lwk_wollet::elements::bitcoin::PublicKey {
        inner: PublicKey::from_secret_key(secp, &signing),
        compressed: true,
    };
    let blinder = PublicKey::from_secret_key(secp, blinding_key);
    Address::p2wpkh(&pk, Some(blinder), &AddressParams::ELEMENTS)
}

/// Blinded output to `address`, with the secrets needed to spend it.
pub fn confidential_txout(address: &Address, asset: AssetId, value: u64) -> (TxOut, TxOutSecrets) {
    let secp = Secp256k1::new();
    let spent = [TxOutSecrets::new(
        asset,
        AssetBlindingFactor::zero(),
        value,
        ValueBlindingFactor::zero(),
    )];
    let (txout, abf, vbf, _) = TxOut::new_not_last_confidential(
        &mut rand::thread_rng(),
        &secp,
        value,
        address.clone(),
        asset,
        &spent,
    )
    .expect("blinded output");
    (txout, TxOutSecrets::new(asset, abf, value, vbf))
}

/// A P2WPKH-shaped script no test wallet owns.
pub fn counterparty_script() -> Script {
    let mut bytes = vec![0x00, 0x14];
    bytes.extend([0xcc; 20]);
    Script::from(bytes)
}

/// The proposer's half of a swap: one input of `amount_p` of `asset_p` and
/// one output asking for `amount_r` of `asset_r`, both explicit.
pub fn counterparty_pset(
    asset_p: AssetId,
    amount_p: u64,
    asset_r: AssetId,
    amount_r: u64,
) -> PartiallySignedTransaction {
    let script = counterparty_script();
    let outpoint = OutPoint::new(Txid::from_byte_array([0xcd; 32]), 0);
    let mut pset = PartiallySignedTransaction::new_v2();
    pset.add_input(Input {
        previous_txid: outpoint.txid,
        previous_output_index: outpoint.vout,
        witness_utxo: Some(explicit_txout(asset_p, amount_p, &script)),
        sequence: Some(Sequence::ENABLE_LOCKTIME_NO_RBF),
        ..Default::default()
    });
    pset.add_output(Output {
        amount: Some(amount_r),
        asset: Some(asset_r),
        script_pubkey: script,
        ..Default::default()
    });
    pset
}

// ── In-memory collaborators ─────────────────────────────────────────────

/// UTXO source backed by a fixed list. Records every call.
#[derive(Default)]
pub struct MockUtxoSource {
    utxos: Mutex<Vec<Utxo>>,
    broadcasts: Mutex<Vec<Transaction>>,
    fetch_calls: AtomicUsize,
    broadcast_calls: AtomicUsize,
    fail_broadcast: AtomicBool,
}

impl MockUtxoSource {
    pub fn new(utxos: Vec<Utxo>) -> Self {
        Self {
            utxos: Mutex::new(utxos),
            ..Default::default()
        }
    }

    pub fn push_utxo(&self, utxo: Utxo) {
        self.utxos.lock().unwrap().push(utxo);
    }

    pub fn set_broadcast_failure(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_calls(&self) -> usize {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    /// Transactions that were broadcast successfully.
    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.broadcasts.lock().unwrap().clone()
    }
}

impl UtxoSource for MockUtxoSource {
    fn fetch_unspents(&self, addresses: &[Address], _blinding_keys: &[SecretKey]) -> Result<Vec<Utxo>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let scripts: Vec<Script> = addresses.iter().map(|a| a.script_pubkey()).collect();
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .iter()
            .filter(|u| scripts.contains(u.script_pubkey()))
            .cloned()
            .collect())
    }

    fn broadcast(&self, tx: &Transaction) -> Result<Txid> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(Error::Broadcast("mempool rejected transaction".into()));
        }
        self.broadcasts.lock().unwrap().push(tx.clone());
        Ok(tx.txid())
    }
}

/// Price source returning a fixed price, or failing when none is set.
#[derive(Default)]
pub struct StaticPriceSource {
    price: Option<Price>,
    calls: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new(base_price: f64, quote_price: f64) -> Self {
        Self {
            price: Some(Price {
                base_price,
                quote_price,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceSource for StaticPriceSource {
    fn get_price(&self, _market: &Market) -> Result<Price> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.price
            .ok_or_else(|| Error::PriceUnavailable("no price configured".into()))
    }
}
