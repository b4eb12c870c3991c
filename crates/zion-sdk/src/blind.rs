//! Confidential blinding of a completed swap PSET.
//!
//! Every input must have its amount and asset revealed, either because the
//! previous output is explicit or because a blinding key for its script is
//! known. Outputs whose script has a blinding key are blinded with fresh
//! random factors; the rest, including the fee, stay explicit.

use std::collections::HashMap;

use lwk_wollet::elements::pset::PartiallySignedTransaction;
use lwk_wollet::elements::secp256k1_zkp::{PublicKey, Secp256k1, SecretKey};
use lwk_wollet::elements::{AssetId, Script, Transaction, TxOut, TxOutSecrets};
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::utxo::reveal_txout;
use crate::wallet::{BlindingKeyMap, script_hex};

/// Merge the counterparty's map with the daemon's own.
///
/// The daemon's entries are applied last so a counterparty can never replace
/// the key for one of the daemon's scripts.
pub fn merge_blinding_keys(counterparty: &BlindingKeyMap, own: &BlindingKeyMap) -> BlindingKeyMap {
    let mut merged = counterparty.clone();
    for (script, key) in own {
        merged.insert(script.clone(), key.clone());
    }
    merged
}

fn key_for_script(keys: &BlindingKeyMap, script: &Script) -> Result<Option<SecretKey>> {
    keys.get(&script_hex(script))
        .map(|bytes| {
            SecretKey::from_slice(bytes)
                .map_err(|e| Error::Blinding(format!("bad blinding key for {}: {e}", script_hex(script))))
        })
        .transpose()
}

/// Reveal every input of `pset`, keyed by input index.
pub fn input_secrets(
    pset: &PartiallySignedTransaction,
    input_keys: &BlindingKeyMap,
) -> Result<HashMap<usize, TxOutSecrets>> {
    let mut secrets = HashMap::new();
    for (idx, input) in pset.inputs().iter().enumerate() {
        let txout = input
            .witness_utxo
            .as_ref()
            .ok_or(Error::UnblindedInputMissing(idx))?;
        let keys: Vec<SecretKey> = key_for_script(input_keys, &txout.script_pubkey)?
            .into_iter()
            .collect();
        let revealed = reveal_txout(txout, &keys).ok_or(Error::UnblindedInputMissing(idx))?;
        secrets.insert(idx, revealed);
    }
    Ok(secrets)
}

/// Check that revealed inputs and explicit outputs balance per asset.
pub fn check_balanced(
    pset: &PartiallySignedTransaction,
    inputs: &HashMap<usize, TxOutSecrets>,
) -> Result<()> {
    let mut totals: HashMap<AssetId, i128> = HashMap::new();
    for secrets in inputs.values() {
        *totals.entry(secrets.asset).or_default() += i128::from(secrets.value);
    }
    for (idx, output) in pset.outputs().iter().enumerate() {
        let (Some(asset), Some(amount)) = (output.asset, output.amount) else {
            return Err(Error::Unbalanced(format!(
                "output {idx} has no explicit amount and asset"
            )));
        };
        *totals.entry(asset).or_default() -= i128::from(amount);
    }
    match totals.iter().find(|(_, diff)| **diff != 0) {
        Some((asset, diff)) => Err(Error::Unbalanced(format!(
            "asset {asset} off by {diff} (inputs minus outputs)"
        ))),
        None => Ok(()),
    }
}

/// Blind `pset` in place.
///
/// `blinder_index` is the input whose owner performs the blinding, normally
/// the first input the daemon added. Returns the number of outputs blinded.
pub fn blind_swap_pset(
    pset: &mut PartiallySignedTransaction,
    input_keys: &BlindingKeyMap,
    output_keys: &BlindingKeyMap,
    blinder_index: u32,
) -> Result<usize> {
    let inp_txout_sec = input_secrets(pset, input_keys)?;
    check_balanced(pset, &inp_txout_sec)?;

    let secp = Secp256k1::new();
    let mut blinded = 0;
    for output in pset.outputs_mut() {
        if output.script_pubkey.is_empty() || output.amount_comm.is_some() {
            continue;
        }
        let Some(sk) = key_for_script(output_keys, &output.script_pubkey)? else {
            continue;
        };
        output.blinding_key = Some(lwk_wollet::elements::bitcoin::PublicKey {
            inner: PublicKey::from_secret_key(&secp, &sk),
            compressed: true,
        });
        output.blinder_index = Some(blinder_index);
        blinded += 1;
    }

    if blinded == 0 {
        log::debug!("no output has a blinding key, leaving transaction explicit");
        return Ok(0);
    }

    let mut rng = thread_rng();
    pset.blind_last(&mut rng, &secp, &inp_txout_sec)
        .map_err(|e| Error::Blinding(format!("{e:?}")))?;

    let spent: Vec<TxOut> = pset
        .inputs()
        .iter()
        .enumerate()
        .map(|(idx, input)| {
            input
                .witness_utxo
                .clone()
                .ok_or(Error::UnblindedInputMissing(idx))
        })
        .collect::<Result<_>>()?;
    let tx = pset
        .extract_tx()
        .map_err(|e| Error::Blinding(format!("extract after blinding: {e}")))?;
    verify_blinded(&tx, &spent)?;

    log::debug!("blinded {blinded} outputs");
    Ok(blinded)
}

/// Verify range proofs, surjection proofs and commitment balance of `tx`.
pub fn verify_blinded(tx: &Transaction, spent: &[TxOut]) -> Result<()> {
    let secp = Secp256k1::new();
    tx.verify_tx_amt_proofs(&secp, spent)
        .map_err(|e| Error::Blinding(format!("proof verification: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        confidential_txout, counterparty_pset, explicit_txout, test_address, test_outpoint,
    };
    use lwk_wollet::elements::confidential::{Asset, Value};
    use lwk_wollet::elements::pset::{Input, Output};
    use lwk_wollet::elements::{AssetId, Sequence};

    fn asset(b: u8) -> AssetId {
        AssetId::from_slice(&[b; 32]).unwrap()
    }

    fn key(b: u8) -> SecretKey {
        SecretKey::from_slice(&[b; 32]).unwrap()
    }

    fn map_for(script: &Script, key: &SecretKey) -> BlindingKeyMap {
        let mut map = BlindingKeyMap::new();
        map.insert(script_hex(script), key.secret_bytes().to_vec());
        map
    }

    fn add_input(pset: &mut PartiallySignedTransaction, txout: TxOut, vout: u32) {
        let outpoint = test_outpoint(vout);
        pset.add_input(Input {
            previous_txid: outpoint.txid,
            previous_output_index: outpoint.vout,
            witness_utxo: Some(txout),
            sequence: Some(Sequence::ENABLE_LOCKTIME_NO_RBF),
            ..Default::default()
        });
    }

    fn add_output(pset: &mut PartiallySignedTransaction, asset: AssetId, amount: u64, spk: Script) {
        pset.add_output(Output {
            amount: Some(amount),
            asset: Some(asset),
            script_pubkey: spk,
            ..Default::default()
        });
    }

    #[test]
    fn own_entries_win_on_merge() {
        let script = Script::from(vec![0x51]);
        let mut counterparty = map_for(&script, &key(1));
        counterparty.insert("abcd".into(), vec![1, 2, 3]);
        let own = map_for(&script, &key(2));

        let merged = merge_blinding_keys(&counterparty, &own);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&script_hex(&script)], key(2).secret_bytes().to_vec());
        assert_eq!(merged["abcd"], vec![1, 2, 3]);
    }

    #[test]
    fn input_without_witness_utxo_is_rejected() {
        let mut pset = counterparty_pset(asset(1), 100, asset(2), 100);
        pset.add_input(Input::default());
        let err = input_secrets(&pset, &BlindingKeyMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnblindedInputMissing(1)));
    }

    #[test]
    fn confidential_input_without_key_is_rejected() {
        let secp = Secp256k1::new();
        let address = test_address(&secp, &key(7));
        let (txout, _) = confidential_txout(&address, asset(1), 1_000);
        let mut pset = PartiallySignedTransaction::new_v2();
        add_input(&mut pset, txout, 0);
        let err = input_secrets(&pset, &BlindingKeyMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnblindedInputMissing(0)));
    }

    #[test]
    fn unbalanced_pset_is_rejected_before_blinding() {
        let spk = Script::from(vec![0x51]);
        let mut pset = PartiallySignedTransaction::new_v2();
        add_input(&mut pset, explicit_txout(asset(1), 1_000, &spk), 0);
        add_output(&mut pset, asset(1), 999, spk.clone());
        let err = blind_swap_pset(&mut pset, &BlindingKeyMap::new(), &map_for(&spk, &key(3)), 0)
            .unwrap_err();
        assert!(matches!(err, Error::Unbalanced(_)));
    }

    #[test]
    fn blind_then_verify_and_unblind() {
        let secp = Secp256k1::new();
        let blinding_key = key(9);
        let address = test_address(&secp, &blinding_key);
        let spk = address.script_pubkey();

        // One confidential and one explicit input, two blinded outputs and
        // an explicit fee.
        let (conf_in, _) = confidential_txout(&address, asset(1), 5_000);
        let mut pset = PartiallySignedTransaction::new_v2();
        add_input(&mut pset, conf_in, 0);
        add_input(&mut pset, explicit_txout(asset(2), 800, &spk), 1);
        add_output(&mut pset, asset(1), 4_000, spk.clone());
        add_output(&mut pset, asset(1), 1_000, spk.clone());
        add_output(&mut pset, asset(2), 800, Script::new());

        let keys = map_for(&spk, &blinding_key);
        let blinded = blind_swap_pset(&mut pset, &keys, &keys, 1).unwrap();
        assert_eq!(blinded, 2);

        let tx = pset.extract_tx().unwrap();
        let spent: Vec<TxOut> = pset
            .inputs()
            .iter()
            .map(|i| i.witness_utxo.clone().unwrap())
            .collect();
        verify_blinded(&tx, &spent).unwrap();

        assert!(matches!(tx.output[0].value, Value::Confidential(_)));
        assert!(matches!(tx.output[0].asset, Asset::Confidential(_)));
        assert_eq!(tx.output[2].value, Value::Explicit(800));

        let first = tx.output[0].unblind(&secp, blinding_key).unwrap();
        assert_eq!(first.asset, asset(1));
        assert_eq!(first.value, 4_000);
        let second = tx.output[1].unblind(&secp, blinding_key).unwrap();
        assert_eq!(second.value, 1_000);
    }

    #[test]
    fn reblinding_is_not_deterministic() {
        let secp = Secp256k1::new();
        let blinding_key = key(9);
        let address = test_address(&secp, &blinding_key);
        let spk = address.script_pubkey();
        let keys = map_for(&spk, &blinding_key);

        let mut base = PartiallySignedTransaction::new_v2();
        add_input(&mut base, explicit_txout(asset(1), 1_000, &spk), 0);
        add_output(&mut base, asset(1), 900, spk.clone());
        add_output(&mut base, asset(1), 100, Script::new());

        let mut a = base.clone();
        let mut b = base;
        blind_swap_pset(&mut a, &keys, &keys, 0).unwrap();
        blind_swap_pset(&mut b, &keys, &keys, 0).unwrap();
        assert_ne!(a.extract_tx().unwrap(), b.extract_tx().unwrap());
    }

    #[test]
    fn no_keys_leaves_outputs_explicit() {
        let mut pset = counterparty_pset(asset(1), 100, asset(1), 100);
        let before = pset.clone();
        let blinded = blind_swap_pset(&mut pset, &BlindingKeyMap::new(), &BlindingKeyMap::new(), 0)
            .unwrap();
        assert_eq!(blinded, 0);
        assert_eq!(pset, before);
    }
}
