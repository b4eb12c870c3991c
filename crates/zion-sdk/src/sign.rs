//! Signing and finalization of P2WPKH inputs.

use lwk_wollet::elements::hashes::Hash as _;
use lwk_wollet::elements::opcodes::all::{OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160};
use lwk_wollet::elements::pset::{PartiallySignedTransaction, PsbtSighashType};
use lwk_wollet::elements::script::Builder;
use lwk_wollet::elements::secp256k1_zkp::{self, Message, Secp256k1, ecdsa};
use lwk_wollet::elements::sighash::SighashCache;
use lwk_wollet::elements::{EcdsaSighashType, Script, Transaction};

use crate::error::{Error, Result};
use crate::keys::RoleKeys;
use crate::wallet::Wallet;

/// BIP143 script code for a P2WPKH script pubkey.
fn p2wpkh_script_code(script_pubkey: &Script) -> Result<Script> {
    if !script_pubkey.is_v0_p2wpkh() {
        return Err(Error::Signer("input is not P2WPKH".into()));
    }
    let pubkey_hash = &script_pubkey.as_bytes()[2..22];
    Ok(Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(pubkey_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script())
}

/// Segwit v0 SIGHASH_ALL digest for input `index`.
pub fn input_sighash(pset: &PartiallySignedTransaction, index: usize) -> Result<Message> {
    let tx = pset
        .extract_tx()
        .map_err(|e| Error::Signer(format!("extract: {e}")))?;
    let input = pset
        .inputs()
        .get(index)
        .ok_or_else(|| Error::Signer(format!("input {index} out of range")))?;
    let prevout = input
        .witness_utxo
        .as_ref()
        .ok_or(Error::UnblindedInputMissing(index))?;
    let script_code = p2wpkh_script_code(&prevout.script_pubkey)?;
    let sighash = SighashCache::new(&tx).segwitv0_sighash(
        index,
        &script_code,
        prevout.value,
        EcdsaSighashType::All,
    );
    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Check a DER signature with trailing sighash byte against `pubkey`.
pub fn verify_signature(
    msg: &Message,
    sig_with_hashtype: &[u8],
    pubkey: &secp256k1_zkp::PublicKey,
) -> Result<()> {
    let Some((hash_type, der)) = sig_with_hashtype.split_last() else {
        return Err(Error::Signer("empty signature".into()));
    };
    if *hash_type != EcdsaSighashType::All as u8 {
        return Err(Error::Signer(format!("unexpected sighash type {hash_type:#x}")));
    }
    let sig = ecdsa::Signature::from_der(der).map_err(|e| Error::Signer(e.to_string()))?;
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(msg, &sig, pubkey)
        .map_err(|e| Error::Signer(e.to_string()))
}

fn sign_input(
    pset: &PartiallySignedTransaction,
    index: usize,
    keys: &RoleKeys,
) -> Result<Vec<u8>> {
    let msg = input_sighash(pset, index)?;
    let secp = Secp256k1::new();
    let sig = secp.sign_ecdsa(&msg, &keys.signing_key);
    if secp.verify_ecdsa(&msg, &sig, &keys.public_key).is_err() {
        return Err(Error::SignatureVerification(index));
    }
    let mut bytes = sig.serialize_der().to_vec();
    bytes.push(EcdsaSighashType::All as u8);
    Ok(bytes)
}

/// Sign exactly the inputs at `indices`, each of which must spend one of the
/// wallet's scripts.
///
/// All signatures are produced and self-verified before any is attached, so
/// on error `pset` is left untouched. Returns the signed input indices.
pub fn sign_inputs(
    pset: &mut PartiallySignedTransaction,
    wallet: &Wallet,
    indices: &[usize],
) -> Result<Vec<usize>> {
    let mut signatures = Vec::with_capacity(indices.len());
    for &index in indices {
        let input = pset
            .inputs()
            .get(index)
            .ok_or_else(|| Error::Signer(format!("input {index} out of range")))?;
        let prevout = input
            .witness_utxo
            .as_ref()
            .ok_or(Error::UnblindedInputMissing(index))?;
        let keys = wallet
            .keys_for_script(&prevout.script_pubkey)
            .ok_or_else(|| Error::Signer(format!("input {index} is not spendable by this wallet")))?;
        let sig = sign_input(pset, index, keys)?;
        signatures.push((index, keys.bitcoin_public_key(), sig));
    }

    let inputs = pset.inputs_mut();
    for (index, pubkey, sig) in signatures {
        let input = &mut inputs[index];
        input.partial_sigs.insert(pubkey, sig);
        input.sighash_type = Some(PsbtSighashType::from(EcdsaSighashType::All));
    }
    log::debug!("signed inputs {indices:?}");
    Ok(indices.to_vec())
}

/// Indices of the inputs whose previous output pays one of the wallet's scripts.
pub fn owned_inputs(pset: &PartiallySignedTransaction, wallet: &Wallet) -> Vec<usize> {
    pset.inputs()
        .iter()
        .enumerate()
        .filter(|(_, input)| {
            input
                .witness_utxo
                .as_ref()
                .is_some_and(|prevout| wallet.owns_script(&prevout.script_pubkey))
        })
        .map(|(index, _)| index)
        .collect()
}

/// Sign every input spending one of the wallet's scripts.
pub fn sign_owned_inputs(pset: &mut PartiallySignedTransaction, wallet: &Wallet) -> Result<Vec<usize>> {
    let owned = owned_inputs(pset, wallet);
    sign_inputs(pset, wallet, &owned)
}

/// Verify every partial signature of `pset` against its input's sighash.
pub fn verify_partial_sigs(pset: &PartiallySignedTransaction) -> Result<()> {
    for (index, input) in pset.inputs().iter().enumerate() {
        if input.partial_sigs.is_empty() {
            continue;
        }
        let msg = input_sighash(pset, index)?;
        for (pubkey, sig) in &input.partial_sigs {
            verify_signature(&msg, sig, &pubkey.inner)
                .map_err(|_| Error::SignatureVerification(index))?;
        }
    }
    Ok(())
}

/// Move each single P2WPKH partial signature into the final witness.
pub fn finalize_p2wpkh(pset: &mut PartiallySignedTransaction) -> Result<()> {
    for (index, input) in pset.inputs_mut().iter_mut().enumerate() {
        if input.final_script_witness.is_some() {
            continue;
        }
        if input.partial_sigs.len() != 1 {
            return Err(Error::Finalize(format!(
                "input {index} has {} signatures, expected 1",
                input.partial_sigs.len()
            )));
        }
        let Some((pubkey, sig)) = input.partial_sigs.iter().next() else {
            continue;
        };
        input.final_script_witness = Some(vec![sig.clone(), pubkey.to_bytes()]);
        input.partial_sigs.clear();
    }
    Ok(())
}

/// Validate, finalize and extract a fully signed PSET.
pub fn extract_transaction(mut pset: PartiallySignedTransaction) -> Result<Transaction> {
    verify_partial_sigs(&pset)?;
    finalize_p2wpkh(&mut pset)?;
    pset.extract_tx()
        .map_err(|e| Error::Finalize(format!("extract: {e}")))
}
