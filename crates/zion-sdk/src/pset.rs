//! Appending the daemon's legs to a counterparty-built PSET.
//!
//! The counterparty's inputs and outputs keep their positions; the daemon's
//! legs are appended after them:
//!
//! ```text
//! inputs:  [counterparty..] [primary funding..] [fee funding..]
//! outputs: [counterparty..] receive -> receiving script
//!                           primary change -> change script   (if > 0)
//!                           fee change     -> change script   (if > 0)
//!                           fee            (empty script)
//! ```

use std::str::FromStr;

use lwk_wollet::elements::pset::PartiallySignedTransaction;
use lwk_wollet::elements::{AssetId, Script, Sequence};

use crate::error::{Error, Result};
use crate::utxo::Utxo;

/// Parse a base64 PSET.
pub fn decode_pset(pset_base64: &str) -> Result<PartiallySignedTransaction> {
    PartiallySignedTransaction::from_str(pset_base64.trim())
        .map_err(|e| Error::TransactionDecode(e.to_string()))
}

/// Serialize a PSET to base64.
pub fn encode_pset(pset: &PartiallySignedTransaction) -> String {
    pset.to_string()
}

/// Parse a 64-hex-char asset id.
pub fn parse_asset_id(asset_hex: &str) -> Result<AssetId> {
    let trimmed = asset_hex.trim();
    if trimmed.len() != 64 {
        return Err(Error::OutputConstruction(format!(
            "asset id must be 64 hex chars, got {}",
            trimmed.len()
        )));
    }
    AssetId::from_str(trimmed)
        .map_err(|e| Error::OutputConstruction(format!("bad asset id {trimmed}: {e}")))
}

/// Add a standard input spending `utxo`.
pub(crate) fn add_pset_input(pset: &mut PartiallySignedTransaction, utxo: &Utxo) {
    let input = lwk_wollet::elements::pset::Input {
        previous_txid: utxo.outpoint.txid,
        previous_output_index: utxo.outpoint.vout,
        witness_utxo: Some(utxo.txout.clone()),
        sequence: Some(Sequence::ENABLE_LOCKTIME_NO_RBF),
        ..Default::default()
    };
    pset.add_input(input);
}

/// Add an explicit output; blinding happens later.
pub(crate) fn add_explicit_output(
    pset: &mut PartiallySignedTransaction,
    asset: AssetId,
    amount: u64,
    script_pubkey: Script,
) {
    let output = lwk_wollet::elements::pset::Output {
        amount: Some(amount),
        asset: Some(asset),
        script_pubkey,
        ..Default::default()
    };
    pset.add_output(output);
}

/// What the daemon appends to a swap PSET.
#[derive(Debug, Clone)]
pub struct SwapLegs {
    /// UTXOs funding the asset the counterparty receives.
    pub funding_utxos: Vec<Utxo>,
    pub funding_asset: AssetId,
    pub funding_change: u64,
    /// UTXOs funding the fee allowance.
    pub fee_utxos: Vec<Utxo>,
    pub fee_asset: AssetId,
    pub fee_amount: u64,
    pub fee_change: u64,
    /// Asset and amount the daemon receives from the counterparty.
    pub receive_asset: AssetId,
    pub receive_amount: u64,
    pub receive_script: Script,
    pub change_script: Script,
}

/// Indices of everything [`append_swap_legs`] added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedLegs {
    pub inputs: Vec<usize>,
    pub receive_output: usize,
    pub change_outputs: Vec<usize>,
    pub fee_output: usize,
}

impl AppendedLegs {
    /// Outputs that pay the daemon and get blinded to its keys.
    pub fn wallet_outputs(&self) -> Vec<usize> {
        let mut outputs = vec![self.receive_output];
        outputs.extend(&self.change_outputs);
        outputs
    }
}

/// Append the daemon's inputs and outputs. Never touches existing entries.
pub fn append_swap_legs(
    pset: &mut PartiallySignedTransaction,
    legs: &SwapLegs,
) -> Result<AppendedLegs> {
    if legs.receive_amount == 0 {
        return Err(Error::OutputConstruction("receive amount is zero".into()));
    }
    if legs.funding_utxos.is_empty() {
        return Err(Error::OutputConstruction("no funding inputs".into()));
    }

    let mut inputs = Vec::new();
    for utxo in legs.funding_utxos.iter().chain(&legs.fee_utxos) {
        inputs.push(pset.n_inputs());
        add_pset_input(pset, utxo);
    }

    let receive_output = pset.n_outputs();
    add_explicit_output(
        pset,
        legs.receive_asset,
        legs.receive_amount,
        legs.receive_script.clone(),
    );

    let mut change_outputs = Vec::new();
    for (asset, change) in [
        (legs.funding_asset, legs.funding_change),
        (legs.fee_asset, legs.fee_change),
    ] {
        if change > 0 {
            change_outputs.push(pset.n_outputs());
            add_explicit_output(pset, asset, change, legs.change_script.clone());
        }
    }

    let fee_output = pset.n_outputs();
    add_explicit_output(pset, legs.fee_asset, legs.fee_amount, Script::new());

    Ok(AppendedLegs {
        inputs,
        receive_output,
        change_outputs,
        fee_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{counterparty_pset, explicit_utxo};

    fn asset(b: u8) -> AssetId {
        AssetId::from_slice(&[b; 32]).unwrap()
    }

    fn legs(funding_change: u64, fee_change: u64) -> SwapLegs {
        SwapLegs {
            funding_utxos: vec![explicit_utxo(asset(2), 1_000 + funding_change, 10, Some(1))],
            funding_asset: asset(2),
            funding_change,
            fee_utxos: vec![explicit_utxo(asset(3), 650 + fee_change, 11, Some(1))],
            fee_asset: asset(3),
            fee_amount: 650,
            fee_change,
            receive_asset: asset(1),
            receive_amount: 500,
            receive_script: Script::from(vec![0x51]),
            change_script: Script::from(vec![0x52]),
        }
    }

    #[test]
    fn appends_after_counterparty_entries() {
        let mut pset = counterparty_pset(asset(1), 500, asset(2), 1_000);
        let before_inputs = pset.inputs().to_vec();
        let before_outputs = pset.outputs().to_vec();

        let appended = append_swap_legs(&mut pset, &legs(200, 50)).unwrap();

        assert_eq!(&pset.inputs()[..before_inputs.len()], &before_inputs[..]);
        assert_eq!(&pset.outputs()[..before_outputs.len()], &before_outputs[..]);
        assert_eq!(appended.inputs, vec![1, 2]);
        assert_eq!(appended.receive_output, 1);
        assert_eq!(appended.change_outputs, vec![2, 3]);
        assert_eq!(appended.fee_output, 4);
        assert_eq!(pset.n_outputs(), 5);

        let fee = &pset.outputs()[4];
        assert!(fee.script_pubkey.is_empty());
        assert_eq!(fee.amount, Some(650));
        let receive = &pset.outputs()[1];
        assert_eq!(receive.asset, Some(asset(1)));
        assert_eq!(receive.amount, Some(500));
        assert_eq!(receive.script_pubkey, Script::from(vec![0x51]));
    }

    #[test]
    fn zero_change_adds_no_change_output() {
        let mut pset = counterparty_pset(asset(1), 500, asset(2), 1_000);
        let appended = append_swap_legs(&mut pset, &legs(0, 0)).unwrap();
        assert!(appended.change_outputs.is_empty());
        assert_eq!(appended.wallet_outputs(), vec![1]);
        assert_eq!(pset.n_outputs(), 3);
    }

    #[test]
    fn inputs_carry_witness_utxo() {
        let mut pset = counterparty_pset(asset(1), 500, asset(2), 1_000);
        let legs = legs(0, 0);
        append_swap_legs(&mut pset, &legs).unwrap();
        let input = &pset.inputs()[1];
        assert_eq!(input.previous_output_index, 10);
        assert_eq!(input.witness_utxo.as_ref(), Some(&legs.funding_utxos[0].txout));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_pset("definitely not a pset"),
            Err(Error::TransactionDecode(_))
        ));
    }

    #[test]
    fn encode_then_decode_preserves_pset() {
        let pset = counterparty_pset(asset(1), 500, asset(2), 1_000);
        let decoded = decode_pset(&encode_pset(&pset)).unwrap();
        assert_eq!(decoded, pset);
    }

    #[test]
    fn asset_id_must_be_32_byte_hex() {
        assert!(parse_asset_id(&"ab".repeat(32)).is_ok());
        assert!(matches!(
            parse_asset_id("abcd"),
            Err(Error::OutputConstruction(_))
        ));
        assert!(matches!(
            parse_asset_id(&"zz".repeat(32)),
            Err(Error::OutputConstruction(_))
        ));
    }
}
