use lwk_wollet::elements::{AssetId, OutPoint};

use crate::error::{Error, Result};
use crate::utxo::Utxo;

/// Inputs chosen to cover a target, plus the change left over.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub selected: Vec<Utxo>,
    pub change: u64,
}

impl Selection {
    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.selected.iter().map(|u| u.outpoint).collect()
    }

    pub fn total(&self) -> u64 {
        self.selected.iter().map(|u| u.value).sum()
    }
}

/// Greedily pick UTXOs of `target_asset` in the order given until their sum
/// reaches `target_amount`.
///
/// UTXOs whose outpoint is in `exclude` are skipped. On failure nothing is
/// selected.
pub fn select_unspents(
    utxos: &[Utxo],
    target_amount: u64,
    target_asset: AssetId,
    exclude: &[OutPoint],
) -> Result<Selection> {
    let mut selected = Vec::new();
    let mut total: u64 = 0;
    let mut available: u64 = 0;

    for utxo in utxos {
        if total >= target_amount {
            break;
        }
        if utxo.asset_id != target_asset
            || exclude.contains(&utxo.outpoint)
            || selected.iter().any(|s: &Utxo| s.outpoint == utxo.outpoint)
        {
            continue;
        }
        available = available.saturating_add(utxo.value);
        total = total
            .checked_add(utxo.value)
            .ok_or_else(|| Error::InsufficientFunds("selected amount overflows".into()))?;
        selected.push(utxo.clone());
    }

    if total < target_amount {
        return Err(Error::InsufficientFunds(format!(
            "need {} of asset {}, found {} (excluding {} outpoints)",
            target_amount,
            target_asset,
            available,
            exclude.len()
        )));
    }

    Ok(Selection {
        change: total - target_amount,
        selected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::explicit_utxo;

    fn asset(b: u8) -> AssetId {
        AssetId::from_slice(&[b; 32]).unwrap()
    }

    fn utxo_set() -> Vec<Utxo> {
        vec![
            explicit_utxo(asset(1), 30, 0, Some(1)),
            explicit_utxo(asset(2), 500, 1, Some(1)),
            explicit_utxo(asset(1), 50, 2, None),
            explicit_utxo(asset(1), 20, 3, Some(2)),
        ]
    }

    #[test]
    fn selects_in_discovery_order_with_change() {
        let selection = select_unspents(&utxo_set(), 60, asset(1), &[]).unwrap();
        let vouts: Vec<u32> = selection.selected.iter().map(|u| u.outpoint.vout).collect();
        assert_eq!(vouts, vec![0, 2]);
        assert_eq!(selection.total(), 80);
        assert_eq!(selection.change, 20);
    }

    #[test]
    fn exact_amount_leaves_no_change() {
        let selection = select_unspents(&utxo_set(), 100, asset(1), &[]).unwrap();
        assert_eq!(selection.selected.len(), 3);
        assert_eq!(selection.change, 0);
    }

    #[test]
    fn insufficient_funds_selects_nothing() {
        let err = select_unspents(&utxo_set(), 101, asset(1), &[]).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds(_)));
        let err = select_unspents(&utxo_set(), 1, asset(9), &[]).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds(_)));
    }

    #[test]
    fn excluded_outpoints_are_skipped() {
        let utxos = utxo_set();
        let first = select_unspents(&utxos, 30, asset(1), &[]).unwrap();
        let second = select_unspents(&utxos, 30, asset(1), &first.outpoints()).unwrap();
        assert!(
            second
                .outpoints()
                .iter()
                .all(|op| !first.outpoints().contains(op))
        );
        assert_eq!(second.selected[0].outpoint.vout, 2);
    }

    #[test]
    fn selection_is_a_duplicate_free_subset() {
        let mut utxos = utxo_set();
        utxos.push(utxos[0].clone());
        for target in [1u64, 29, 30, 31, 79, 80, 100] {
            let selection = select_unspents(&utxos, target, asset(1), &[]).unwrap();
            assert!(selection.total() >= target);
            assert_eq!(selection.change, selection.total() - target);
            let mut outpoints = selection.outpoints();
            outpoints.dedup();
            assert_eq!(outpoints.len(), selection.selected.len());
            assert!(selection.selected.iter().all(|s| utxos.contains(s)));
        }
    }

    #[test]
    fn zero_target_selects_nothing() {
        let selection = select_unspents(&utxo_set(), 0, asset(1), &[]).unwrap();
        assert!(selection.selected.is_empty());
        assert_eq!(selection.change, 0);
    }
}
