use std::collections::HashMap;

use lwk_wollet::elements::AssetId;

use crate::utxo::Utxo;

/// Per-asset balance split by confirmation status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceInfo {
    pub total: u64,
    pub confirmed: u64,
    pub unconfirmed: u64,
}

/// Group revealed UTXOs by asset and sum them.
pub fn balances_by_asset(utxos: &[Utxo]) -> HashMap<AssetId, BalanceInfo> {
    let mut balances: HashMap<AssetId, BalanceInfo> = HashMap::new();
    for utxo in utxos {
        let entry = balances.entry(utxo.asset_id).or_default();
        entry.total = entry.total.saturating_add(utxo.value);
        if utxo.is_confirmed() {
            entry.confirmed = entry.confirmed.saturating_add(utxo.value);
        } else {
            entry.unconfirmed = entry.unconfirmed.saturating_add(utxo.value);
        }
    }
    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::explicit_utxo;

    fn asset(b: u8) -> AssetId {
        AssetId::from_slice(&[b; 32]).unwrap()
    }

    #[test]
    fn empty_set_yields_empty_map() {
        assert!(balances_by_asset(&[]).is_empty());
    }

    #[test]
    fn groups_and_splits_by_confirmation() {
        let utxos = vec![
            explicit_utxo(asset(1), 100, 0, Some(5)),
            explicit_utxo(asset(1), 40, 1, None),
            explicit_utxo(asset(2), 7, 2, Some(6)),
            explicit_utxo(asset(1), 60, 3, Some(7)),
        ];
        let balances = balances_by_asset(&utxos);
        assert_eq!(balances.len(), 2);
        assert_eq!(
            balances[&asset(1)],
            BalanceInfo {
                total: 200,
                confirmed: 160,
                unconfirmed: 40,
            }
        );
        assert_eq!(
            balances[&asset(2)],
            BalanceInfo {
                total: 7,
                confirmed: 7,
                unconfirmed: 0,
            }
        );
    }

    #[test]
    fn sums_saturate() {
        let utxos = vec![
            explicit_utxo(asset(1), u64::MAX, 0, Some(1)),
            explicit_utxo(asset(1), 1, 1, Some(1)),
        ];
        assert_eq!(balances_by_asset(&utxos)[&asset(1)].total, u64::MAX);
    }
}
