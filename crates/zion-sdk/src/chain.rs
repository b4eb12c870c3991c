use std::collections::HashMap;
use std::time::Duration;

use lwk_wollet::elements::encode::{deserialize, serialize_hex};
use lwk_wollet::elements::secp256k1_zkp::SecretKey;
use lwk_wollet::elements::{Address, OutPoint, Script, Transaction, Txid};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::utxo::Utxo;

/// Where the daemon learns its unspents and sends finished transactions.
pub trait UtxoSource: Send + Sync {
    /// Unspent outputs paying to any of `addresses`, revealed with
    /// `blinding_keys`. Outputs none of the keys can reveal are skipped.
    fn fetch_unspents(&self, addresses: &[Address], blinding_keys: &[SecretKey])
    -> Result<Vec<Utxo>>;

    /// Broadcast a signed transaction and return its txid.
    fn broadcast(&self, tx: &Transaction) -> Result<Txid>;
}

/// Electrum script hash: SHA256(scriptPubKey) with reversed byte order.
pub fn electrum_script_hash(script_pubkey: &Script) -> String {
    use sha2::{Digest, Sha256};

    let mut hash = Sha256::digest(script_pubkey.as_bytes()).to_vec();
    hash.reverse();
    hex::encode(&hash)
}

fn reveal_all(
    entries: Vec<(OutPoint, Option<u32>)>,
    txs: &HashMap<Txid, Transaction>,
    blinding_keys: &[SecretKey],
    source_error: fn(String) -> Error,
) -> Result<Vec<Utxo>> {
    let mut utxos = Vec::new();
    for (outpoint, height) in entries {
        let tx = txs
            .get(&outpoint.txid)
            .ok_or_else(|| source_error(format!("transaction {} not found", outpoint.txid)))?;
        let txout = tx
            .output
            .get(outpoint.vout as usize)
            .ok_or_else(|| source_error(format!("{outpoint} vout out of range")))?
            .clone();
        match Utxo::reveal(outpoint, txout, height, blinding_keys) {
            Ok(utxo) => utxos.push(utxo),
            Err(e) => log::warn!("skipping unspent {outpoint}: {e}"),
        }
    }
    Ok(utxos)
}

/// Electrum-based UTXO source for Liquid.
pub struct ElectrumBackend {
    electrum_url: String,
}

impl ElectrumBackend {
    pub fn new(electrum_url: &str) -> Self {
        Self {
            electrum_url: electrum_url.to_string(),
        }
    }

    pub fn electrum_url(&self) -> &str {
        &self.electrum_url
    }

    /// Connect through lwk, reporting failures with `source_error`.
    fn lwk_client(&self, source_error: fn(String) -> Error) -> Result<lwk_wollet::ElectrumClient> {
        let url: lwk_wollet::ElectrumUrl = self
            .electrum_url
            .parse()
            .map_err(|e| source_error(format!("{:?}", e)))?;
        lwk_wollet::ElectrumClient::new(&url).map_err(|e| source_error(e.to_string()))
    }

    fn list_unspent(
        &self,
        client: &electrum_client::Client,
        script_pubkey: &Script,
    ) -> Result<Vec<(OutPoint, Option<u32>)>> {
        use electrum_client::ElectrumApi;

        let resp = client
            .raw_call(
                "blockchain.scripthash.listunspent",
                [electrum_client::Param::String(electrum_script_hash(
                    script_pubkey,
                ))],
            )
            .map_err(|e| Error::Electrum(e.to_string()))?;

        let entries = resp
            .as_array()
            .ok_or_else(|| Error::Electrum("expected array response".into()))?;

        let mut results = Vec::new();
        for entry in entries {
            let tx_hash_hex = entry["tx_hash"]
                .as_str()
                .ok_or_else(|| Error::Electrum("missing tx_hash".into()))?;
            let tx_pos = entry["tx_pos"]
                .as_u64()
                .ok_or_else(|| Error::Electrum("missing tx_pos".into()))?;
            // 0 or negative heights are mempool entries.
            let height = entry["height"]
                .as_i64()
                .filter(|h| *h > 0)
                .map(|h| h as u32);

            let txid: Txid = tx_hash_hex
                .parse()
                .map_err(|e| Error::Electrum(format!("bad tx_hash: {e}")))?;
            results.push((OutPoint::new(txid, tx_pos as u32), height));
        }
        Ok(results)
    }
}

impl UtxoSource for ElectrumBackend {
    fn fetch_unspents(
        &self,
        addresses: &[Address],
        blinding_keys: &[SecretKey],
    ) -> Result<Vec<Utxo>> {
        use lwk_wollet::blocking::BlockchainBackend;

        let client = electrum_client::Client::new(&self.electrum_url)
            .map_err(|e| Error::Electrum(e.to_string()))?;

        let mut entries = Vec::new();
        for address in addresses {
            entries.extend(self.list_unspent(&client, &address.script_pubkey())?);
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut txids: Vec<Txid> = entries.iter().map(|(op, _)| op.txid).collect();
        txids.sort();
        txids.dedup();
        let txs = self
            .lwk_client(Error::Electrum)?
            .get_transactions(&txids)
            .map_err(|e| Error::Electrum(e.to_string()))?;
        let txs: HashMap<Txid, Transaction> = txs.into_iter().map(|tx| (tx.txid(), tx)).collect();

        reveal_all(entries, &txs, blinding_keys, Error::Electrum)
    }

    fn broadcast(&self, tx: &Transaction) -> Result<Txid> {
        use lwk_wollet::blocking::BlockchainBackend;

        self.lwk_client(Error::Broadcast)?
            .broadcast(tx)
            .map_err(|e| Error::Broadcast(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    status: EsploraStatus,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    block_height: Option<u32>,
}

/// Esplora (block explorer REST) UTXO source.
pub struct EsploraBackend {
    base_url: String,
    timeout: Duration,
}

impl EsploraBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self, source_error: fn(String) -> Error) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| source_error(e.to_string()))
    }

    fn get_text(&self, client: &reqwest::blocking::Client, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = client
            .get(&url)
            .send()
            .map_err(|e| Error::Esplora(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Esplora(format!("GET {url}: status {}", resp.status())));
        }
        resp.text()
            .map_err(|e| Error::Esplora(format!("GET {url}: {e}")))
    }

    fn fetch_transaction(&self, client: &reqwest::blocking::Client, txid: &Txid) -> Result<Transaction> {
        let tx_hex = self.get_text(client, &format!("/tx/{txid}/hex"))?;
        let bytes = hex::decode(tx_hex.trim()).map_err(|e| Error::Esplora(format!("tx {txid}: {e}")))?;
        deserialize(&bytes).map_err(|e| Error::Esplora(format!("tx {txid}: {e}")))
    }
}

impl UtxoSource for EsploraBackend {
    fn fetch_unspents(
        &self,
        addresses: &[Address],
        blinding_keys: &[SecretKey],
    ) -> Result<Vec<Utxo>> {
        let client = self.client(Error::Esplora)?;

        let mut entries = Vec::new();
        for address in addresses {
            let body = self.get_text(&client, &format!("/address/{}/utxo", address.to_unconfidential()))?;
            let listed: Vec<EsploraUtxo> = serde_json::from_str(&body)
                .map_err(|e| Error::Esplora(format!("utxo list for {address}: {e}")))?;
            for entry in listed {
                let txid: Txid = entry
                    .txid
                    .parse()
                    .map_err(|e| Error::Esplora(format!("bad txid {}: {e}", entry.txid)))?;
                let height = entry
                    .status
                    .block_height
                    .filter(|_| entry.status.confirmed);
                entries.push((OutPoint::new(txid, entry.vout), height));
            }
        }

        let mut txs = HashMap::new();
        for (outpoint, _) in &entries {
            if !txs.contains_key(&outpoint.txid) {
                let tx = self.fetch_transaction(&client, &outpoint.txid)?;
                txs.insert(outpoint.txid, tx);
            }
        }

        reveal_all(entries, &txs, blinding_keys, Error::Esplora)
    }

    fn broadcast(&self, tx: &Transaction) -> Result<Txid> {
        let client = self.client(Error::Broadcast)?;
        let url = format!("{}/tx", self.base_url);
        let resp = client
            .post(&url)
            .body(serialize_hex(tx))
            .send()
            .map_err(|e| Error::Broadcast(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().map_err(|e| Error::Broadcast(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Broadcast(format!("status {status}: {}", body.trim())));
        }
        body.trim()
            .parse()
            .map_err(|e| Error::Broadcast(format!("bad txid in response: {e}")))
    }
}
