/// Geth-Compatible JSON-RPC Client
///
/// Speaks plain `eth_*` JSON-RPC 2.0 over HTTP for request/response calls,
/// the same raw-`serde_json::json!` style the teacher used for its RPC calls,
/// adapted from blocking to async and from Bitcoin-style methods to `eth_*`.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::errors::AppError;
use crate::types::{normalize_hex, Block, Header, Receipt, ReceiptStatus, Transaction};

use super::Client;

/// Ceiling on receipts per `eth_getTransactionReceipt` batch request, per
/// most providers' documented limits.
const MAX_BATCH: usize = 50;

pub struct GethClient {
    http_url: String,
    ws_url: String,
    http: reqwest::Client,
    request_id: std::sync::atomic::AtomicU64,
}

impl GethClient {
    pub fn new(http_url: String, ws_url: String) -> Self {
        GethClient {
            http_url,
            ws_url,
            http: reqwest::Client::new(),
            request_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, AppError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.http_url)
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        let parsed: Value = resp.json().await?;
        if let Some(err) = parsed.get("error") {
            return Err(AppError::Transport(format!("{method} rpc error: {err}")));
        }
        parsed
            .get("result")
            .cloned()
            .ok_or_else(|| AppError::Decode(format!("{method}: missing result field")))
    }

    /// Batched JSON-RPC request, chunked to `MAX_BATCH` per round trip,
    /// preserving the caller's hash ordering in the returned map.
    async fn batch_call(
        &self,
        method: &str,
        hashes: &[String],
    ) -> Result<HashMap<String, Value>, AppError> {
        let mut out = HashMap::with_capacity(hashes.len());
        for chunk in hashes.chunks(MAX_BATCH) {
            let batch: Vec<Value> = chunk
                .iter()
                .map(|h| {
                    serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": self.next_id(),
                        "method": method,
                        "params": [h],
                    })
                })
                .collect();
            let resp = self
                .http
                .post(&self.http_url)
                .json(&batch)
                .timeout(Duration::from_secs(10))
                .send()
                .await?;
            let parsed: Vec<Value> = resp.json().await?;
            for (hash, item) in chunk.iter().zip(parsed.iter()) {
                if let Some(result) = item.get("result") {
                    if !result.is_null() {
                        out.insert(hash.clone(), result.clone());
                    }
                }
            }
        }
        Ok(out)
    }

}

fn hex_u64(value: &Value, field: &str) -> Result<u64, AppError> {
    let s = value
        .as_str()
        .ok_or_else(|| AppError::Decode(format!("{field}: expected hex string")))?;
    let body = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(body, 16).map_err(|e| AppError::Decode(format!("{field}: {e}")))
}

fn header_from_json(v: &Value) -> Result<Header, AppError> {
    let hash = v
        .get("hash")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Decode("header missing hash".into()))?;
    let parent_hash = v
        .get("parentHash")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Decode("header missing parentHash".into()))?;
    let number = hex_u64(
        v.get("number")
            .ok_or_else(|| AppError::Decode("header missing number".into()))?,
        "number",
    )?;
    Ok(Header {
        hash: normalize_hex(hash),
        parent_hash: normalize_hex(parent_hash),
        number,
    })
}

fn block_from_json(v: &Value) -> Result<Block, AppError> {
    let header = header_from_json(v)?;
    let timestamp = hex_u64(
        v.get("timestamp")
            .ok_or_else(|| AppError::Decode("block missing timestamp".into()))?,
        "timestamp",
    )?;
    let txs = v
        .get("transactions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|t| t.as_object())
        .map(|t| {
            let hash = t.get("hash").and_then(Value::as_str).unwrap_or_default();
            let from = t.get("from").and_then(Value::as_str).unwrap_or_default();
            let to = t.get("to").and_then(Value::as_str);
            let value = t.get("value").and_then(Value::as_str).unwrap_or("0x0");
            Transaction {
                hash: normalize_hex(hash),
                from: normalize_hex(from),
                to: to.map(normalize_hex),
                value: value.to_string(),
            }
        })
        .collect();
    Ok(Block {
        number: header.number,
        hash: header.hash,
        parent_hash: header.parent_hash,
        timestamp,
        txs,
    })
}

fn receipt_from_json(v: &Value) -> Result<Receipt, AppError> {
    let status_hex = v
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Decode("receipt missing status".into()))?;
    let status = if status_hex == "0x1" {
        ReceiptStatus::Success
    } else {
        ReceiptStatus::Reverted
    };
    let gas_used = hex_u64(
        v.get("gasUsed")
            .ok_or_else(|| AppError::Decode("receipt missing gasUsed".into()))?,
        "gasUsed",
    )?;
    let effective_gas_price = v
        .get("effectiveGasPrice")
        .and_then(Value::as_str)
        .unwrap_or("0x0")
        .to_string();
    Ok(Receipt {
        status,
        gas_used,
        effective_gas_price,
    })
}

#[async_trait]
impl Client for GethClient {
    async fn get_block_by_hash(&self, hash: &str, full_tx: bool) -> Result<Header, AppError> {
        let result = self
            .call("eth_getBlockByHash", serde_json::json!([hash, full_tx]))
            .await?;
        header_from_json(&result)
    }

    async fn get_block_by_number(&self, number: u64, full_tx: bool) -> Result<Block, AppError> {
        let tag = format!("0x{number:x}");
        let result = self
            .call("eth_getBlockByNumber", serde_json::json!([tag, full_tx]))
            .await?;
        block_from_json(&result)
    }

    async fn get_tx_receipt(&self, hash: &str) -> Result<Receipt, AppError> {
        let result = self
            .call("eth_getTransactionReceipt", serde_json::json!([hash]))
            .await?;
        receipt_from_json(&result)
    }

    async fn batch_get_receipts(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, Receipt>, AppError> {
        let raw = self.batch_call("eth_getTransactionReceipt", hashes).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (hash, value) in raw {
            out.insert(hash, receipt_from_json(&value)?);
        }
        Ok(out)
    }

    async fn get_chain_id(&self) -> Result<u64, AppError> {
        let result = self.call("eth_chainId", serde_json::json!([])).await?;
        hex_u64(&result, "chainId")
    }

    async fn get_block_number(&self) -> Result<u64, AppError> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        hex_u64(&result, "blockNumber")
    }

    /// Opens the subscription socket and returns a channel of decoded
    /// `newHeads` notifications. Errors and stream-end both surface to the
    /// caller, which falls back to polling (spec §4.5).
    async fn subscribe_new_heads(
        &self,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<Header, AppError>>, AppError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.ws_url).await?;
        let (mut write, mut read) = futures::StreamExt::split(ws_stream);

        let sub_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newHeads"],
        });
        futures::SinkExt::send(&mut write, Message::Text(sub_request.to_string()))
            .await
            .map_err(AppError::from)?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(msg) = futures::StreamExt::next(&mut read).await {
                let text = match msg {
                    Ok(Message::Text(t)) => t,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let parsed: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        let _ = tx.send(Err(AppError::from(e))).await;
                        continue;
                    }
                };
                let Some(header_json) = parsed.pointer("/params/result") else {
                    continue;
                };
                match header_from_json(header_json) {
                    Ok(header) => {
                        if tx.send(Ok(header)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex_u64() {
        let v = Value::String("0x1a".into());
        assert_eq!(hex_u64(&v, "x").unwrap(), 26);
    }

    #[test]
    fn header_from_json_normalizes_case() {
        let v = serde_json::json!({
            "hash": "0xABC",
            "parentHash": "0xDEF",
            "number": "0x64",
        });
        let h = header_from_json(&v).unwrap();
        assert_eq!(h.hash, "0xabc");
        assert_eq!(h.parent_hash, "0xdef");
        assert_eq!(h.number, 100);
    }

    #[test]
    fn receipt_from_json_maps_status() {
        let v = serde_json::json!({
            "status": "0x1",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
        });
        let r = receipt_from_json(&v).unwrap();
        assert_eq!(r.status, ReceiptStatus::Success);
        assert_eq!(r.gas_used, 21000);
    }

    #[test]
    fn receipt_from_json_reverted_status() {
        let v = serde_json::json!({
            "status": "0x0",
            "gasUsed": "0x5208",
        });
        let r = receipt_from_json(&v).unwrap();
        assert_eq!(r.status, ReceiptStatus::Reverted);
    }
}
