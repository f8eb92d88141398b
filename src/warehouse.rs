use crate::config::WarehouseConfig;
use crate::constants::table_name_for;
use crate::error::{CleanerError, Result};
use crate::sink::{encode_csv, SinkMode, SinkReceipt, TableSink};
use crate::types::Table;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::info;

/// Bearer token for the warehouse load API, read from the environment so it
/// never lives in config.toml
pub const WAREHOUSE_TOKEN_ENV: &str = "EXPORT_CLEANER_WAREHOUSE_TOKEN";

/// Loads a finished table into the warehouse over HTTP. The load endpoint
/// replaces the destination table and auto-detects column types from the
/// CSV body, so the upload carries no schema of its own.
pub struct WarehouseSink {
    endpoint: String,
    dataset: String,
    client: reqwest::blocking::Client,
}

impl WarehouseSink {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(WarehouseSink {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            dataset: config.dataset.clone(),
            client,
        })
    }
}

impl TableSink for WarehouseSink {
    fn write(&mut self, table: &Table, name: &str, mode: SinkMode) -> Result<SinkReceipt> {
        let table_name = table_name_for(name);
        if mode == SinkMode::Append {
            return Err(CleanerError::SinkFailure {
                table: table_name,
                message: "warehouse loads are overwrite-only".to_string(),
            });
        }

        let bytes = encode_csv(table)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let url = format!(
            "{}/v1/datasets/{}/tables/{}/load",
            self.endpoint, self.dataset, table_name
        );

        let mut request = self
            .client
            .post(&url)
            .query(&[("mode", "overwrite"), ("autodetect", "true")])
            .header("Content-Type", "text/csv")
            .body(bytes);
        if let Ok(token) = std::env::var(WAREHOUSE_TOKEN_ENV) {
            if !token.is_empty() {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().map_err(|e| CleanerError::SinkFailure {
            table: table_name.clone(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(CleanerError::SinkFailure {
                table: table_name,
                message: format!("warehouse returned status {}: {}", status, body),
            });
        }

        let destination = format!("{}.{}", self.dataset, table_name);
        info!("Uploaded {} rows to warehouse table {}", table.len(), destination);
        Ok(SinkReceipt {
            destination,
            rows: table.len(),
            sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, Schema};
    use std::collections::BTreeMap;

    fn sample_table() -> Table {
        let schema = Schema::new(vec!["a".to_string()], &BTreeMap::new());
        Table {
            schema,
            rows: vec![vec![Cell::Int(1)]],
        }
    }

    #[test]
    fn test_append_is_rejected_before_any_request() {
        let config = WarehouseConfig {
            endpoint: "http://warehouse.invalid".to_string(),
            dataset: "pct".to_string(),
            timeout_seconds: 1,
        };
        let mut sink = WarehouseSink::new(&config).unwrap();
        let result = sink.write(&sample_table(), "week1 Orders.csv", SinkMode::Append);
        match result {
            Err(CleanerError::SinkFailure { table, message }) => {
                assert_eq!(table, "week1_Orders");
                assert!(message.contains("overwrite-only"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_endpoint_is_a_sink_failure() {
        let config = WarehouseConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            dataset: "pct".to_string(),
            timeout_seconds: 1,
        };
        let mut sink = WarehouseSink::new(&config).unwrap();
        let result = sink.write(&sample_table(), "t", SinkMode::Overwrite);
        assert!(matches!(result, Err(CleanerError::SinkFailure { .. })));
    }
}
