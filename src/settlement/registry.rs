use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppResult, SettlementError};
use crate::settlement::models::ObligationRecord;

/// Source of the recurring payment streams a pipeline settles
#[async_trait]
pub trait PaymentRegistry: Send + Sync {
    /// Consistent snapshot of every known stream
    async fn list_obligations(&self) -> AppResult<Vec<ObligationRecord>>;
}

/// The Graph caps `first` at 1000 entities per query
const PAGE_SIZE: usize = 1000;

const PAYMENTS_QUERY: &str = r#"
query Payments($first: Int!, $skip: Int!) {
    payments(first: $first, skip: $skip) {
        streamId
        lastPaid
        ends
        frequency
        pool {
            token {
                address
            }
            poolContract
        }
    }
}"#;

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PaymentsData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PaymentsData {
    payments: Vec<PaymentRow>,
}

/// Subgraph entity; BigInt fields arrive as decimal strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRow {
    stream_id: String,
    last_paid: String,
    ends: String,
    frequency: String,
    pool: PoolRow,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolRow {
    token: TokenRow,
    pool_contract: String,
}

#[derive(Debug, Deserialize)]
struct TokenRow {
    address: String,
}

impl TryFrom<PaymentRow> for ObligationRecord {
    type Error = SettlementError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let parse = |field: &str, value: &str| {
            value.parse::<i64>().map_err(|_| {
                SettlementError::Registry(format!(
                    "stream {}: {} is not an integer: {:?}",
                    row.stream_id, field, value
                ))
            })
        };

        Ok(ObligationRecord {
            last_settled: parse("lastPaid", &row.last_paid)?,
            window_end: parse("ends", &row.ends)?,
            frequency: parse("frequency", &row.frequency)?,
            id: row.stream_id.clone(),
            settlement_target: row.pool.pool_contract.clone(),
            token_address: row.pool.token.address.clone(),
        })
    }
}

/// GraphQL subgraph client for the scheduled-transfers registry
pub struct SubgraphRegistry {
    client: Client,
    url: String,
}

impl SubgraphRegistry {
    pub fn new(url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn fetch_page(&self, skip: usize) -> AppResult<Vec<PaymentRow>> {
        let body = json!({
            "query": PAYMENTS_QUERY,
            "variables": { "first": PAGE_SIZE, "skip": skip },
        });

        let response: GraphResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(SettlementError::Registry(messages.join("; ")).into());
        }

        let data = response
            .data
            .ok_or_else(|| SettlementError::Registry("response has no data".to_string()))?;
        Ok(data.payments)
    }
}

#[async_trait]
impl PaymentRegistry for SubgraphRegistry {
    async fn list_obligations(&self) -> AppResult<Vec<ObligationRecord>> {
        let mut records = Vec::new();
        let mut skip = 0;

        loop {
            let page = self.fetch_page(skip).await?;
            let page_len = page.len();
            debug!("📄 Subgraph page at skip={} returned {} payments", skip, page_len);

            for row in page {
                records.push(ObligationRecord::try_from(row)?);
            }

            if page_len < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }

        info!("📊 Loaded {} payment streams from {}", records.len(), self.url);
        Ok(records)
    }
}
