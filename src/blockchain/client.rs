use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::contracts::{IMulticall3, MULTICALL3_ADDRESS};
use super::{CallResult, ChainError, ChainQuery, ContractCall};
use crate::config::Config;
use crate::models::ChainId;

/// `eth_call` through an alloy HTTP provider. Batches go through Multicall3
/// so a page of calls costs one round trip. Every request carries the
/// configured timeout; there is no other way to stop a call in flight.
pub struct RpcClient {
    provider: DynProvider,
    chain_id: ChainId,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(config: &Config) -> Result<Self, ChainError> {
        Self::with_endpoint(&config.rpc_url, config.chain_id, config.rpc_timeout)
    }

    pub fn with_endpoint(rpc_url: &str, chain_id: ChainId, timeout: Duration) -> Result<Self, ChainError> {
        info!("Initializing RPC client for chain {} with endpoint: {}", chain_id, rpc_url);

        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| ChainError::InvalidEndpoint(format!("{}: {}", rpc_url, e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            chain_id,
            timeout,
        })
    }
}

#[async_trait]
impl ChainQuery for RpcClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn multicall(&self, calls: &[ContractCall]) -> Result<Vec<CallResult>, ChainError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let aggregate = IMulticall3::aggregate3Call {
            calls: calls
                .iter()
                .map(|call| IMulticall3::Call3 {
                    target: call.target.address(),
                    allowFailure: true,
                    callData: call.data.clone(),
                })
                .collect(),
        };
        let request = TransactionRequest::default()
            .to(MULTICALL3_ADDRESS)
            .input(aggregate.abi_encode().into());

        let data = tokio::time::timeout(self.timeout, self.provider.call(request))
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))??;
        let results = IMulticall3::aggregate3Call::abi_decode_returns(&data)?;

        if results.len() != calls.len() {
            return Err(ChainError::InvalidResponse(format!(
                "multicall returned {} results for {} calls",
                results.len(),
                calls.len()
            )));
        }
        debug!("Multicall of {} calls on chain {}", calls.len(), self.chain_id);

        // Calls to accounts without code succeed with empty data
        Ok(results
            .into_iter()
            .map(|result| CallResult {
                success: result.success && !result.returnData.is_empty(),
                data: result.returnData,
            })
            .collect())
    }
}
