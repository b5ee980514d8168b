// Chain-query capability consumed by the resolver and the protocol syncs.
// RpcClient is the alloy provider implementation; tests supply their own.

pub mod client;
pub mod contracts;

use alloy::primitives::{Bytes, FixedBytes};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ChainId, EvmAddress};
use contracts::{IERC20Metadata, IERC20MetadataBytes32, IERC721Metadata};

pub use client::RpcClient;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] alloy::transports::TransportError),

    #[error("RPC request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid RPC endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Failed to decode return data: {0}")]
    Decode(#[from] alloy::sol_types::Error),

    #[error("Call to {0} failed")]
    CallFailed(String),
}

#[derive(Debug, Clone)]
pub struct ContractCall {
    pub target: EvmAddress,
    pub data: Bytes,
}

impl ContractCall {
    pub fn new<C: SolCall>(target: &EvmAddress, call: &C) -> Self {
        Self {
            target: target.clone(),
            data: call.abi_encode().into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallResult {
    pub success: bool,
    pub data: Bytes,
}

/// Decoded return value of a successful call. Reverts, empty return data
/// and undecodable data all give `None`.
pub fn decode_returns<C: SolCall>(result: &CallResult) -> Option<C::Return> {
    if !result.success || result.data.is_empty() {
        return None;
    }
    C::abi_decode_returns(&result.data).ok()
}

/// `string` metadata, or the legacy `bytes32` form when the return data is a
/// single word. Blank text gives `None`.
pub fn decode_text<S, B>(result: &CallResult) -> Option<String>
where
    S: SolCall<Return = String>,
    B: SolCall<Return = FixedBytes<32>>,
{
    let text = if result.data.len() == 32 {
        decode_returns::<B>(result).map(|word| {
            let end = word.iter().position(|b| *b == 0).unwrap_or(word.len());
            String::from_utf8_lossy(&word[..end]).into_owned()
        })
    } else {
        decode_returns::<S>(result)
    };

    text.map(|text| text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
        .filter(|text| !text.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Erc20Info {
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Erc721Info {
    pub symbol: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait ChainQuery: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Run all calls in one round trip. A failing call yields an unsuccessful
    /// result instead of failing the batch.
    async fn multicall(&self, calls: &[ContractCall]) -> Result<Vec<CallResult>, ChainError>;

    async fn call(&self, call: &ContractCall) -> Result<Bytes, ChainError> {
        let result = self
            .multicall(std::slice::from_ref(call))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        if !result.success {
            return Err(ChainError::CallFailed(call.target.to_string()));
        }
        Ok(result.data)
    }

    async fn erc20_info(&self, address: &EvmAddress) -> Result<Erc20Info, ChainError> {
        let calls = [
            ContractCall::new(address, &IERC20Metadata::decimalsCall {}),
            ContractCall::new(address, &IERC20Metadata::symbolCall {}),
            ContractCall::new(address, &IERC20Metadata::nameCall {}),
        ];
        let results = self.multicall(&calls).await?;

        Ok(Erc20Info {
            decimals: results
                .first()
                .and_then(decode_returns::<IERC20Metadata::decimalsCall>),
            symbol: results
                .get(1)
                .and_then(decode_text::<IERC20Metadata::symbolCall, IERC20MetadataBytes32::symbolCall>),
            name: results
                .get(2)
                .and_then(decode_text::<IERC20Metadata::nameCall, IERC20MetadataBytes32::nameCall>),
        })
    }

    async fn erc721_info(&self, address: &EvmAddress) -> Result<Erc721Info, ChainError> {
        let calls = [
            ContractCall::new(address, &IERC721Metadata::symbolCall {}),
            ContractCall::new(address, &IERC721Metadata::nameCall {}),
        ];
        let results = self.multicall(&calls).await?;

        Ok(Erc721Info {
            symbol: results
                .first()
                .and_then(decode_text::<IERC721Metadata::symbolCall, IERC20MetadataBytes32::symbolCall>),
            name: results
                .get(1)
                .and_then(decode_text::<IERC721Metadata::nameCall, IERC20MetadataBytes32::nameCall>),
        })
    }
}
