// Define the canonical token records shared by the resolver, the cache and the
// protocol integrations. Addresses and chain ids are strongly typed so that
// identifiers and cache keys are always built from validated input.

use alloy::primitives::{hex, Address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::{validate_evm_address, ValidationError};

pub type Timestamp = i64;

/// Decimals assumed for a token whose contract did not report any.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Protocol tag given to tokens that look like airdrop spam.
pub const SPAM_PROTOCOL: &str = "spam";

pub fn ts_now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const ETHEREUM: ChainId = ChainId(1);
    pub const OPTIMISM: ChainId = ChainId(10);
    pub const BINANCE_SC: ChainId = ChainId(56);
    pub const GNOSIS: ChainId = ChainId(100);
    pub const POLYGON_POS: ChainId = ChainId(137);
    pub const BASE: ChainId = ChainId(8453);
    pub const ARBITRUM_ONE: ChainId = ChainId(42161);

    pub fn serialize_for_db(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated EVM address. Always rendered lowercase, so identifiers and
/// cache keys never depend on the letter case a source used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress(Address);

impl EvmAddress {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Address> for EvmAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl FromStr for EvmAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_evm_address(s)?;
        // validated above: a two character prefix and 40 hex digits
        s.trim()
            .get(2..)
            .unwrap_or_default()
            .parse::<Address>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidEvmAddress(s.to_string()))
    }
}

impl TryFrom<String> for EvmAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EvmAddress> for String {
    fn from(address: EvmAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_prefixed(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvmTokenKind {
    Erc20,
    Erc721,
}

impl EvmTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvmTokenKind::Erc20 => "erc20",
            EvmTokenKind::Erc721 => "erc721",
        }
    }
}

impl FromStr for EvmTokenKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "erc20" => Ok(EvmTokenKind::Erc20),
            "erc721" => Ok(EvmTokenKind::Erc721),
            other => Err(ValidationError::UnknownTokenKind(other.to_string())),
        }
    }
}

impl fmt::Display for EvmTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `eip155:<chain>/<kind>:<address>`. This is the primary key of a token and
/// never changes once the row exists.
pub fn evm_address_to_identifier(
    address: &EvmAddress,
    chain_id: ChainId,
    token_kind: EvmTokenKind,
) -> String {
    format!("eip155:{}/{}:{}", chain_id, token_kind, address)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingToken {
    pub address: EvmAddress,
    pub token_kind: EvmTokenKind,
    /// Caller supplied. Weights of a token's underlying set are not normalized.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmToken {
    pub identifier: String,
    pub chain_id: ChainId,
    pub address: EvmAddress,
    pub token_kind: EvmTokenKind,
    pub name: String,
    pub symbol: Option<String>,
    pub decimals: u8,
    pub protocol: Option<String>,
    pub underlying_tokens: Vec<UnderlyingToken>,
}

impl EvmToken {
    pub fn builder(chain_id: ChainId, address: EvmAddress, token_kind: EvmTokenKind) -> EvmTokenBuilder {
        EvmTokenBuilder {
            identifier: evm_address_to_identifier(&address, chain_id, token_kind),
            chain_id,
            address,
            token_kind,
            name: None,
            symbol: None,
            decimals: None,
            protocol: None,
            underlying_tokens: Vec::new(),
        }
    }

    /// Start a replacement value from this token. The original is left untouched.
    pub fn to_builder(&self) -> EvmTokenBuilder {
        EvmTokenBuilder {
            identifier: self.identifier.clone(),
            chain_id: self.chain_id,
            address: self.address.clone(),
            token_kind: self.token_kind,
            name: Some(self.name.clone()),
            symbol: self.symbol.clone(),
            decimals: Some(self.decimals),
            protocol: self.protocol.clone(),
            underlying_tokens: self.underlying_tokens.clone(),
        }
    }

    /// A token whose name is its own identifier was stored without metadata.
    pub fn is_incomplete(&self) -> bool {
        self.name == self.identifier
    }
}

#[derive(Debug, Clone)]
pub struct EvmTokenBuilder {
    identifier: String,
    chain_id: ChainId,
    address: EvmAddress,
    token_kind: EvmTokenKind,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
    protocol: Option<String>,
    underlying_tokens: Vec<UnderlyingToken>,
}

impl EvmTokenBuilder {
    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn symbol(mut self, symbol: Option<String>) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn decimals(mut self, decimals: Option<u8>) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn protocol(mut self, protocol: Option<String>) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn underlying_tokens(mut self, underlying_tokens: Vec<UnderlyingToken>) -> Self {
        self.underlying_tokens = underlying_tokens;
        self
    }

    /// Missing name falls back to the identifier, missing decimals to 18.
    pub fn build(self) -> EvmToken {
        EvmToken {
            name: self.name.unwrap_or_else(|| self.identifier.clone()),
            identifier: self.identifier,
            chain_id: self.chain_id,
            address: self.address,
            token_kind: self.token_kind,
            symbol: self.symbol,
            decimals: self.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
            protocol: self.protocol,
            underlying_tokens: self.underlying_tokens,
        }
    }
}

/// Where a token was first seen. Carried into the new-token notification.
#[derive(Debug, Clone)]
pub struct TokenEncounterInfo {
    pub tx_ref: Option<String>,
    pub description: Option<String>,
    pub should_notify: bool,
}

impl TokenEncounterInfo {
    pub fn from_tx(tx_ref: impl Into<String>) -> Self {
        Self {
            tx_ref: Some(tx_ref.into()),
            description: None,
            should_notify: true,
        }
    }

    pub fn described(description: impl Into<String>) -> Self {
        Self {
            tx_ref: None,
            description: Some(description.into()),
            should_notify: true,
        }
    }

    pub fn silent(description: impl Into<String>) -> Self {
        Self {
            tx_ref: None,
            description: Some(description.into()),
            should_notify: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressbookEntry {
    pub address: EvmAddress,
    pub blockchain: ChainId,
    pub name: String,
}
