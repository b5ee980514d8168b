use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid EVM address format: {0}")]
    InvalidEvmAddress(String),

    #[error("Unknown token kind: {0}. Must be 'erc20' or 'erc721'")]
    UnknownTokenKind(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub fn validate_evm_address(address: &str) -> Result<(), ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::MissingParameter("address".to_string()));
    }

    let Some(hex_part) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) else {
        return Err(ValidationError::InvalidEvmAddress(address.to_string()));
    };

    // 20 bytes, hex encoded
    if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidEvmAddress(address.to_string()));
    }

    Ok(())
}

pub fn validate_chain_id(raw: &str) -> Result<u64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingParameter("chain_id".to_string()));
    }
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(ValidationError::InvalidParameter(format!("chain_id {}", raw))),
        Ok(id) => Ok(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_case_addresses() {
        assert!(validate_evm_address("0x6B175474E89094C44Da98b954EedeAC495271d0F").is_ok());
        assert!(validate_evm_address(" 0xdac17f958d2ee523a2206206994597c13d831ec7 ").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(
            validate_evm_address(""),
            Err(ValidationError::MissingParameter("address".to_string()))
        );
        assert!(validate_evm_address("6B175474E89094C44Da98b954EedeAC495271d0F").is_err());
        assert!(validate_evm_address("0x6B175474E89094C44Da98b954EedeAC495271d0").is_err());
        assert!(validate_evm_address("0xZZ175474E89094C44Da98b954EedeAC495271d0F").is_err());
    }

    #[test]
    fn chain_id_must_be_positive_integer() {
        assert_eq!(validate_chain_id("10"), Ok(10));
        assert!(validate_chain_id("0").is_err());
        assert!(validate_chain_id("eth").is_err());
    }
}
