//! View interfaces of the contracts the resolver and the protocol syncs talk to.

use alloy::primitives::{address, Address};
use alloy::sol;

/// Multicall3, deployed at the same address on every supported chain
pub const MULTICALL3_ADDRESS: Address = address!("0xca11bde05977b3631167028862be2a173976ca11");

sol! {
    interface IERC20Metadata {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }

    // Pre-standard tokens such as MKR return bytes32 metadata
    interface IERC20MetadataBytes32 {
        function name() external view returns (bytes32);
        function symbol() external view returns (bytes32);
    }

    interface IERC721Metadata {
        function name() external view returns (string);
        function symbol() external view returns (string);
    }

    interface ICurveAddressProvider {
        function get_address(uint256 id) external view returns (address);
    }

    interface ICurveMetaRegistry {
        function pool_count() external view returns (uint256);
        function pool_list(uint256 i) external view returns (address);
        function get_pool_name(address pool) external view returns (string);
        function get_gauge(address pool) external view returns (address);
        function get_lp_token(address pool) external view returns (address);
        function get_coins(address pool) external view returns (address[8]);
        function get_underlying_coins(address pool) external view returns (address[8]);
    }

    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calls) external payable returns (Result[] returnData);
    }
}
