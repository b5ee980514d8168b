#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolValue;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::blockchain::contracts::{ICurveAddressProvider, ICurveMetaRegistry};
    use crate::models::{ChainId, EvmAddress};
    use crate::sync::curve::{curve_chain_name, parse_curve_api_response, CurveIntegration, CURVE_ADDRESS_PROVIDER};
    use crate::sync::{ProtocolIntegration, ProtocolItem, SyncError, TokenRef};
    use crate::tests::{address, pool_item, ScriptedChain};

    fn coins(list: &[u32]) -> Vec<u8> {
        let mut slots = [Address::ZERO; 8];
        for (slot, n) in slots.iter_mut().zip(list) {
            *slot = address(*n).address();
        }
        (slots,).abi_encode_params()
    }

    fn encoded(address: &EvmAddress) -> Vec<u8> {
        (address.address(),).abi_encode_params()
    }

    /// Metaregistry 900 lists pools 1, 2 and 3. Pool 3 reverts on `get_coins`.
    fn metaregistry_chain() -> ScriptedChain {
        let registry = address(900);
        let provider = EvmAddress::from(CURVE_ADDRESS_PROVIDER);
        let pool = |n: u32| address(n).address();

        ScriptedChain::new()
            .returning(
                &provider,
                ICurveAddressProvider::get_addressCall { id: U256::from(7) },
                encoded(&registry),
            )
            .returning(&registry, ICurveMetaRegistry::pool_countCall {}, (U256::from(3),).abi_encode_params())
            .returning(&registry, ICurveMetaRegistry::pool_listCall { i: U256::from(0) }, encoded(&address(1)))
            .returning(&registry, ICurveMetaRegistry::pool_listCall { i: U256::from(1) }, encoded(&address(2)))
            .returning(&registry, ICurveMetaRegistry::pool_listCall { i: U256::from(2) }, encoded(&address(3)))
            .returning(
                &registry,
                ICurveMetaRegistry::get_pool_nameCall { pool: pool(2) },
                ("Curve.fi USDC/USDT".to_string(),).abi_encode_params(),
            )
            .returning(&registry, ICurveMetaRegistry::get_gaugeCall { pool: pool(2) }, (Address::ZERO,).abi_encode_params())
            .returning(&registry, ICurveMetaRegistry::get_lp_tokenCall { pool: pool(2) }, encoded(&address(12)))
            .returning(&registry, ICurveMetaRegistry::get_coinsCall { pool: pool(2) }, coins(&[102, 103]))
            .returning(
                &registry,
                ICurveMetaRegistry::get_underlying_coinsCall { pool: pool(2) },
                coins(&[202, 203]),
            )
            .returning(&registry, ICurveMetaRegistry::get_gaugeCall { pool: pool(3) }, encoded(&address(23)))
            .returning(&registry, ICurveMetaRegistry::get_lp_tokenCall { pool: pool(3) }, encoded(&address(13)))
    }

    fn curve(chain: ScriptedChain) -> CurveIntegration {
        CurveIntegration::with_endpoint("http://127.0.0.1:9/{chain}", Duration::from_secs(1), 2, Arc::new(chain)).unwrap()
    }

    #[test]
    fn chain_names_follow_the_api_slugs() {
        assert_eq!(curve_chain_name(ChainId::ETHEREUM), Some("ethereum"));
        assert_eq!(curve_chain_name(ChainId::GNOSIS), Some("xdai"));
        assert_eq!(curve_chain_name(ChainId::ARBITRUM_ONE), Some("arbitrum"));
        assert_eq!(curve_chain_name(ChainId(324)), None);
    }

    #[test]
    fn failed_response_is_an_error() {
        let result = parse_curve_api_response(&json!({"success": false, "err": "oops"}));
        assert!(matches!(result, Err(SyncError::Remote(_))));

        let result = parse_curve_api_response(&json!({"success": true, "data": {}}));
        assert!(matches!(result, Err(SyncError::Remote(_))));
    }

    #[test]
    fn pools_are_parsed_with_their_tokens() {
        let body = json!({
            "success": true,
            "data": {
                "poolData": [
                    {
                        "address": address(1).to_string(),
                        "name": "Curve.fi DAI/USDC/USDT",
                        "lpTokenAddress": address(10).to_string(),
                        "gaugeAddress": address(20).to_string(),
                        "coins": [
                            {"address": address(101).to_string()},
                            {"address": address(102).to_string()}
                        ]
                    },
                    {
                        "address": address(2).to_string(),
                        "name": "",
                        "lpTokenAddress": address(11).to_string(),
                        "gaugeAddress": null,
                        "coins": [
                            {"address": address(103).to_string()},
                            {"address": address(104).to_string()}
                        ],
                        "underlyingCoins": [
                            {"address": address(203).to_string()},
                            {"address": address(204).to_string()}
                        ]
                    }
                ]
            }
        });

        let items = parse_curve_api_response(&body).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].address, address(1));
        assert_eq!(items[0].label.as_deref(), Some("Curve.fi DAI/USDC/USDT"));
        assert_eq!(items[0].lp_token, Some(address(10)));
        assert_eq!(items[0].gauge, Some(address(20)));
        assert_eq!(
            items[0].tokens,
            vec![TokenRef::plain(address(101)), TokenRef::plain(address(102))]
        );

        assert_eq!(items[1].label, None);
        assert_eq!(items[1].gauge, None);
        assert_eq!(
            items[1].tokens,
            vec![
                TokenRef {
                    address: address(103),
                    underlying: Some(address(203)),
                },
                TokenRef {
                    address: address(104),
                    underlying: Some(address(204)),
                },
            ]
        );
    }

    #[test]
    fn identical_underlying_coins_are_not_paired() {
        let coins = json!([{"address": address(101).to_string()}]);
        let body = json!({
            "success": true,
            "data": {"poolData": [{
                "address": address(1).to_string(),
                "lpTokenAddress": address(10).to_string(),
                "coins": coins,
                "underlyingCoins": coins,
            }]}
        });

        let items = parse_curve_api_response(&body).unwrap();
        assert_eq!(items[0].tokens, vec![TokenRef::plain(address(101))]);
    }

    #[test]
    fn malformed_pool_is_skipped() {
        let body = json!({
            "success": true,
            "data": {"poolData": [
                {"address": "not an address", "lpTokenAddress": address(10).to_string(), "coins": []},
                {"address": address(2).to_string(), "coins": []},
                {
                    "address": address(3).to_string(),
                    "lpTokenAddress": address(12).to_string(),
                    "gaugeAddress": "0x0000000000000000000000000000000000000000",
                    "coins": [{"address": address(105).to_string()}]
                }
            ]}
        });

        let items = parse_curve_api_response(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].address, address(3));
        // a zero gauge means the pool has none
        assert_eq!(items[0].gauge, None);
    }

    #[tokio::test]
    async fn metaregistry_count_is_the_remote_count() {
        let curve = curve(metaregistry_chain());
        assert_eq!(curve.remote_count().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn metaregistry_fallback_queries_only_unknown_pools() {
        let curve = curve(metaregistry_chain());
        let cached = vec![pool_item(1, &[101])];

        let items = curve.query_fallback(&cached).await.unwrap();

        assert_eq!(
            items,
            vec![
                pool_item(1, &[101]),
                ProtocolItem {
                    address: address(2),
                    label: Some("Curve.fi USDC/USDT".to_string()),
                    tokens: vec![
                        TokenRef {
                            address: address(102),
                            underlying: Some(address(202)),
                        },
                        TokenRef {
                            address: address(103),
                            underlying: Some(address(203)),
                        },
                    ],
                    lp_token: Some(address(12)),
                    gauge: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_metaregistry_fails_the_fallback() {
        let curve = curve(ScriptedChain::new());
        assert!(matches!(curve.query_fallback(&[]).await, Err(SyncError::Chain(_))));
    }
}
