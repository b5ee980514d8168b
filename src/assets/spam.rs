use once_cell::sync::Lazy;
use regex::Regex;

// URLs, lure words, "$XYZ.something" names and a domain suffix glued to
// punctuation or a modifier symbol (e.g. "usdc․com").
static SPAM_ASSET_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        https:// |
        claim | visit | invited |
        ^\$.+\..+ |
        (\p{Sk}|\p{Po})+(com|io|site|xyz|li|org|cc|net|pm)+
        ",
    )
    .ok()
});

pub fn is_spam_token(symbol: Option<&str>, name: Option<&str>) -> bool {
    let Some(pattern) = SPAM_ASSET_PATTERN.as_ref() else {
        return false;
    };

    [symbol, name]
        .into_iter()
        .flatten()
        .any(|text| pattern.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_airdrop_lures() {
        assert!(is_spam_token(Some("Visit uniclaim.xyz"), None));
        assert!(is_spam_token(None, Some("https://scam.example")));
        assert!(is_spam_token(Some("$ETHG.io"), Some("Ether Gift")));
        assert!(is_spam_token(Some("USDC"), Some("usdc․com")));
    }

    #[test]
    fn leaves_regular_tokens_alone() {
        assert!(!is_spam_token(Some("USDC"), Some("USD Coin")));
        assert!(!is_spam_token(Some("crvUSD"), Some("Curve.Fi USD Stablecoin")));
        assert!(!is_spam_token(None, None));
    }
}
