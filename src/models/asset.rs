use serde::Serialize;

/// An asset the pipeline knows how to label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackedAsset {
    /// CoinGecko coin id
    pub coin_id: &'static str,
    /// Lowercase ticker as CoinGecko reports it
    pub symbol: &'static str,
    pub name: &'static str,
}

pub const BITCOIN: TrackedAsset = TrackedAsset {
    coin_id: "bitcoin",
    symbol: "btc",
    name: "Bitcoin",
};

pub const ETHEREUM: TrackedAsset = TrackedAsset {
    coin_id: "ethereum",
    symbol: "eth",
    name: "Ethereum",
};

pub const BINANCE_COIN: TrackedAsset = TrackedAsset {
    coin_id: "binancecoin",
    symbol: "bnb",
    name: "BNB",
};

pub const CARDANO: TrackedAsset = TrackedAsset {
    coin_id: "cardano",
    symbol: "ada",
    name: "Cardano",
};

/// Coins polled by the collector, in polling order
pub const TRACKED_ASSETS: [TrackedAsset; 4] = [BITCOIN, ETHEREUM, BINANCE_COIN, CARDANO];

pub fn lookup(coin_id: &str) -> Option<TrackedAsset> {
    TRACKED_ASSETS
        .iter()
        .find(|asset| asset.coin_id == coin_id)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("cardano"), Some(CARDANO));
        assert_eq!(lookup("Bitcoin"), None);
        assert_eq!(lookup("dogecoin"), None);
    }
}
