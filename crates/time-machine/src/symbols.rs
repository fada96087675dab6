//! Display ↔ exchange symbol naming.
//!
//! The exchange files use `XBT` for bitcoin while the UI shows `BTC`.

const DISPLAY_SYMBOLS: &[(&str, &str)] = &[
    ("XBTUSD", "BTCUSD"),
    ("XBTUSDT", "BTCUSDT"),
    ("ETHUSD", "ETHUSD"),
    ("ETHUSDT", "ETHUSDT"),
];

/// Name shown to users, e.g. `XBTUSD` -> `BTCUSD`
pub fn display_symbol(symbol: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    DISPLAY_SYMBOLS
        .iter()
        .find(|(exchange, _)| *exchange == symbol)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| symbol.replace("XBT", "BTC"))
}

/// Name used by exchange exports, e.g. `BTCUSD` -> `XBTUSD`
pub fn exchange_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase().replace("BTC", "XBT")
}

/// Whether two symbols name the same instrument
pub fn same_instrument(a: &str, b: &str) -> bool {
    display_symbol(a) == display_symbol(b)
}
