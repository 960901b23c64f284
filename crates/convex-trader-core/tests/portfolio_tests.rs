use chrono::{NaiveDate, NaiveDateTime};
use convex_trader_core::{
    ConvexTraderError, Portfolio, PortfolioSnapshot, PortfolioState, Trade, TradeSide, MAX_HOLDING,
};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};

// ===========================================================================
// Portfolio state and trade log tests
// ===========================================================================

fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn buy(symbol: &str, qty: u64) -> Trade {
    Trade::new(symbol, qty, dec!(150.0), ts(), TradeSide::Buy).unwrap()
}

fn sell(symbol: &str, qty: u64) -> Trade {
    Trade::new(symbol, qty, dec!(150.0), ts(), TradeSide::Sell).unwrap()
}

// ---------------------------------------------------------------------------
// Trade construction
// ---------------------------------------------------------------------------

#[test]
fn test_trade_rejects_invalid_fields() {
    assert!(matches!(
        Trade::new("", 10, dec!(1), ts(), TradeSide::Buy),
        Err(ConvexTraderError::Validation { .. })
    ));
    assert!(Trade::new("AAPL", 0, dec!(1), ts(), TradeSide::Buy).is_err());
    assert!(Trade::new("AAPL", 10, dec!(0), ts(), TradeSide::Buy).is_err());
    assert!(Trade::new("AAPL", 10, dec!(-1), ts(), TradeSide::Sell).is_err());
}

#[test]
fn test_trade_json_is_validated() {
    let json = r#"{"symbol": "AAPL", "quantity": 0, "price": "10",
                   "timestamp": "2023-01-01T09:30:00", "side": "BUY"}"#;
    let trade: Trade = serde_json::from_str(json).unwrap();
    assert!(trade.validate().is_err());
}

// ---------------------------------------------------------------------------
// Holdings and weights
// ---------------------------------------------------------------------------

#[test]
fn test_buy_sequence_conserves_quantity() {
    let mut state = PortfolioState::new();
    let buys = [("AAPL", 100), ("GOOGL", 50), ("AAPL", 25), ("MSFT", 75)];
    for (s, q) in buys {
        state.apply_trade(&buy(s, q)).unwrap();
    }
    let held: f64 = state.holdings_vector().iter().sum();
    assert_eq!(held, 250.0);
    let total: f64 = state.weights_vector().iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(state.symbols(), &["AAPL", "GOOGL", "MSFT"]);
}

#[test]
fn test_reference_weights() {
    let mut state = PortfolioState::new();
    state.apply_trade(&buy("AAPL", 100)).unwrap();
    state.apply_trade(&buy("GOOGL", 50)).unwrap();
    state.apply_trade(&buy("MSFT", 75)).unwrap();
    let w = state.weights();
    assert!((w["AAPL"] - 100.0 / 225.0).abs() < 1e-12);
    assert!((w["GOOGL"] - 50.0 / 225.0).abs() < 1e-12);
    assert!((w["MSFT"] - 75.0 / 225.0).abs() < 1e-12);
}

#[test]
fn test_close_and_reopen_reuses_slot() {
    let mut state = PortfolioState::new();
    state.apply_trade(&buy("AAPL", 10)).unwrap();
    state.apply_trade(&buy("MSFT", 10)).unwrap();
    state.apply_trade(&sell("AAPL", 10)).unwrap();
    assert!(!state.holdings().contains_key("AAPL"));
    assert_eq!(state.index_of("AAPL"), Some(0));
    assert_eq!(state.weights_vector(), &[0.0, 1.0]);

    state.apply_trade(&buy("AAPL", 30)).unwrap();
    assert_eq!(state.index_of("AAPL"), Some(0));
    assert_eq!(state.len(), 2);
    assert_eq!(state.weights_vector(), &[0.75, 0.25]);
}

#[test]
fn test_oversell_is_rejected_without_side_effects() {
    let mut p = Portfolio::new();
    p.execute_trade(buy("AAPL", 10)).unwrap();
    let before = p.snapshot();
    let err = p.execute_trade(sell("AAPL", 11)).unwrap_err();
    assert_eq!(
        err,
        ConvexTraderError::InsufficientHoldings {
            symbol: "AAPL".into(),
            held: 10,
            requested: 11,
        }
    );
    assert_eq!(p.snapshot(), before);
    assert_eq!(p.trades().len(), 1);
}

#[test]
fn test_total_value() {
    let mut state = PortfolioState::new();
    state.apply_trade(&buy("AAPL", 100)).unwrap();
    state.apply_trade(&buy("GOOGL", 50)).unwrap();
    let prices: HashMap<String, _> = [
        ("AAPL".to_string(), dec!(150)),
        ("GOOGL".to_string(), dec!(2500)),
    ]
    .into_iter()
    .collect();
    assert_eq!(state.total_value(&prices).unwrap(), dec!(140000));

    let partial: HashMap<String, _> = [("AAPL".to_string(), dec!(150))].into_iter().collect();
    assert_eq!(
        state.total_value(&partial).unwrap_err(),
        ConvexTraderError::MissingPrice("GOOGL".into())
    );
}

#[test]
fn test_snapshot_json_round_trip() {
    let mut p = Portfolio::new();
    p.execute_trade(buy("MSFT", 75)).unwrap();
    p.execute_trade(buy("AAPL", 100)).unwrap();
    p.execute_trade(sell("MSFT", 75)).unwrap();

    let json = serde_json::to_string(&p.snapshot()).unwrap();
    let restored = Portfolio::from_snapshot(&serde_json::from_str(&json).unwrap()).unwrap();
    assert_eq!(restored.state().symbols(), p.state().symbols());
    assert_eq!(restored.state().weights_vector(), p.state().weights_vector());
}

#[test]
fn test_huge_buys_rejected_before_logging() {
    let mut p = Portfolio::new();
    let lot = u64::MAX / 2 + 1;
    assert!(matches!(
        p.execute_trade(buy("AAPL", lot)),
        Err(ConvexTraderError::InvalidParameter { .. })
    ));
    assert!(p.trades().is_empty());
    assert!(p.state().symbols().is_empty());

    p.execute_trade(buy("AAPL", MAX_HOLDING - 10)).unwrap();
    assert!(p.execute_trade(buy("AAPL", 11)).is_err());
    p.execute_trade(buy("AAPL", 10)).unwrap();
    assert_eq!(p.trades().len(), 2);
    assert_eq!(p.state().holding("AAPL"), MAX_HOLDING);
    assert_eq!(p.state().holdings_vector(), &[MAX_HOLDING as f64]);
}

#[test]
fn test_snapshot_rejects_oversized_holding() {
    let snapshot = PortfolioSnapshot {
        order: vec!["AAPL".into()],
        holdings: BTreeMap::from([("AAPL".to_string(), MAX_HOLDING + 1)]),
    };
    assert!(matches!(
        PortfolioState::from_snapshot(&snapshot),
        Err(ConvexTraderError::Validation { .. })
    ));
}
