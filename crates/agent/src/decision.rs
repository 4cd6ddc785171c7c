//! Parsing and dispatch of LLM replies.
//!
//! Replies are expected to carry exactly one JSON object, possibly wrapped
//! in prose. [`extract_json_object`] cuts it out, the typed parsers validate
//! it against a closed action set, and [`execute_command`] applies the
//! result to the portfolio.

use moneta_common::{MonetaError, Portfolio, Result, Transaction};
use moneta_market::QuoteProvider;
use moneta_memory::ActionType;
use serde::Deserialize;

/// Extracts the first balanced JSON object from a string that may contain
/// other text.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;

    for (i, c) in s[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn reply_error(kind: &str, reply: &str) -> MonetaError {
    MonetaError::Agent(format!(
        "no JSON object in {kind} reply: {}",
        reply.chars().take(200).collect::<String>()
    ))
}

/// The two fields a reflection reply must provide.
#[derive(Debug, Deserialize)]
pub struct ReflectionNotes {
    pub evaluation: String,
    pub learning: String,
}

pub fn parse_reflection(reply: &str) -> Result<ReflectionNotes> {
    let json = extract_json_object(reply).ok_or_else(|| reply_error("reflection", reply))?;
    serde_json::from_str(json)
        .map_err(|e| MonetaError::Agent(format!("malformed reflection reply: {e}")))
}

/// A validated trading decision.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeCommand {
    Buy {
        symbol: String,
        cash_value: f64,
        expectation: String,
    },
    Sell {
        symbol: String,
        cash_value: f64,
        expectation: String,
    },
    Wait {
        expectation: String,
    },
}

/// Parses the decision reply into a [`TradeCommand`].
///
/// Action names outside buy/sell/wait are rejected, as are orders without a
/// symbol or with a missing or non-positive cash value.
pub fn parse_trade_command(reply: &str) -> Result<TradeCommand> {
    let json = extract_json_object(reply).ok_or_else(|| reply_error("decision", reply))?;
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| MonetaError::Agent(format!("malformed decision reply: {e}")))?;

    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            MonetaError::Agent("decision reply carries no 'action' field".to_string())
        })?;
    let expectation = value
        .get("expectation")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    match action {
        "buy" | "sell" => {
            let symbol = value
                .get("symbol")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    MonetaError::Agent(format!("'{action}' order carries no symbol"))
                })?
                .to_string();
            let cash_value = value
                .get("cash_value")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| {
                    MonetaError::Agent(format!("'{action}' order carries no cash_value"))
                })?;
            if cash_value <= 0.0 {
                return Err(MonetaError::Agent(format!(
                    "'{action}' order has non-positive cash_value {cash_value}"
                )));
            }

            if action == "buy" {
                Ok(TradeCommand::Buy {
                    symbol,
                    cash_value,
                    expectation,
                })
            } else {
                Ok(TradeCommand::Sell {
                    symbol,
                    cash_value,
                    expectation,
                })
            }
        }
        "wait" => Ok(TradeCommand::Wait { expectation }),
        other => Err(MonetaError::Agent(format!("unknown trade action: {other}"))),
    }
}

/// Applies a command to the portfolio, quoting the market where needed.
///
/// Returns what the episode records: the action kind, the fill if one
/// happened, and the stated expectation.
pub async fn execute_command(
    command: TradeCommand,
    portfolio: &mut Portfolio,
    quotes: &dyn QuoteProvider,
) -> Result<(ActionType, Option<Transaction>, String)> {
    match command {
        TradeCommand::Buy {
            symbol,
            cash_value,
            expectation,
        } => {
            let price = quotes.price(&symbol).await?;
            let transaction = portfolio.buy(&symbol, cash_value, price)?;
            Ok((ActionType::Buy, Some(transaction), expectation))
        }
        TradeCommand::Sell {
            symbol,
            cash_value,
            expectation,
        } => {
            let price = quotes.price(&symbol).await?;
            let transaction = portfolio.sell(&symbol, cash_value, price)?;
            Ok((ActionType::Sell, Some(transaction), expectation))
        }
        TradeCommand::Wait { expectation } => Ok((ActionType::Wait, None, expectation)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneta_common::TradeSide;
    use moneta_market::FixedQuoteProvider;

    #[test]
    fn extracts_bare_json_object() {
        let input = r#"{"action":"wait","expectation":"hold"}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn extracts_json_object_from_prose() {
        let input = r#"Here is my decision: {"action":"wait","expectation":"hold"} Good luck!"#;
        assert_eq!(
            extract_json_object(input),
            Some(r#"{"action":"wait","expectation":"hold"}"#)
        );
    }

    #[test]
    fn extracts_nested_json_object() {
        let input = r#"{"action":"buy","meta":{"nested":true}}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn extraction_fails_without_json() {
        assert_eq!(extract_json_object("No JSON here"), None);
    }

    #[test]
    fn extraction_fails_on_unbalanced_braces() {
        assert_eq!(extract_json_object(r#"{"action":"buy""#), None);
    }

    #[test]
    fn parses_reflection_reply() {
        let reply = r#"Sure! {"evaluation": "The rally held.", "learning": "Momentum persists."}"#;
        let notes = parse_reflection(reply).unwrap();
        assert_eq!(notes.evaluation, "The rally held.");
        assert_eq!(notes.learning, "Momentum persists.");
    }

    #[test]
    fn reflection_without_json_is_rejected() {
        let err = parse_reflection("I cannot answer that.").unwrap_err();
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn reflection_missing_field_is_rejected() {
        let err = parse_reflection(r#"{"evaluation": "fine"}"#).unwrap_err();
        assert!(err.to_string().contains("malformed reflection reply"));
    }

    #[test]
    fn parses_buy_command() {
        let reply = r#"{"action": "buy", "symbol": "AAPL", "cash_value": 4000.0,
                        "expectation": "Earnings will beat estimates."}"#;
        let command = parse_trade_command(reply).unwrap();
        assert_eq!(
            command,
            TradeCommand::Buy {
                symbol: "AAPL".to_string(),
                cash_value: 4000.0,
                expectation: "Earnings will beat estimates.".to_string(),
            }
        );
    }

    #[test]
    fn parses_sell_command() {
        let reply = r#"{"action": "sell", "symbol": "GOOGL", "cash_value": 500,
                        "expectation": "Regulatory pressure mounts."}"#;
        let command = parse_trade_command(reply).unwrap();
        assert!(matches!(
            command,
            TradeCommand::Sell { symbol, cash_value, .. }
                if symbol == "GOOGL" && cash_value == 500.0
        ));
    }

    #[test]
    fn parses_wait_command_without_expectation() {
        let command = parse_trade_command(r#"{"action": "wait"}"#).unwrap();
        assert_eq!(
            command,
            TradeCommand::Wait {
                expectation: String::new()
            }
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = parse_trade_command(r#"{"action": "short", "symbol": "TSLA"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown trade action: short"));
    }

    #[test]
    fn buy_without_symbol_is_rejected() {
        let err =
            parse_trade_command(r#"{"action": "buy", "cash_value": 100, "expectation": "x"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("carries no symbol"));
    }

    #[test]
    fn buy_without_cash_value_is_rejected() {
        let err = parse_trade_command(r#"{"action": "buy", "symbol": "AAPL"}"#).unwrap_err();
        assert!(err.to_string().contains("carries no cash_value"));
    }

    #[test]
    fn non_positive_cash_value_is_rejected() {
        let err =
            parse_trade_command(r#"{"action": "sell", "symbol": "AAPL", "cash_value": -5}"#)
                .unwrap_err();
        assert!(err.to_string().contains("non-positive cash_value"));
    }

    #[tokio::test]
    async fn buy_command_fills_against_the_quote() {
        let mut portfolio = Portfolio::new();
        portfolio.deposit(10_000.0).unwrap();
        let quotes = FixedQuoteProvider::default().with_quote("AAPL", 200.0);

        let command = TradeCommand::Buy {
            symbol: "AAPL".to_string(),
            cash_value: 4_000.0,
            expectation: "Up we go.".to_string(),
        };
        let (action, transaction, expectation) =
            execute_command(command, &mut portfolio, &quotes).await.unwrap();

        assert_eq!(action, ActionType::Buy);
        assert_eq!(expectation, "Up we go.");
        let transaction = transaction.unwrap();
        assert_eq!(transaction.side, TradeSide::Buy);
        assert_eq!(transaction.quantity, 20.0);
        assert_eq!(portfolio.available_cash, 6_000.0);
        assert!(portfolio.positions.contains_key("AAPL"));
    }

    #[tokio::test]
    async fn sell_command_without_position_fails() {
        let mut portfolio = Portfolio::new();
        portfolio.deposit(1_000.0).unwrap();
        let quotes = FixedQuoteProvider::default().with_quote("AAPL", 200.0);

        let command = TradeCommand::Sell {
            symbol: "AAPL".to_string(),
            cash_value: 100.0,
            expectation: String::new(),
        };
        let err = execute_command(command, &mut portfolio, &quotes)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AAPL"));
    }

    #[tokio::test]
    async fn wait_command_touches_nothing() {
        let mut portfolio = Portfolio::new();
        portfolio.deposit(1_000.0).unwrap();
        let quotes = FixedQuoteProvider::default();

        let command = TradeCommand::Wait {
            expectation: "Nothing actionable today.".to_string(),
        };
        let (action, transaction, _) =
            execute_command(command, &mut portfolio, &quotes).await.unwrap();

        assert_eq!(action, ActionType::Wait);
        assert!(transaction.is_none());
        assert_eq!(portfolio.available_cash, 1_000.0);
        assert!(portfolio.transactions.is_empty());
    }
}
