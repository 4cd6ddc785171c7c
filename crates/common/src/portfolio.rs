//! Cash-and-positions ledger shared by the trading agent and its memory.
//!
//! Orders are denominated in cash value, not share counts: the caller says
//! how much money to move and the ledger derives the share quantity from the
//! execution price. All mutating operations append exactly one transaction
//! to the history and return it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MonetaError;

/// Residual positions worth less than this are closed out on a sell.
const LIQUIDATION_THRESHOLD: f64 = 1.0;

/// Tolerance when comparing requested against held share quantities.
const QUANTITY_EPSILON: f64 = 1e-6;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("invalid market price {price:.2} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("order value must be positive, got {0:.2}")]
    InvalidAmount(f64),

    #[error("not enough cash: order of {needed:.2} exceeds available {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },

    #[error("not enough shares of {symbol}: requested {requested:.4}, holding {held:.4}")]
    InsufficientQuantity {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("no open position in {0}")]
    UnknownSymbol(String),

    #[error("no quote for held symbol {0}")]
    QuoteMissing(String),
}

impl From<PortfolioError> for MonetaError {
    fn from(err: PortfolioError) -> Self {
        MonetaError::Agent(err.to_string())
    }
}

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub time: DateTime<Utc>,
    pub side: TradeSide,
    pub symbol: String,
    /// Execution price per share.
    pub price: f64,
    /// Number of shares moved.
    pub quantity: f64,
    /// Cash available after the trade settled.
    pub cash_after: f64,
    pub comment: String,
}

impl Transaction {
    pub fn total_value(&self) -> f64 {
        self.price * self.quantity
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time: {} | Action: {} {} @ {:.2} EUR x {:.4} shares = {:.2} | Cash after: {:.2} | Comment: {}",
            self.time.format(TIME_FORMAT),
            self.side,
            self.symbol,
            self.price,
            self.quantity,
            self.total_value(),
            self.cash_after,
            self.comment,
        )
    }
}

/// Append-only record of executed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHistory(Vec<Transaction>);

impl TransactionHistory {
    pub fn record(&mut self, transaction: Transaction) {
        self.0.push(transaction);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.0.iter()
    }

    pub fn latest(&self) -> Option<&Transaction> {
        self.0.last()
    }
}

impl fmt::Display for TransactionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No transactions recorded.");
        }
        let lines: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// An open holding in a single symbol.
///
/// `buy_price` is the volume-weighted average over all buys that built the
/// position. The change fields are refreshed whenever a new price arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub buy_price: f64,
    pub quantity: f64,
    pub last_update_price: f64,
    pub last_update_time: DateTime<Utc>,
    pub absolute_change_since_start: f64,
    pub relative_change_since_start: f64,
    pub absolute_change_since_update: f64,
    pub relative_change_since_update: f64,
}

impl Position {
    pub fn open(symbol: impl Into<String>, price: f64, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            buy_price: price,
            quantity,
            last_update_price: price,
            last_update_time: Utc::now(),
            absolute_change_since_start: 0.0,
            relative_change_since_start: 0.0,
            absolute_change_since_update: 0.0,
            relative_change_since_update: 0.0,
        }
    }

    pub fn position_value(&self) -> f64 {
        self.quantity * self.last_update_price
    }

    /// Marks the position to a new price, refreshing the change fields.
    ///
    /// The since-update deltas are computed against the previous mark before
    /// it is overwritten.
    pub fn update_price(&mut self, price: f64) {
        self.absolute_change_since_update = (price - self.last_update_price) * self.quantity;
        self.relative_change_since_update = if self.last_update_price > 0.0 {
            price / self.last_update_price - 1.0
        } else {
            0.0
        };
        self.absolute_change_since_start = (price - self.buy_price) * self.quantity;
        self.relative_change_since_start = if self.buy_price > 0.0 {
            price / self.buy_price - 1.0
        } else {
            0.0
        };
        self.last_update_price = price;
        self.last_update_time = Utc::now();
    }

    /// Adds shares at `price`, rolling the buy-in price into a new weighted
    /// average.
    pub fn increase(&mut self, price: f64, quantity: f64) {
        self.buy_price =
            (self.buy_price * self.quantity + price * quantity) / (self.quantity + quantity);
        self.quantity += quantity;
        self.update_price(price);
    }

    /// Removes shares at `price`. Tolerates float dust when the caller sells
    /// the whole position.
    pub fn decrease(&mut self, price: f64, quantity: f64) -> Result<(), PortfolioError> {
        if quantity > self.quantity + QUANTITY_EPSILON {
            return Err(PortfolioError::InsufficientQuantity {
                symbol: self.symbol.clone(),
                requested: quantity,
                held: self.quantity,
            });
        }
        self.quantity = (self.quantity - quantity).max(0.0);
        self.update_price(price);
        Ok(())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Symbol: {}, Total Value: {:.2}, Quantity: {:.2}, Last Update Price: {:.2}, Buy-in Price: {:.2}, Abs Change Since Start: {:.2}, Rel Change Since Start: {}",
            self.symbol,
            self.position_value(),
            self.quantity,
            self.last_update_price,
            self.buy_price,
            self.absolute_change_since_start,
            fmt_percent(self.relative_change_since_start),
        )
    }
}

/// The agent's full ledger: cash, open positions and trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Total cash ever deposited. Baseline for the since-start changes.
    pub initial_cash: f64,
    pub available_cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub transactions: TransactionHistory,
    pub absolute_change_since_start: f64,
    pub relative_change_since_start: f64,
    pub absolute_change_since_update: f64,
    pub relative_change_since_update: f64,
    pub last_update_time: DateTime<Utc>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new()
    }
}

impl Portfolio {
    pub fn new() -> Self {
        Self {
            initial_cash: 0.0,
            available_cash: 0.0,
            positions: BTreeMap::new(),
            transactions: TransactionHistory::default(),
            absolute_change_since_start: 0.0,
            relative_change_since_start: 0.0,
            absolute_change_since_update: 0.0,
            relative_change_since_update: 0.0,
            last_update_time: Utc::now(),
        }
    }

    /// Cash plus the marked value of all open positions.
    pub fn portfolio_value(&self) -> f64 {
        self.available_cash + self.invested_value()
    }

    pub fn invested_value(&self) -> f64 {
        self.positions.values().map(Position::position_value).sum()
    }

    /// Symbols with an open position, in sorted order.
    pub fn holdings(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn deposit(&mut self, amount: f64) -> Result<(), PortfolioError> {
        if amount <= 0.0 {
            return Err(PortfolioError::InvalidAmount(amount));
        }
        self.initial_cash += amount;
        self.available_cash += amount;
        Ok(())
    }

    /// Buys `cash_value` worth of `symbol` at `price`, opening a new position
    /// or growing an existing one.
    pub fn buy(
        &mut self,
        symbol: &str,
        cash_value: f64,
        price: f64,
    ) -> Result<Transaction, PortfolioError> {
        if price <= 0.0 {
            return Err(PortfolioError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
        if cash_value <= 0.0 {
            return Err(PortfolioError::InvalidAmount(cash_value));
        }
        if cash_value > self.available_cash {
            return Err(PortfolioError::InsufficientCash {
                needed: cash_value,
                available: self.available_cash,
            });
        }

        let quantity = cash_value / price;
        let comment = match self.positions.get_mut(symbol) {
            Some(position) => {
                position.increase(price, quantity);
                "position increased"
            }
            None => {
                self.positions
                    .insert(symbol.to_string(), Position::open(symbol, price, quantity));
                "position opened"
            }
        };
        self.available_cash -= cash_value;

        Ok(self.log_transaction(TradeSide::Buy, symbol, price, quantity, comment))
    }

    /// Sells `cash_value` worth of `symbol` at `price`.
    ///
    /// If the remainder of the position would be worth less than
    /// [`LIQUIDATION_THRESHOLD`], the whole position is closed and the
    /// residual shares are sold along with the requested ones. The logged
    /// transaction always carries the total quantity that left the book.
    pub fn sell(
        &mut self,
        symbol: &str,
        cash_value: f64,
        price: f64,
    ) -> Result<Transaction, PortfolioError> {
        let Some(position) = self.positions.get_mut(symbol) else {
            return Err(PortfolioError::UnknownSymbol(symbol.to_string()));
        };
        if price <= 0.0 {
            return Err(PortfolioError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
        if cash_value <= 0.0 {
            return Err(PortfolioError::InvalidAmount(cash_value));
        }

        let mut quantity = cash_value / price;
        position.decrease(price, quantity)?;
        self.available_cash += cash_value;

        let comment = if position.position_value() < LIQUIDATION_THRESHOLD {
            let residual = position.quantity;
            quantity += residual;
            self.available_cash += residual * price;
            self.positions.remove(symbol);
            "position closed"
        } else {
            "position reduced"
        };

        Ok(self.log_transaction(TradeSide::Sell, symbol, price, quantity, comment))
    }

    /// Closes the whole position in `symbol` at `price`.
    pub fn close(&mut self, symbol: &str, price: f64) -> Result<Transaction, PortfolioError> {
        let position = self
            .positions
            .get(symbol)
            .ok_or_else(|| PortfolioError::UnknownSymbol(symbol.to_string()))?;
        if price <= 0.0 {
            return Err(PortfolioError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }

        let quantity = position.quantity;
        self.available_cash += quantity * price;
        self.positions.remove(symbol);

        Ok(self.log_transaction(TradeSide::Sell, symbol, price, quantity, "position closed"))
    }

    /// Marks every open position to the given quotes and refreshes the
    /// portfolio-level change fields.
    ///
    /// Every held symbol must have a positive quote; a missing or
    /// non-positive one fails the whole revaluation.
    pub fn revalue(&mut self, quotes: &HashMap<String, f64>) -> Result<(), PortfolioError> {
        let previous_value = self.portfolio_value();

        for (symbol, position) in self.positions.iter_mut() {
            let price = *quotes
                .get(symbol)
                .ok_or_else(|| PortfolioError::QuoteMissing(symbol.clone()))?;
            if price <= 0.0 {
                return Err(PortfolioError::InvalidPrice {
                    symbol: symbol.clone(),
                    price,
                });
            }
            position.update_price(price);
        }

        let value = self.portfolio_value();
        self.absolute_change_since_update = value - previous_value;
        self.relative_change_since_update = if previous_value > 0.0 {
            value / previous_value - 1.0
        } else {
            0.0
        };
        self.absolute_change_since_start = value - self.initial_cash;
        self.relative_change_since_start = if self.initial_cash > 0.0 {
            value / self.initial_cash - 1.0
        } else {
            0.0
        };
        self.last_update_time = Utc::now();
        Ok(())
    }

    pub fn to_file(&self, path: &Path) -> crate::error::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn log_transaction(
        &mut self,
        side: TradeSide,
        symbol: &str,
        price: f64,
        quantity: f64,
        comment: &str,
    ) -> Transaction {
        let transaction = Transaction {
            time: Utc::now(),
            side,
            symbol: symbol.to_string(),
            price,
            quantity,
            cash_after: self.available_cash,
            comment: comment.to_string(),
        };
        self.transactions.record(transaction.clone());
        transaction
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Portfolio Summary ({}):",
            self.last_update_time.format(TIME_FORMAT)
        )?;
        writeln!(f, "Total Value: {:.2}", self.portfolio_value())?;
        writeln!(f, "Available Cash: {:.2}", self.available_cash)?;
        writeln!(f, "Invested Value: {:.2}", self.invested_value())?;
        writeln!(
            f,
            "Absolute Change Since Start: {:.2}",
            self.absolute_change_since_start
        )?;
        writeln!(
            f,
            "Relative Change Since Start: {}",
            fmt_percent(self.relative_change_since_start)
        )?;
        writeln!(f, "{}", "-".repeat(60))?;
        if self.positions.is_empty() {
            write!(f, "No active positions.")
        } else {
            let lines: Vec<String> = self.positions.values().map(|p| p.to_string()).collect();
            write!(f, "{}", lines.join("\n"))
        }
    }
}

fn fmt_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}
