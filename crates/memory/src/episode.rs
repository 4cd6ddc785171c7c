//! The unit of memory: one day of trading, from perception to reflection.
//!
//! An episode starts pending (no reflection), is mutated exactly once when
//! the reflection is attached, and is immutable after it reaches the catalog.
//! [`Episode`]'s `Display` impl is the canonical rendering fed to the
//! embedder; it is deterministic and tolerates absent sections so pending
//! episodes can double as retrieval queries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moneta_common::{Portfolio, Position, Transaction};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What kind of move the agent made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Buy,
    Sell,
    Wait,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Buy => write!(f, "BUY"),
            ActionType::Sell => write!(f, "SELL"),
            ActionType::Wait => write!(f, "WAIT"),
        }
    }
}

/// The decision the agent took, with the fill it produced (if any) and what
/// the agent expected to happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    pub expectation: String,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.transaction {
            Some(transaction) => write!(
                f,
                "{} | {} | Expectation: {}",
                self.action_type, transaction, self.expectation
            ),
            None => write!(f, "{} | Expectation: {}", self.action_type, self.expectation),
        }
    }
}

/// What the agent saw before deciding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    pub news_text: String,
    pub portfolio_snapshot: Portfolio,
}

/// One day's perception plus the action taken on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub date: DateTime<Utc>,
    pub perception: Perception,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl Experience {
    pub fn new(date: DateTime<Utc>, news_text: impl Into<String>, portfolio: Portfolio) -> Self {
        Self {
            date,
            perception: Perception {
                news_text: news_text.into(),
                portfolio_snapshot: portfolio,
            },
            action: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }
}

impl fmt::Display for Experience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Date: {}", self.date.format(TIME_FORMAT))?;
        writeln!(f, "News: {}", self.perception.news_text)?;
        match &self.action {
            Some(action) => writeln!(f, "Action: {action}")?,
            None => writeln!(f, "Action: None")?,
        }
        write!(
            f,
            "Portfolio:\n {}",
            indent(&self.perception.portfolio_snapshot.to_string())
        )
    }
}

/// Hindsight attached after the next market day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// The position in the traded symbol after the dust settled, if one
    /// remained open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posterior_position: Option<Position>,
    pub expectation_evaluation: String,
    pub learning: String,
}

impl fmt::Display for Reflection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.posterior_position {
            Some(position) => writeln!(f, "Position after: {position}")?,
            None => writeln!(f, "Position after: None")?,
        }
        writeln!(f, "Evaluation: {}", self.expectation_evaluation)?;
        write!(f, "Learning: {}", self.learning)
    }
}

/// Experience plus (eventually) a reflection.
///
/// Pending iff `reflection` is `None`; finished iff present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub experience: Experience,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
}

impl Episode {
    pub fn new(experience: Experience) -> Self {
        Self {
            experience,
            reflection: None,
        }
    }

    pub fn with_reflection(mut self, reflection: Reflection) -> Self {
        self.reflection = Some(reflection);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.reflection.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.reflection.is_some()
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EXPERIENCE:")?;
        writeln!(f, "{}", self.experience)?;
        writeln!(f, "REFLECTION:")?;
        match &self.reflection {
            Some(reflection) => write!(f, "{reflection}"),
            None => write!(f, "None"),
        }
    }
}

/// A retrieval hit: the episode, its catalog id, and the squared L2 distance
/// between query and stored embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEpisode {
    pub id: u64,
    pub distance: f32,
    pub episode: Episode,
}

fn indent(text: &str) -> String {
    text.replace('\n', "\n ")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 21, 10, 0, 0).unwrap()
    }

    fn sample_portfolio() -> Portfolio {
        let mut portfolio = Portfolio::new();
        portfolio.deposit(10_000.0).unwrap();
        portfolio.buy("AAPL", 4_000.0, 200.0).unwrap();
        portfolio
    }

    fn sample_action(portfolio: &Portfolio) -> Action {
        Action {
            action_type: ActionType::Buy,
            transaction: portfolio.transactions.latest().cloned(),
            expectation: "Earnings beat should lift the stock.".to_string(),
        }
    }

    fn finished_episode() -> Episode {
        let portfolio = sample_portfolio();
        let action = sample_action(&portfolio);
        let experience =
            Experience::new(sample_date(), "Apple beats earnings estimates.", portfolio.clone())
                .with_action(action);
        Episode::new(experience).with_reflection(Reflection {
            posterior_position: portfolio.positions.get("AAPL").cloned(),
            expectation_evaluation: "The stock rose as expected.".to_string(),
            learning: "Earnings surprises move the price within a day.".to_string(),
        })
    }

    #[test]
    fn pending_and_finished_predicates() {
        let experience = Experience::new(sample_date(), "Quiet day.", Portfolio::new());
        let episode = Episode::new(experience);
        assert!(episode.is_pending());
        assert!(!episode.is_finished());

        let episode = episode.with_reflection(Reflection {
            posterior_position: None,
            expectation_evaluation: "Nothing to evaluate.".to_string(),
            learning: "Quiet days carry no signal.".to_string(),
        });
        assert!(episode.is_finished());
    }

    #[test]
    fn pending_episode_renders_none_placeholders() {
        let experience = Experience::new(sample_date(), "Quiet day.", Portfolio::new());
        let rendered = Episode::new(experience).to_string();

        assert!(rendered.contains("EXPERIENCE:"));
        assert!(rendered.contains("Date: 2024-01-21 10:00:00"));
        assert!(rendered.contains("News: Quiet day."));
        assert!(rendered.contains("Action: None"));
        assert!(rendered.ends_with("REFLECTION:\nNone"));
    }

    #[test]
    fn finished_episode_renders_all_sections() {
        let rendered = finished_episode().to_string();

        assert!(rendered.contains("News: Apple beats earnings estimates."));
        assert!(rendered.contains("Action: BUY |"));
        assert!(rendered.contains("Expectation: Earnings beat should lift the stock."));
        assert!(rendered.contains("Portfolio:\n Portfolio Summary ("));
        assert!(rendered.contains("Position after: Symbol: AAPL"));
        assert!(rendered.contains("Evaluation: The stock rose as expected."));
        assert!(rendered.contains("Learning: Earnings surprises move the price within a day."));
    }

    #[test]
    fn rendering_is_deterministic() {
        let episode = finished_episode();
        assert_eq!(episode.to_string(), episode.to_string());
        assert_eq!(episode.to_string(), episode.clone().to_string());
    }

    #[test]
    fn wait_action_renders_without_transaction() {
        let action = Action {
            action_type: ActionType::Wait,
            transaction: None,
            expectation: "No clear signal today.".to_string(),
        };
        assert_eq!(
            action.to_string(),
            "WAIT | Expectation: No clear signal today."
        );
    }

    #[test]
    fn action_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&ActionType::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&ActionType::Sell).unwrap(), "\"SELL\"");
        assert_eq!(serde_json::to_string(&ActionType::Wait).unwrap(), "\"WAIT\"");
    }

    #[test]
    fn episode_survives_a_json_round_trip() {
        let episode = finished_episode();
        let json = serde_json::to_string(&episode).unwrap();
        let restored: Episode = serde_json::from_str(&json).unwrap();
        assert_eq!(episode, restored);

        let pending = Episode::new(Experience::new(
            sample_date(),
            "Quiet day.",
            Portfolio::new(),
        ));
        let json = serde_json::to_string(&pending).unwrap();
        let restored: Episode = serde_json::from_str(&json).unwrap();
        assert_eq!(pending, restored);
        assert!(restored.is_pending());
    }
}
