//! Prompt assembly for the two LLM flows.
//!
//! The reflection prompt closes the previous episode; the decision prompt
//! opens the next one. Both end with an explicit JSON reply contract so the
//! replies stay machine-parseable.

use chrono::{DateTime, Utc};
use moneta_common::Portfolio;
use moneta_memory::{Episode, ScoredEpisode};

pub fn build_reflection_prompt(pending: &Episode, portfolio: &Portfolio) -> String {
    format!(
        "You are given the opportunity to reflect on your most recent trading action, now \
         that its outcome is visible.\n\n\
         Your latest memory is\n\
         {pending}\n\n\
         Your current state is\n\
         {portfolio}\n\
         {history}\n\n\
         To reflect, you must verbalize:\n\
         - An evaluation of your previous expectation: given the now available information \
         of your portfolio's development, ask yourself: 'Did things happen in the way you \
         predicted them?'\n\
         - A learning: a short statement that draws a conclusion from the experience that \
         may be helpful for similar future situations.\n\n\
         Respond ONLY with a JSON object, no other text. The JSON must have this exact \
         structure:\n\n\
         {{\n    \"evaluation\": \"<your evaluation>\",\n    \"learning\": \"<your learning>\"\n}}",
        history = portfolio.transactions,
    )
}

pub fn build_decision_prompt(
    date: DateTime<Utc>,
    portfolio: &Portfolio,
    symbols: &[String],
    news_summaries: &str,
    memories: Option<&[ScoredEpisode]>,
) -> String {
    let mut prompt = format!(
        "It is {date}.\n\
         Keep in mind the weekend as the exchanges are closed on Saturday and Sunday. As \
         such, we do not expect any price changes during those days.\n\n\
         Your current state is\n\
         {portfolio}\n\
         {history}\n\n\
         You are currently trading on these symbols\n\
         {symbols}\n\n\
         Today's news summaries for the symbols:\n\
         {news_summaries}\n",
        date = date.format("%A, %d of %B"),
        history = portfolio.transactions,
        symbols = symbols.join(", "),
    );

    match memories {
        Some(hits) if !hits.is_empty() => {
            prompt.push_str(
                "\nWith regard to the latest news, you remember the following experiences, \
                 which you - at the time - had also reflected upon and drew some learnings:\n\n",
            );
            for (i, hit) in hits.iter().enumerate() {
                prompt.push_str(&format!(
                    "Memory {} (distance {:.3}):\n{}\n",
                    i + 1,
                    hit.distance,
                    hit.episode
                ));
            }
        }
        _ => prompt.push_str("\nYou have no recorded experiences yet.\n"),
    }

    prompt.push_str(
        "\nYou may now choose your next action:\n\
         - buy: spends 'cash_value' euros on shares of 'symbol' at the current market \
         price. The shares are added to your portfolio and the cash is deducted from your \
         account. Fails if your available cash is insufficient.\n\
         - sell: liquidates 'cash_value' euros worth of your 'symbol' position at the \
         current market price. The proceeds are added to your cash account. Fails if you \
         do not hold a sufficiently large position.\n\
         - wait: leaves the portfolio unchanged for today.\n\n\
         When selling or buying stocks, keep in mind some price fluctuation. A request to \
         sell 100 EUR of a 100 EUR position may not be filled if the position's value has \
         suddenly decreased by a bit in the meantime.\n\n\
         Whatever you choose, state an expectation: a short text explaining your decision, \
         written so that it can be evaluated later to determine whether it was correct or \
         wrong.\n\n\
         Respond ONLY with a JSON object, no other text. The JSON must have this exact \
         structure:\n\n\
         {\n    \"action\": \"buy\" | \"sell\" | \"wait\",\n    \"symbol\": \"<ticker, for buy and sell>\",\n    \"cash_value\": <euros, for buy and sell>,\n    \"expectation\": \"<your expectation>\"\n}",
    );

    prompt
}
