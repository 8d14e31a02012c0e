use chrono::NaiveDate;
use tdrs_models::run_state::RunState;
use tdrs_models::strategy::TradingStrategy;

/// Render the analyst reports as a markdown block for downstream prompts.
pub fn format_reports(state: &RunState) -> String {
    if state.reports.is_empty() {
        return "(no analyst reports available)".to_string();
    }
    state
        .reports
        .iter()
        .map(|(name, text)| format!("### {name}\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn fundamental_prompt(
    ticker: &str,
    as_of: NaiveDate,
    horizon_days: u32,
    data: &serde_json::Value,
) -> String {
    format!(
        "Conduct a fundamental analysis of {ticker} as of {as_of} with a \
         {horizon_days}-day horizon.\n\n\
         Data provided:\n{data}\n\n\
         Analyze:\n\
         - Financial health: profitability, liquidity, solvency, efficiency\n\
         - Red flags or concerns\n\
         - Overall assessment\n\n\
         FORMAT: Use Markdown with `### Headers` and `- Bullet points`.\n\
         Structure:\n\
         - **Profitability & Efficiency**: Margins, ROE.\n\
         - **Solvency & Liquidity**: Debt levels, current ratio.\n\
         - **Valuation**: P/E, EV/EBITDA vs peers.\n\
         - **Conclusion**: Fundamental strength assessment.\n\n\
         Keep response structured and under 300 words."
    )
}

pub fn technical_prompt(
    ticker: &str,
    as_of: NaiveDate,
    horizon_days: u32,
    data: &serde_json::Value,
) -> String {
    format!(
        "Perform technical analysis of {ticker} as of {as_of} with a \
         {horizon_days}-day horizon.\n\n\
         Price history and indicators:\n{data}\n\n\
         Analyze:\n\
         - Price trends, support/resistance levels, chart patterns\n\
         - Key technical indicators\n\
         - Trading volume strength\n\
         - Short-term price forecast\n\n\
         FORMAT: Use Markdown with `### Headers` and `- Bullet points`.\n\
         Structure:\n\
         - **Trend Analysis**: Moving averages, direction.\n\
         - **Momentum**: RSI, MACD signals.\n\
         - **Support/Resistance**: Key levels to watch.\n\
         - **Forecast**: Short-term outlook (Bullish/Bearish/Neutral).\n\n\
         Keep response structured and under 300 words."
    )
}

pub fn news_prompt(ticker: &str, as_of: NaiveDate, data: &serde_json::Value) -> String {
    format!(
        "Analyze the latest news for {ticker} as of {as_of}.\n\n\
         Articles with sentiment:\n{data}\n\n\
         Provide:\n\
         - Key catalysts and events\n\
         - Sentiment trend assessment\n\
         - Market-moving developments\n\
         - Risk factors from news\n\n\
         FORMAT: Use Markdown with `### Headers` and `- Bullet points`.\n\
         Structure:\n\
         - **Major Catalysts**: Partnerships, earnings, product launches.\n\
         - **Sentiment**: Summary of media tone (Bullish/Bearish).\n\
         - **Risks**: Potential headwinds mentioned in news.\n\
         - **Market Impact**: Likely short-term price effect.\n\n\
         Keep response structured and under 250 words."
    )
}

pub fn social_prompt(ticker: &str, as_of: NaiveDate, data: &serde_json::Value) -> String {
    format!(
        "Assess social media sentiment for {ticker} as of {as_of}.\n\n\
         Posts and mention counts:\n{data}\n\n\
         Provide:\n\
         - Overall retail sentiment (bullish/bearish/neutral)\n\
         - Mention volume trend and notable spikes\n\
         - Recurring themes or concerns\n\n\
         FORMAT: Use Markdown with `### Headers` and `- Bullet points`.\n\
         Keep response structured and under 200 words."
    )
}

const CROSS_EXAMINATION: &str = "\
Cross-examination requirements for this round:\n\
1. Quote 2-3 specific claims from the opposing transcript.\n\
2. Identify a concrete flaw in each quoted claim.\n\
3. Rebut each flaw with new evidence from the reports.\n\
4. Never repeat a claim you already rebutted in an earlier round.";

pub fn bull_prompt(state: &RunState, memory_notes: Option<&str>, rebuttal: bool) -> String {
    let reports = format_reports(state);
    let memory_block = memory_notes
        .map(|notes| format!("\n\nLessons from similar past situations:\n{notes}"))
        .unwrap_or_default();

    if !rebuttal {
        format!(
            "You are the Bull Researcher for {ticker}. Build a compelling bullish case.\n\n\
             Analysis Reports from the Analyst Team:\n{reports}{memory_block}\n\n\
             Tasks:\n\
             1. Identify the positive factors, growth catalysts, and upside potential.\n\
             2. Synthesize them into a coherent, persuasive bullish thesis.\n\
             3. Present your opening argument clearly.\n\n\
             Start your response with \"Bull Researcher:\".",
            ticker = state.ticker
        )
    } else {
        format!(
            "You are the Bull Researcher in an ongoing debate about {ticker}.\n\n\
             Analysis Reports:\n{reports}\n\n\
             Bear Researcher's Arguments:\n{bear}\n\n\
             Your Previous Arguments:\n{bull}\n\n\
             {CROSS_EXAMINATION}\n\n\
             Start your response with \"Bull Researcher:\".",
            ticker = state.ticker,
            bear = state.invest_debate.bear_history,
            bull = state.invest_debate.bull_history,
        )
    }
}

pub fn bear_prompt(state: &RunState, memory_notes: Option<&str>, rebuttal: bool) -> String {
    let reports = format_reports(state);
    let memory_block = memory_notes
        .map(|notes| format!("\n\nPast mistakes worth remembering:\n{notes}"))
        .unwrap_or_default();

    if !rebuttal {
        format!(
            "You are the Bear Researcher for {ticker}. Present the bearish case and \
             challenge overly optimistic views.\n\n\
             Analysis Reports from the Analyst Team:\n{reports}{memory_block}\n\n\
             Bull Researcher's Opening Argument:\n{bull}\n\n\
             Tasks:\n\
             1. Identify the negative factors, risks, and red flags.\n\
             2. Challenge the Bull Researcher's arguments with facts.\n\
             3. Present your bearish thesis clearly.\n\n\
             Start your response with \"Bear Researcher:\".",
            ticker = state.ticker,
            bull = state.invest_debate.bull_history,
        )
    } else {
        format!(
            "You are the Bear Researcher in an ongoing debate about {ticker}.\n\n\
             Analysis Reports:\n{reports}\n\n\
             Bull Researcher's Arguments:\n{bull}\n\n\
             Your Previous Arguments:\n{bear}\n\n\
             {CROSS_EXAMINATION}\n\n\
             Start your response with \"Bear Researcher:\".",
            ticker = state.ticker,
            bull = state.invest_debate.bull_history,
            bear = state.invest_debate.bear_history,
        )
    }
}

pub fn invest_judge_prompt(state: &RunState) -> String {
    format!(
        "You are the Research Manager and Portfolio Strategist for {ticker}. Evaluate \
         the debate between the Bull and Bear researchers and make a definitive \
         investment recommendation.\n\n\
         Original Analysis Reports:\n{reports}\n\n\
         Complete Debate Transcript:\n{history}\n\n\
         Tasks:\n\
         1. Summarize the key points from both sides.\n\
         2. Weigh the strength of evidence on each side.\n\
         3. Make a clear recommendation: BUY, SELL, or HOLD.\n\
         4. Develop an investment plan: recommendation, key rationale, risk factors \
         to monitor, suggested entry/exit strategy.\n\
         5. Be decisive. Do not default to HOLD without strong justification.\n\n\
         Provide the analysis and investment plan in a clear, actionable format.",
        ticker = state.ticker,
        reports = format_reports(state),
        history = state.invest_debate.history,
    )
}

pub fn strategy_prompt(investment_plan: &str) -> String {
    format!(
        "Create an actionable trading strategy based on research analysis.\n\n\
         Research Manager's Investment Plan:\n{investment_plan}\n\n\
         Provide a decisive strategy: BUY, SELL, or HOLD.\n\
         For BUY/SELL, specify entry price, take-profit, stop-loss, and position \
         size (% of portfolio).\n\n\
         Format as JSON:\n\
         {{\n\
             \"action\": \"BUY|SELL|HOLD\",\n\
             \"entry_price\": <number>,\n\
             \"take_profit\": <number>,\n\
             \"stop_loss\": <number>,\n\
             \"position_size_pct\": <number>,\n\
             \"rationale\": \"<1-2 sentences>\"\n\
         }}\n\n\
         Keep response under 200 words."
    )
}

pub fn aggressive_prompt(state: &RunState, strategy: &TradingStrategy, opening: bool) -> String {
    if opening {
        format!(
            "You are the Aggressive Risk Analyst for {ticker}. Advocate for bold action \
             and challenge excessive caution.\n\n\
             Current strategy: {action}\n\
             Strategy details:\n{details}\n\n\
             Focus on:\n\
             - Opportunity cost of sitting on the sidelines\n\
             - Growth potential and competitive advantages\n\
             - What is lost by being too cautious\n\n\
             Be direct and persuasive. Start with \"Aggressive Analyst:\".",
            ticker = state.ticker,
            action = strategy.action,
            details = strategy.rationale,
        )
    } else {
        format!(
            "You are the Aggressive Risk Analyst in a debate about {ticker}.\n\n\
             Conservative Analyst argued:\n{conservative}\n\n\
             Neutral Analyst argued:\n{neutral}\n\n\
             Your Previous Points:\n{own}\n\n\
             Counter their caution with specific rebuttals: where are they overly \
             risk-averse, and what opportunities are they overlooking?\n\n\
             Start with \"Aggressive Analyst:\".",
            ticker = state.ticker,
            conservative = state.risk_debate.conservative_history,
            neutral = state.risk_debate.neutral_history,
            own = state.risk_debate.aggressive_history,
        )
    }
}

pub fn conservative_prompt(
    state: &RunState,
    strategy: &TradingStrategy,
    memory_notes: Option<&str>,
    opening: bool,
) -> String {
    let memory_block = memory_notes
        .map(|notes| format!("\n\nPast losses to learn from:\n{notes}"))
        .unwrap_or_default();

    if opening {
        format!(
            "You are the Conservative Risk Analyst for {ticker}. Protect capital and \
             minimize losses.\n\n\
             Current strategy: {action}\n\
             Strategy details:\n{details}{memory_block}\n\n\
             Aggressive Analyst argued:\n{aggressive}\n\n\
             Focus on:\n\
             - Downside risks and potential losses\n\
             - Volatility and uncertainty\n\
             - Why caution is prudent given current conditions\n\n\
             Be rigorous and risk-aware. Start with \"Conservative Analyst:\".",
            ticker = state.ticker,
            action = strategy.action,
            details = strategy.rationale,
            aggressive = state.risk_debate.aggressive_history,
        )
    } else {
        format!(
            "You are the Conservative Risk Analyst in a debate about {ticker}.\n\n\
             Aggressive Analyst argued:\n{aggressive}\n\n\
             Neutral Analyst argued:\n{neutral}\n\n\
             Your Previous Points:\n{own}\n\n\
             Rebut their optimism with specific risks: where are they underestimating \
             downside, and why could this trade produce a significant loss?\n\n\
             Start with \"Conservative Analyst:\".",
            ticker = state.ticker,
            aggressive = state.risk_debate.aggressive_history,
            neutral = state.risk_debate.neutral_history,
            own = state.risk_debate.conservative_history,
        )
    }
}

pub fn neutral_prompt(state: &RunState, strategy: &TradingStrategy) -> String {
    format!(
        "You are the Neutral Risk Analyst for {ticker}. Find the optimal balanced \
         approach.\n\n\
         Current strategy: {action}\n\
         Strategy details:\n{details}\n\n\
         Aggressive Analyst argued:\n{aggressive}\n\n\
         Conservative Analyst argued:\n{conservative}\n\n\
         Your Previous Points:\n{own}\n\n\
         Evaluate both sides and propose a balanced solution: where is each analyst \
         right and wrong, and should position size, stops, or approach change?\n\n\
         Be analytical and fair. Start with \"Neutral Analyst:\".",
        ticker = state.ticker,
        action = strategy.action,
        details = strategy.rationale,
        aggressive = state.risk_debate.aggressive_history,
        conservative = state.risk_debate.conservative_history,
        own = state.risk_debate.neutral_history,
    )
}

pub fn risk_judge_prompt(state: &RunState, strategy: &TradingStrategy) -> String {
    format!(
        "As the Risk Manager, evaluate this risk debate and make a FINAL DECISION \
         for {ticker}.\n\n\
         Current strategy: {action}\n\
         Strategy details:\n{details}\n\n\
         Complete Risk Debate:\n{history}\n\n\
         Tasks:\n\
         1. Summarize the key points from each analyst (aggressive/conservative/neutral).\n\
         2. Make the final decision: BUY, SELL, or HOLD. You may override the current \
         strategy, including moving off HOLD, if the debate surfaced decisive evidence.\n\
         3. If changing the decision, adjust position size and stop/take-profit levels.\n\n\
         Decision rules:\n\
         - BUY and SELL require clear directional conviction supported by at least \
         two analysts.\n\
         - If all three analysts raise significant concerns, override to HOLD.\n\
         - If evidence is genuinely mixed, HOLD is appropriate.\n\n\
         Format:\n\
         ## Risk Manager Final Decision\n\
         **Final Decision**: [BUY/SELL/HOLD]\n\
         **Rationale**: [2-3 sentences]\n\n\
         Keep response under 300 words.",
        ticker = state.ticker,
        action = strategy.action,
        details = strategy.rationale,
        history = state.risk_debate.history,
    )
}

pub fn signal_extraction_prompt(text: &str) -> String {
    format!(
        "Classify the trading recommendation expressed in the text below.\n\n\
         Respond with exactly one word: BUY, SELL, or HOLD.\n\
         Treat synonyms accordingly: \"accumulate\", \"go long\", or \"add shares\" \
         mean BUY; \"reduce exposure\", \"exit\", or \"trim the position\" mean SELL; \
         \"wait and see\", \"stay neutral\", or \"stand aside\" mean HOLD.\n\
         If no recommendation is expressed, respond HOLD.\n\n\
         Text:\n{text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tdrs_models::config::RunConfig;
    use tdrs_models::signal::Signal;

    fn state() -> RunState {
        let mut state = RunState::new(
            "NVDA",
            NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            RunConfig::default(),
        );
        state
            .reports
            .insert("fundamental_analyst".to_string(), "margins expanding".to_string());
        state
    }

    #[test]
    fn analyst_prompts_carry_ticker_and_structure() {
        let as_of = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();
        let data = serde_json::json!({"pe_ratio": 35.1});

        let fundamental = fundamental_prompt("NVDA", as_of, 30, &data);
        assert!(fundamental.contains("NVDA"));
        assert!(fundamental.contains("30-day horizon"));
        assert!(fundamental.contains("Profitability"));

        let technical = technical_prompt("NVDA", as_of, 30, &data);
        assert!(technical.contains("Support/Resistance"));

        let news = news_prompt("NVDA", as_of, &data);
        assert!(news.contains("Major Catalysts"));
    }

    #[test]
    fn opening_bull_prompt_has_no_cross_examination() {
        let prompt = bull_prompt(&state(), None, false);
        assert!(prompt.contains("Bull Researcher"));
        assert!(prompt.contains("opening argument"));
        assert!(!prompt.contains("Cross-examination"));
    }

    #[test]
    fn rebuttal_prompts_require_cross_examination() {
        let mut s = state();
        s.invest_debate.bull_history = "Bull: growth".to_string();
        s.invest_debate.bear_history = "Bear: valuation".to_string();

        for prompt in [bull_prompt(&s, None, true), bear_prompt(&s, None, true)] {
            assert!(prompt.contains("Quote 2-3 specific claims"));
            assert!(prompt.contains("Never repeat a claim"));
        }
    }

    #[test]
    fn memory_notes_injected_when_present() {
        let prompt = bull_prompt(&state(), Some("2025-11: bought the top"), false);
        assert!(prompt.contains("similar past situations"));
        assert!(prompt.contains("bought the top"));

        let without = bull_prompt(&state(), None, false);
        assert!(!without.contains("similar past situations"));
    }

    #[test]
    fn judge_prompt_includes_transcript_and_labels() {
        let mut s = state();
        s.invest_debate.history = "Bull: up. Bear: down.".to_string();
        let prompt = invest_judge_prompt(&s);
        assert!(prompt.contains("Research Manager"));
        assert!(prompt.contains("Bull: up. Bear: down."));
        assert!(prompt.contains("BUY, SELL, or HOLD"));
    }

    #[test]
    fn strategy_prompt_demands_json_schema() {
        let prompt = strategy_prompt("BUY on momentum");
        assert!(prompt.contains("\"action\""));
        assert!(prompt.contains("entry_price"));
        assert!(prompt.contains("position_size_pct"));
    }

    #[test]
    fn risk_prompts_name_their_roles() {
        let s = state();
        let strategy = tdrs_models::strategy::TradingStrategy {
            action: Signal::Buy,
            entry_price: None,
            take_profit: None,
            stop_loss: None,
            position_size_pct: rust_decimal::Decimal::ZERO,
            rationale: "momentum".to_string(),
        };

        assert!(aggressive_prompt(&s, &strategy, true).contains("Aggressive Risk Analyst"));
        assert!(conservative_prompt(&s, &strategy, None, true).contains("Conservative Risk Analyst"));
        assert!(neutral_prompt(&s, &strategy).contains("Neutral Risk Analyst"));
        assert!(risk_judge_prompt(&s, &strategy).contains("FINAL DECISION"));
    }

    #[test]
    fn extraction_prompt_is_constrained_with_synonyms() {
        let prompt = signal_extraction_prompt("we should accumulate shares");
        assert!(prompt.contains("exactly one word"));
        assert!(prompt.contains("accumulate"));
        assert!(prompt.contains("reduce exposure"));
        assert!(prompt.contains("wait and see"));
        assert!(prompt.contains("we should accumulate shares"));
    }
}
