/// Wraps the market summary in the analyst instruction sent to the model.
pub fn analysis_prompt(market_summary: &str) -> String {
    format!(
        "You are a professional market analyst.\n\n\
Current Market Snapshot:\n{market_summary}\n\n\
TASK: Based on the current market data above, analyze market conditions and identify the best investment opportunities. Consider:\n\
1. Market momentum and trends from the gainers/losers\n\
2. Sector rotation opportunities\n\
3. Risk factors and market sentiment\n\
4. Specific stocks or sectors showing strong signals\n\n\
Provide your analysis in this EXACT JSON format (no other text):\n\
{{\n  \"summary\": \"[emoji 📈/📊/📉] + [comprehensive 2-sentence market analysis with key insights]\",\n  \"opportunities\": [\"[actionable opportunity 1]\", \"[actionable opportunity 2]\", \"[actionable opportunity 3]\", \"[actionable opportunity 4]\"],\n  \"riskLevel\": \"Low\" or \"Medium\" or \"High\"\n}}\n\n\
Make each opportunity specific and actionable (under 15 words). Focus on the strongest signals from the data.\n\
Return ONLY the JSON object, no other text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_summary_and_schema() {
        let prompt = analysis_prompt("SPY: $500.00 (+0.10%)");
        assert!(prompt.contains("Current Market Snapshot:\nSPY: $500.00 (+0.10%)\n"));
        assert!(prompt.contains("\"riskLevel\": \"Low\" or \"Medium\" or \"High\""));
        assert!(prompt.ends_with("Return ONLY the JSON object, no other text."));
    }
}
