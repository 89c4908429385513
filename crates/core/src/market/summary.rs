use crate::market::types::{MoverEntry, Quote};
use chrono::{DateTime, Utc};

/// Rows of the most-active list shown in the summary.
pub const MOST_ACTIVE_SHOWN: usize = 3;

const EMPTY_SECTION: &str = "(no data)";

/// Renders the market snapshot as the text block handed to the model.
pub fn build_summary_text(
    generated_at: DateTime<Utc>,
    quotes: &[Quote],
    gainers: &[MoverEntry],
    losers: &[MoverEntry],
    most_active: &[MoverEntry],
) -> String {
    let mut lines = vec![
        format!(
            "Current Market Data ({}):",
            generated_at.format("%Y-%m-%d %H:%M UTC")
        ),
        String::new(),
        "Major Market ETFs:".to_string(),
    ];
    push_section(&mut lines, quotes.iter().map(quote_line));

    lines.push(String::new());
    lines.push(format!("Top {} Gainers Today:", gainers.len()));
    push_section(&mut lines, gainers.iter().map(gainer_line));

    lines.push(String::new());
    lines.push(format!("Top {} Losers Today:", losers.len()));
    push_section(
        &mut lines,
        losers
            .iter()
            .map(|m| format!("{}: ${:.2} ({})", m.ticker, m.price, m.change_percent_text)),
    );

    lines.push(String::new());
    lines.push("Most Actively Traded:".to_string());
    push_section(
        &mut lines,
        most_active.iter().take(MOST_ACTIVE_SHOWN).map(|m| {
            format!(
                "{}: ${:.2} ({}) - Vol: {}",
                m.ticker,
                m.price,
                m.change_percent_text,
                m.volume.as_deref().unwrap_or("n/a")
            )
        }),
    );

    lines.join("\n")
}

fn push_section(lines: &mut Vec<String>, rows: impl Iterator<Item = String>) {
    let before = lines.len();
    lines.extend(rows);
    if lines.len() == before {
        lines.push(EMPTY_SECTION.to_string());
    }
}

fn quote_line(q: &Quote) -> String {
    let sign = if q.change_percent >= 0.0 { "+" } else { "" };
    format!(
        "{}: ${:.2} ({sign}{:.2}%)",
        q.symbol, q.price, q.change_percent
    )
}

fn gainer_line(m: &MoverEntry) -> String {
    let pct = m.change_percent_text.as_str();
    let sign = if pct.starts_with('+') || pct.starts_with('-') {
        ""
    } else {
        "+"
    };
    format!("{}: ${:.2} ({sign}{pct})", m.ticker, m.price)
}
