//! Renders a [`SpotMemory`] into the prose context that accompanies the next
//! vision check.

use crate::memory::SpotMemory;
use crate::patterns::weekday_name;

const SEPARATOR: &str = " | ";

/// Number of recurring items mentioned in the context line.
const CONTEXT_ITEMS: usize = 3;

/// Summarise `memory` as a single line of advisory text.
///
/// No memory renders as the empty string.  Otherwise the applicable clauses
/// are joined with `" | "`, always ending with the overall pass rate.
///
/// The pass rate is printed with `{:.0}`, which rounds exact halves to the
/// even neighbour: 12.5 renders as `12%`, 37.5 as `38%`.
pub fn render_context(memory: Option<&SpotMemory>) -> String {
    let Some(memory) = memory else {
        return String::new();
    };
    let patterns = &memory.patterns;

    let mut parts: Vec<String> = Vec::with_capacity(4);

    if !patterns.recurring_items.is_empty() {
        let shown = patterns.recurring_items.len().min(CONTEXT_ITEMS);
        parts.push(format!(
            "Items that often appear: {}",
            patterns.recurring_items[..shown].join(", ")
        ));
    }

    if patterns.current_streak > 0 {
        parts.push(format!(
            "Current passing streak: {} checks",
            patterns.current_streak
        ));
    }

    if let Some(day) = patterns.best_day {
        parts.push(format!("This spot is usually best on {}", weekday_name(day)));
    }

    parts.push(format!("Overall pass rate: {:.0}%", memory.pass_rate));

    parts.join(SEPARATOR)
}
