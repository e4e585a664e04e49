//! Tally message rendering
//!
//! Produces the text block the engine posts once and edits thereafter:
//! one proportional bar per option, the option's reaction signal, bolded
//! title and vote count, wrapped in a fixed header and border.

use crate::alpha::AlphaCodec;
use crate::config::VoteConfig;
use crate::types::VoteOption;
use crate::Result;

const HEADER: &str = "**Group Vote:**";
const BORDER: &str = "= = = = =";

/// Filled-cell count for one option's bar
///
/// `floor(width * votes / max_votes)`, with zero cells when nothing has
/// been voted on yet.
pub(crate) fn filled_cells(votes: usize, max_votes: usize, width: usize) -> usize {
    if max_votes == 0 {
        return 0;
    }

    width * votes / max_votes
}

/// Render the full tally block for the given option order
pub(crate) fn render_tally(options: &[&VoteOption], config: &VoteConfig) -> Result<String> {
    let max_votes = options.iter().map(|o| o.vote_count()).max().unwrap_or(0);

    let mut lines = Vec::with_capacity(options.len() + 3);
    lines.push(HEADER.to_string());
    lines.push(BORDER.to_string());

    for option in options {
        let votes = option.vote_count();
        let filled = filled_cells(votes, max_votes, config.bar_width);

        let mut line = String::new();
        line.extend(std::iter::repeat(config.bar_filled).take(filled));
        line.extend(std::iter::repeat(config.bar_empty).take(config.bar_width - filled));

        let index = AlphaCodec::index_of(option.letter)?;
        let signal = AlphaCodec::signal_of(index)?;
        line.push_str(&format!("{signal} - **{}** ({votes})", option.title));

        lines.push(line);
    }

    lines.push(BORDER.to_string());
    Ok(lines.join("\n"))
}
