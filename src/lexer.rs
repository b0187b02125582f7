//! Splitting an input line into command arguments.
//!
//! There is no quoting, escaping or substitution: an argument is any maximal
//! run of characters other than the space. Tabs are ordinary characters.

use crate::command::Command;

/// The only character that separates arguments.
pub const DELIMITER: char = ' ';

/// Splits `line` into a [`Command`].
///
/// The line is taken by value and becomes the command's backing buffer, so no
/// argument is copied. Runs of spaces collapse and leading or trailing
/// spaces are ignored. A line of only spaces yields an empty command.
pub fn tokenize(line: String) -> Command {
    let mut spans = Vec::new();
    let mut start = None;

    for (pos, ch) in line.char_indices() {
        match (ch == DELIMITER, start) {
            (true, Some(begin)) => {
                spans.push(begin..pos);
                start = None;
            }
            (false, None) => start = Some(pos),
            _ => {}
        }
    }
    if let Some(begin) = start {
        spans.push(begin..line.len());
    }

    Command::new(line, spans)
}
