use std::io::{BufRead, Write};

use taboo::{TabooViolation, TargetEntry};
use tracing::debug;

use crate::GameError;

/// A description that passed the taboo check, plus the attempts that didn't.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
    /// Exactly what the player typed, without the line ending.
    pub text: String,
    pub rejected: Vec<String>,
}

/// Prompts until the player enters a description that avoids every taboo word.
///
/// There is no limit on the number of attempts. Blank lines are ignored, since
/// an empty prompt can't produce a picture. Bytes that aren't valid UTF-8 are
/// replaced rather than rejected. The only ways out without a valid
/// description are I/O errors and the end of the input stream.
pub fn get_valid_description(
    round_index: usize,
    entry: &TargetEntry,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<Description, GameError> {
    let taboo_set = entry.taboo_set();
    write_instructions(output, round_index, entry).map_err(GameError::Terminal)?;

    let mut rejected = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let num_bytes_read = input
            .read_until(b'\n', &mut buf)
            .map_err(GameError::Terminal)?;
        if num_bytes_read == 0 {
            return Err(GameError::InputClosed);
        }
        let line = String::from_utf8_lossy(&buf);
        let text = line.trim_end_matches(&['\n', '\r'][..]);
        if text.trim().is_empty() {
            write!(output, "Your description: ")
                .and_then(|_| output.flush())
                .map_err(GameError::Terminal)?;
            continue;
        }
        match taboo_set.check(text) {
            Ok(()) => {
                return Ok(Description {
                    text: String::from(text),
                    rejected,
                })
            }
            Err(violation) => {
                debug!(%violation, attempt = rejected.len() + 1, "Rejected description");
                write_rejection(output, entry, &violation).map_err(GameError::Terminal)?;
                rejected.push(String::from(text));
            }
        }
    }
}

fn write_instructions(
    output: &mut dyn Write,
    round_index: usize,
    entry: &TargetEntry,
) -> std::io::Result<()> {
    writeln!(output, "--------------------------------------------------------")?;
    writeln!(output, "Round {}", round_index)?;
    writeln!(output, "Welcome to the Taboo YOLO Game!")?;
    writeln!(output)?;
    writeln!(output, "Objective:")?;
    writeln!(
        output,
        "You need to describe an object or concept related to \"{}\".",
        entry.answer
    )?;
    writeln!(
        output,
        "However, be careful! You are NOT allowed to use the following taboo words:"
    )?;
    writeln!(output)?;
    writeln!(output, "    {}", entry.taboo_words.join(", "))?;
    writeln!(output)?;
    writeln!(output, "Instructions:")?;
    writeln!(
        output,
        "Please describe the object or concept in a sentence WITHOUT using the taboo words."
    )?;
    writeln!(
        output,
        "Your description should give enough clues for the image generator to create the correct image."
    )?;
    writeln!(output)?;
    writeln!(output, "Example:")?;
    writeln!(
        output,
        "If the object is \"pizza\", a valid description might be:"
    )?;
    writeln!(
        output,
        "\"A round dish with cheese, sauce, and toppings baked in the oven.\""
    )?;
    writeln!(output)?;
    writeln!(
        output,
        "Now, go ahead and give it a try. What would you like to say to the image generator?"
    )?;
    writeln!(output)?;
    writeln!(output, "--------------------------------------------------------")?;
    writeln!(output)?;
    write!(output, "Your description: ")?;
    output.flush()
}

fn write_rejection(
    output: &mut dyn Write,
    entry: &TargetEntry,
    violation: &TabooViolation,
) -> std::io::Result<()> {
    writeln!(output)?;
    writeln!(
        output,
        "Oops! Your description contains one or more taboo words: {}.",
        violation
    )?;
    writeln!(
        output,
        "Remember, you cannot use the target object '{}' or any of these taboo words: {}.",
        entry.answer,
        entry.taboo_words.join(", ")
    )?;
    writeln!(output)?;
    writeln!(output, "Please try again.")?;
    write!(output, "Your description: ")?;
    output.flush()
}
