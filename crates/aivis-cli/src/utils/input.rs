//! Interactive prompts.

use std::io::{self, BufRead};

use anyhow::{Context, Result};

/// Prompt on stdout and read one line from `input`.
///
/// An empty answer yields `default` (or an empty string without one).
pub fn prompt_with_default<R: BufRead>(
    input: &mut R,
    prompt: &str,
    default: Option<&str>,
) -> Result<String> {
    match default {
        Some(value) => println!("{prompt} [{value}]: "),
        None => println!("{prompt}: "),
    }

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read user input")?;

    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// [`prompt_with_default`] on the process's stdin.
pub fn prompt_string_with_default(prompt: &str, default: Option<&str>) -> Result<String> {
    prompt_with_default(&mut io::stdin().lock(), prompt, default)
}

/// Ask a yes/no question on stdout; only `y`/`yes` (any case) count as yes.
pub fn confirm_with<R: BufRead>(input: &mut R, prompt: &str) -> Result<bool> {
    let answer = prompt_with_default(input, &format!("{prompt} [y/N]"), None)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// [`confirm_with`] on the process's stdin.
pub fn confirm(prompt: &str) -> Result<bool> {
    confirm_with(&mut io::stdin().lock(), prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn answer_is_trimmed() {
        let mut input = Cursor::new("  value \n");
        assert_eq!(prompt_with_default(&mut input, "Key", None).unwrap(), "value");
    }

    #[test]
    fn empty_answer_takes_the_default() {
        let mut input = Cursor::new("\n");
        assert_eq!(
            prompt_with_default(&mut input, "Model", Some("abc")).unwrap(),
            "abc"
        );
        let mut input = Cursor::new("");
        assert_eq!(prompt_with_default(&mut input, "Key", None).unwrap(), "");
    }

    #[test]
    fn confirmation_defaults_to_no() {
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut input = Cursor::new(answer);
            assert_eq!(confirm_with(&mut input, "Install?").unwrap(), expected, "{answer:?}");
        }
    }
}
