//! Interactive confirm prompts for the CLI's promotion workflow (C6).
//!
//! `spec.md` §4.5 describes a candidate being "confirmed" into an
//! `ApiDependency` without mandating a UI; the CLI surfaces this as a
//! yes/no prompt per candidate, generalized here behind an `InputOutput`
//! trait the same way the teacher isolated stdin/stdout for testability.

pub mod mock;

use crate::error::Error;
use mock::InputOutput;

const MAX_RETRIES: usize = 3;

/// Ask for user confirmation with a yes/no prompt.
///
/// # Errors
/// Returns an error if stdin/stdout operations fail or the maximum number
/// of invalid responses is exceeded.
pub fn confirm(prompt: &str) -> Result<bool, Error> {
    confirm_with_io(prompt, &mock::RealInputOutput)
}

pub fn confirm_with_io<T: InputOutput>(prompt: &str, io: &T) -> Result<bool, Error> {
    for attempt in 1..=MAX_RETRIES {
        io.println(&format!("{prompt} (y/n): "))?;
        let response = io.read_line()?;
        let response = response.trim().to_lowercase();

        if response.is_empty() {
            return Ok(false);
        }
        match response.as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {
                if attempt < MAX_RETRIES {
                    io.println(&format!(
                        "Please enter 'y' for yes or 'n' for no. (attempt {attempt} of {MAX_RETRIES})"
                    ))?;
                }
            }
        }
    }

    Err(Error::validation_error(format!(
        "maximum retry attempts ({MAX_RETRIES}) exceeded for confirmation"
    )))
}

#[cfg(test)]
mod tests {
    use super::mock::FakeInputOutput;
    use super::*;

    #[test]
    fn yes_confirms() {
        let io = FakeInputOutput::new(&["y"]);
        assert!(confirm_with_io("promote?", &io).unwrap());
    }

    #[test]
    fn no_declines() {
        let io = FakeInputOutput::new(&["n"]);
        assert!(!confirm_with_io("promote?", &io).unwrap());
    }

    #[test]
    fn empty_input_declines() {
        let io = FakeInputOutput::new(&[""]);
        assert!(!confirm_with_io("promote?", &io).unwrap());
    }

    #[test]
    fn retries_on_garbage_then_accepts() {
        let io = FakeInputOutput::new(&["maybe", "y"]);
        assert!(confirm_with_io("promote?", &io).unwrap());
    }
}
