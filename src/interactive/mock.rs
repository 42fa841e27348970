use crate::error::Error;

/// Trait abstraction for input/output operations, so the confirm workflow
/// (C6 promotion from the CLI) can be exercised without a real terminal.
pub trait InputOutput {
    fn println(&self, text: &str) -> Result<(), Error>;
    fn read_line(&self) -> Result<String, Error>;
}

pub struct RealInputOutput;

impl InputOutput for RealInputOutput {
    fn println(&self, text: &str) -> Result<(), Error> {
        println!("{text}");
        Ok(())
    }

    fn read_line(&self) -> Result<String, Error> {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        Ok(line)
    }
}

#[cfg(test)]
pub struct FakeInputOutput {
    pub lines: std::cell::RefCell<std::collections::VecDeque<String>>,
}

#[cfg(test)]
impl FakeInputOutput {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            lines: std::cell::RefCell::new(responses.iter().map(|s| (*s).to_string()).collect()),
        }
    }
}

#[cfg(test)]
impl InputOutput for FakeInputOutput {
    fn println(&self, _text: &str) -> Result<(), Error> {
        Ok(())
    }

    fn read_line(&self) -> Result<String, Error> {
        Ok(self.lines.borrow_mut().pop_front().unwrap_or_default())
    }
}
