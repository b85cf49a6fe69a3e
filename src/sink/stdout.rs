use std::io::{self, Write};

use crate::error::{Error, Result};

/// Writes to the process's stdout or stderr.
pub struct StdoutSink {
    stderr: bool,
}

impl StdoutSink {
    pub fn stdout() -> Self {
        Self { stderr: false }
    }

    pub fn stderr() -> Self {
        Self { stderr: true }
    }
}

impl super::Sink for StdoutSink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let result = if self.stderr {
            io::stderr().write_all(bytes)
        } else {
            io::stdout().write_all(bytes)
        };
        result.map_err(|e| Error::sink(e.to_string()))
    }

    fn sync(&mut self) -> Result<()> {
        if self.stderr {
            io::stderr().flush()?;
        } else {
            io::stdout().flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.sync()
    }
}
