use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Appends to a file on disk, buffered to absorb per-record write calls.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }
}

impl super::Sink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(|e| Error::sink(e.to_string()))
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Sink;
    use std::io::Read;

    #[test]
    fn writes_and_reads_back_from_disk() {
        let dir = std::env::temp_dir().join(format!("ignis-filesink-test-{}", std::process::id()));
        let mut sink = FileSink::open(&dir).unwrap();
        sink.write(b"line one\n").unwrap();
        sink.write(b"line two\n").unwrap();
        sink.close().unwrap();

        let mut contents = String::new();
        File::open(&dir).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "line one\nline two\n");
        std::fs::remove_file(&dir).unwrap();
    }
}
