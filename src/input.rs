//! Path resolution for LOAD: turns a filesystem path into a single byte
//! stream. A plain file is read as-is, a `.gz` file is decompressed, and a
//! directory yields the concatenation of its regular files in name order
//! (subdirectories are skipped).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::Result;

/// Open `path` as a buffered reader over the resolved byte stream.
pub fn open(path: &Path) -> Result<Box<dyn BufRead>> {
    let meta = std::fs::metadata(path)?;
    if meta.is_dir() {
        open_dir(path)
    } else {
        open_file(path)
    }
}

fn open_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_dir(dir: &Path) -> Result<Box<dyn BufRead>> {
    let mut names: Vec<_> = std::fs::read_dir(dir)?
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.path())
        .collect();
    names.sort();

    let mut readers: Vec<Box<dyn Read>> = Vec::with_capacity(names.len());
    for path in names {
        readers.push(Box::new(open_file(&path)?));
    }
    Ok(Box::new(BufReader::new(MultiReader { readers, current: 0 })))
}

/// Concatenates a sequence of readers, moving to the next one at EOF.
struct MultiReader {
    readers: Vec<Box<dyn Read>>,
    current: usize,
}

impl Read for MultiReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current < self.readers.len() {
            let n = self.readers[self.current].read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.current += 1;
        }
        Ok(0)
    }
}
