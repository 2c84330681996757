// FASTA/FASTQ read parsing with paired-end synchronization.
//
// The format of each input file is detected from the first byte of its
// first non-empty line: '@' means FASTQ, '>' means FASTA, anything else
// is fatal. Gzip compression is detected from the magic bytes, never the
// file name. Read names are truncated at the first space, '/', tab or CR
// so that mate suffixes like "/1" or " 1:N:0:..." do not break pairing;
// in paired mode the truncated names of every pair must agree.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

/// One read (or read pair) as handed to the work queue. Owned by the
/// queue after push and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadItem {
    pub name: String,
    pub seq1: String,
    pub seq2: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Fasta,
    Fastq,
}

/// Characters at which a read name is truncated.
const NAME_SUFFIX_CHARS: &[char] = &[' ', '/', '\t', '\r'];

fn truncate_name(line: &str) -> String {
    match line.find(NAME_SUFFIX_CHARS) {
        Some(n) => line[..n].to_string(),
        None => line.to_string(),
    }
}

/// Keep letters and stops, uppercased; everything else is dropped.
/// Stops survive so that protein input splits into fragments at '*'.
fn strip_sequence(line: &str) -> String {
    line.chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '*')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Open a possibly gzip-compressed file, detected by magic bytes.
pub fn open_sequence_file(path: &str) -> io::Result<Box<dyn BufRead + Send>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if n == 2 && magic == [0x1f, 0x8b] {
        log::debug!("{}: gzip magic detected", path);
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Streaming reader for one FASTA or FASTQ file.
struct RecordReader {
    reader: Box<dyn BufRead + Send>,
    path: String,
    format: Option<Format>,
    /// FASTA header consumed while scanning for the end of the previous
    /// record.
    pending_header: Option<String>,
}

impl RecordReader {
    fn open(path: &str) -> io::Result<Self> {
        Ok(RecordReader {
            reader: open_sequence_file(path)?,
            path: path.to_string(),
            format: None,
            pending_header: None,
        })
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Next non-empty line, skipping blanks.
    fn next_content_line(&mut self) -> io::Result<Option<String>> {
        loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if line.is_empty() => continue,
                Some(line) => return Ok(Some(line)),
            }
        }
    }

    /// Next `(name, sequence)` record, or `None` at end of file.
    fn next(&mut self) -> io::Result<Option<(String, String)>> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match self.next_content_line()? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let format = match self.format {
            Some(f) => f,
            None => {
                let f = match header.chars().next() {
                    Some('@') => Format::Fastq,
                    Some('>') => Format::Fasta,
                    _ => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("auto-detection of file type for {} failed", self.path),
                        ));
                    }
                };
                self.format = Some(f);
                f
            }
        };

        match format {
            Format::Fastq => {
                if !header.starts_with('@') {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{}: malformed FASTQ header: {}", self.path, header),
                    ));
                }
                let name = truncate_name(&header[1..]);
                let seq = self.read_line()?.ok_or_else(|| self.truncated(&name))?;
                // '+' separator and quality line are skipped.
                self.read_line()?.ok_or_else(|| self.truncated(&name))?;
                self.read_line()?.ok_or_else(|| self.truncated(&name))?;
                Ok(Some((name, strip_sequence(&seq))))
            }
            Format::Fasta => {
                if !header.starts_with('>') {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{}: malformed FASTA header: {}", self.path, header),
                    ));
                }
                let name = truncate_name(&header[1..]);
                let mut seq = String::new();
                loop {
                    match self.next_content_line()? {
                        None => break,
                        Some(line) if line.starts_with('>') => {
                            self.pending_header = Some(line);
                            break;
                        }
                        Some(line) => seq.push_str(&strip_sequence(&line)),
                    }
                }
                Ok(Some((name, seq)))
            }
        }
    }

    fn truncated(&self, name: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{}: truncated FASTQ record for read {}", self.path, name),
        )
    }
}

/// Parser over one input file, or two advanced in lockstep for paired
/// reads.
pub struct ReadParser {
    r1: RecordReader,
    r2: Option<RecordReader>,
}

impl ReadParser {
    pub fn open(path1: &str, path2: Option<&str>) -> io::Result<Self> {
        Ok(ReadParser {
            r1: RecordReader::open(path1)?,
            r2: path2.map(RecordReader::open).transpose()?,
        })
    }

    /// Next read item, with mate synchronization in paired mode.
    ///
    /// Running out of mates while the first file still has reads is fatal;
    /// leftover reads in the second file only warrant a warning.
    pub fn next_item(&mut self) -> io::Result<Option<ReadItem>> {
        let (name, seq1) = match self.r1.next()? {
            Some(rec) => rec,
            None => {
                if let Some(r2) = &mut self.r2 {
                    if r2.next()?.is_some() {
                        log::warn!(
                            "{} has more reads than {}",
                            r2.path,
                            self.r1.path
                        );
                    }
                }
                return Ok(None);
            }
        };

        let seq2 = match &mut self.r2 {
            None => None,
            Some(r2) => match r2.next()? {
                Some((name2, seq2)) => {
                    if name != name2 {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!(
                                "reads out of sync: {} in {} vs {} in {}",
                                name, self.r1.path, name2, r2.path
                            ),
                        ));
                    }
                    Some(seq2)
                }
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "{} contains more reads than {}",
                            self.r1.path, r2.path
                        ),
                    ));
                }
            },
        };

        Ok(Some(ReadItem { name, seq1, seq2 }))
    }
}
