// On-disk FM-index format: reader and writer.
//
// Layout (all integers little-endian):
//   magic     8 bytes  "PROTAXFM"
//   version   u32
//   n         u64      BWT / suffix-array length
//   n_docs    u64
//   residues  u64
//   doc_starts  n_docs x u64
//   doc_taxids  n_docs x u64
//   bwt         n bytes
//   sa          n x u64
//
// The cumulative counts and occurrence checkpoints are cheap to derive,
// so they are recomputed on load instead of being stored.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::fm_index::FmIndex;

const MAGIC: &[u8; 8] = b"PROTAXFM";
const VERSION: u32 = 1;

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u64_vec<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u64>> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_u64(r)?);
    }
    Ok(out)
}

/// Load an FM-index from `path`.
pub fn read_index(path: &Path) -> io::Result<FmIndex> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not an FM-index file", path.display()),
        ));
    }
    let version = read_u32(&mut reader)?;
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported index version {version}"),
        ));
    }

    let n = read_u64(&mut reader)? as usize;
    let n_docs = read_u64(&mut reader)? as usize;
    let residues = read_u64(&mut reader)?;

    let doc_starts = read_u64_vec(&mut reader, n_docs)?;
    let doc_taxids = read_u64_vec(&mut reader, n_docs)?;

    let mut bwt = vec![0u8; n];
    reader.read_exact(&mut bwt)?;
    let sa = read_u64_vec(&mut reader, n)?;

    log::info!(
        "Loaded FM-index: {} documents, {} residues",
        n_docs,
        residues
    );
    Ok(FmIndex::from_parts(bwt, sa, doc_starts, doc_taxids, residues))
}

/// Serialize an FM-index to `path`.
pub fn write_index(index: &FmIndex, path: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(index.text_len() as u64).to_le_bytes())?;
    writer.write_all(&(index.num_documents() as u64).to_le_bytes())?;
    writer.write_all(&index.db_residues().to_le_bytes())?;

    for &v in index.doc_starts() {
        writer.write_all(&v.to_le_bytes())?;
    }
    for &v in index.doc_taxids() {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.write_all(index.bwt())?;
    for &v in index.sa() {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()
}
