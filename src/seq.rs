//! The pull-based sequence interface the counting pipeline consumes, and the
//! `needletail`-backed adapter that is the one concrete implementation of it
//! shipped in this crate.

use std::path::Path;

use needletail::Sequence;
use needletail::{parse_fastx_file, parse_fastx_reader};

use crate::errors::{OrionKmerError, Result};
use crate::utils;

/// One record pulled from a sequence source: an identifier and its bases,
/// already normalized to upper-case ASCII.
pub struct SequenceRecord {
    pub id: Vec<u8>,
    pub seq: Vec<u8>,
}

/// A pull-based source of sequence records. This is the core's only
/// dependency on file parsing; everything upstream of `KmerEncoder` is
/// expressed in terms of this trait rather than a concrete parser.
pub trait SequenceSource {
    fn next_record(&mut self) -> Result<Option<SequenceRecord>>;
}

/// Adapts `needletail`'s FASTA/FASTQ reader to `SequenceSource`. Plain and
/// gzipped input go through needletail's own sniffing; `.xz`/`.zst`/`.7z`
/// input is decompressed first via `utils::get_input_reader`.
pub struct NeedletailSource {
    reader: Box<dyn needletail::parser::FastxReader>,
    path: String,
}

fn is_archive_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("xz") | Some("zst") | Some("7z")
    )
}

impl NeedletailSource {
    /// Plain and `.gz` inputs go straight to `parse_fastx_file`, which sniffs
    /// gzip from the file's magic bytes itself; `.xz`/`.zst`/`.7z` inputs are
    /// decompressed through `utils::get_input_reader` first, since needletail
    /// has no built-in support for those formats.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = if is_archive_extension(path) {
            let decompressed = utils::get_input_reader(path)
                .map_err(|e| OrionKmerError::InvalidInput(format!("{}: {e}", path.display())))?;
            parse_fastx_reader(decompressed)
                .map_err(|e| OrionKmerError::InvalidInput(format!("{}: {e}", path.display())))?
        } else {
            parse_fastx_file(path)
                .map_err(|e| OrionKmerError::InvalidInput(format!("{}: {e}", path.display())))?
        };
        Ok(NeedletailSource { reader, path: path.display().to_string() })
    }
}

impl SequenceSource for NeedletailSource {
    fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        match self.reader.next() {
            Some(Ok(rec)) => {
                let seq = rec.normalize(false).into_owned();
                Ok(Some(SequenceRecord { id: rec.id().to_vec(), seq }))
            }
            Some(Err(e)) => Err(OrionKmerError::InvalidInput(format!("{}: {e}", self.path))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_records_from_a_fasta_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">r1\nACGTacgt\n>r2\nNNNNACGT").unwrap();
        let mut source = NeedletailSource::open(file.path()).unwrap();

        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.id, b"r1");
        assert_eq!(first.seq, b"ACGTACGT");

        let second = source.next_record().unwrap().unwrap();
        assert_eq!(second.id, b"r2");

        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn reads_records_from_a_zstd_compressed_fasta_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.fa.zst");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = zstd::stream::write::Encoder::new(file, 0).unwrap().auto_finish();
        encoder.write_all(b">r1\nACGT\n").unwrap();
        drop(encoder);

        let mut source = NeedletailSource::open(&path).unwrap();
        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.id, b"r1");
        assert_eq!(first.seq, b"ACGT");
        assert!(source.next_record().unwrap().is_none());
    }
}
