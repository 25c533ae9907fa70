//! RDF artifact writer
//!
//! Triples are streamed into a temporary file next to the destination,
//! fsynced, then renamed over the destination. A failed write never leaves
//! a partial artifact behind.

use crate::error::SerializationError;
use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::Triple;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

/// Output syntaxes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RdfSyntax {
    #[default]
    Turtle,
    N3,
    NTriples,
    RdfXml,
}

impl RdfSyntax {
    pub fn format(self) -> RdfFormat {
        match self {
            RdfSyntax::Turtle => RdfFormat::Turtle,
            RdfSyntax::N3 => RdfFormat::N3,
            RdfSyntax::NTriples => RdfFormat::NTriples,
            RdfSyntax::RdfXml => RdfFormat::RdfXml,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RdfSyntax::Turtle => "Turtle",
            RdfSyntax::N3 => "N3",
            RdfSyntax::NTriples => "N-Triples",
            RdfSyntax::RdfXml => "RDF/XML",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RdfSyntax::Turtle => "ttl",
            RdfSyntax::N3 => "n3",
            RdfSyntax::NTriples => "nt",
            RdfSyntax::RdfXml => "rdf",
        }
    }

    pub fn media_type(self) -> &'static str {
        self.format().media_type()
    }
}

impl fmt::Display for RdfSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RdfSyntax {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(RdfSyntax::Turtle),
            "n3" => Ok(RdfSyntax::N3),
            "n-triples" | "ntriples" | "nt" => Ok(RdfSyntax::NTriples),
            "rdf/xml" | "rdfxml" | "rdf-xml" | "xml" | "rdf" => Ok(RdfSyntax::RdfXml),
            other => Err(format!("unknown RDF syntax: {other}")),
        }
    }
}

/// A written artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedArtifact {
    pub path: PathBuf,
    pub syntax: RdfSyntax,
    pub triple_count: usize,
    pub bytes: u64,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
}

/// Write adapter that hashes and counts everything passing through
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    bytes: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    fn finish(self) -> (W, String, u64) {
        (self.inner, hex(&self.hasher.finalize()), self.bytes)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Serialize `triples` to `destination`.
///
/// Prefixes are declared for syntaxes that support them.
pub fn write(
    triples: impl IntoIterator<Item = Triple>,
    syntax: RdfSyntax,
    destination: &Path,
    prefixes: &BTreeMap<String, String>,
) -> Result<SerializedArtifact, SerializationError> {
    let io_error = |source: io::Error| SerializationError::Io {
        path: destination.to_path_buf(),
        source,
    };
    let encoding = |message: String| SerializationError::Encoding {
        syntax: syntax.name(),
        message,
    };

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_error)?;
    let temp = NamedTempFile::new_in(&dir).map_err(io_error)?;

    let mut serializer = RdfSerializer::from_format(syntax.format());
    for (name, iri) in prefixes {
        serializer = serializer
            .with_prefix(name.as_str(), iri.as_str())
            .map_err(|e| encoding(format!("prefix {name}: {e}")))?;
    }

    let mut writer = serializer.for_writer(HashingWriter::new(BufWriter::new(temp.as_file())));
    let mut triple_count = 0usize;
    for triple in triples {
        writer.serialize_triple(&triple).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                encoding(format!("{triple}: {e}"))
            }
            _ => io_error(e),
        })?;
        triple_count += 1;
    }
    let hashing = writer.finish().map_err(io_error)?;
    let (buffered, sha256, bytes) = hashing.finish();
    buffered
        .into_inner()
        .map_err(|e| io_error(e.into_error()))?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(destination).map_err(|e| io_error(e.error))?;

    tracing::debug!(
        path = %destination.display(),
        syntax = %syntax,
        triples = triple_count,
        bytes,
        "artifact written"
    );

    Ok(SerializedArtifact {
        path: destination.to_path_buf(),
        syntax,
        triple_count,
        bytes,
        sha256,
    })
}

/// Parse an artifact back into triples
pub fn read_back(path: &Path, syntax: RdfSyntax) -> Result<Vec<Triple>, SerializationError> {
    let file = File::open(path).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RdfParser::from_format(syntax.format())
        .for_reader(BufReader::new(file))
        .map(|quad| {
            quad.map(Triple::from)
                .map_err(|e| SerializationError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
        })
        .collect()
}

/// Hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex(&Sha256::digest(bytes))
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
