//! File-replay rollup back-end.
//!
//! Drives the dispatcher from recorded inputs on disk and writes every
//! output next to them, one file per notice, voucher, or report:
//!
//! ```text
//! input-<i>.bin            be256 offset | be256 length | payload
//! input-<i>-metadata.bin   pad12 | packed input metadata
//! query-<q>.bin            be256 offset | be256 length | payload
//! input-<i>-notice-<n>.bin   be256(32) | be256 len | payload
//! input-<i>-voucher-<v>.bin  pad12 | destination | be256(32) | be256 len | payload
//! query-<q>-report-<r>.bin   be256(32) | be256 len | payload
//! ```
//!
//! Rejected inputs are logged and skipped; the run keeps going, exactly like
//! the production loop would.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::arena::Arena;
use crate::core::types::EthAddress;
use crate::dispatch::Dispatcher;
use crate::wire::codec::Be256;
use crate::wire::types::InputMetadata;

/// Framing header on every raw input, query, and output: two be256 words.
const FRAME_HEADER_LENGTH: usize = 64;

/// Host control surface for a replay run. Input, query, and output files
/// all live under `work_dir`.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub image_filename: PathBuf,
    pub virtual_start: u64,
    pub initialize: bool,
    pub input_begin: u32,
    pub input_end: u32,
    pub query_begin: u32,
    pub query_end: u32,
    pub input_format: String,
    pub input_metadata_format: String,
    pub query_format: String,
    pub work_dir: PathBuf,
}

impl ReplayConfig {
    pub fn new(image_filename: PathBuf) -> Self {
        Self {
            image_filename,
            virtual_start: crate::arena::DEFAULT_VIRTUAL_START,
            initialize: false,
            input_begin: 0,
            input_end: 0,
            query_begin: 0,
            query_end: 0,
            input_format: "input-%d.bin".to_owned(),
            input_metadata_format: "input-%d-metadata.bin".to_owned(),
            query_format: "query-%d.bin".to_owned(),
            work_dir: PathBuf::from("."),
        }
    }
}

/// Counts from a finished replay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub inputs_accepted: u32,
    pub inputs_rejected: u32,
    pub queries_accepted: u32,
    pub queries_rejected: u32,
}

enum Scope {
    Input(u32),
    Query(u32),
}

/// Writes each output to its own framed file under the work directory.
struct FilePort {
    dir: PathBuf,
    scope: Scope,
    notice: u32,
    voucher: u32,
    report: u32,
}

impl FilePort {
    fn for_input(dir: PathBuf, index: u32) -> Self {
        Self {
            dir,
            scope: Scope::Input(index),
            notice: 0,
            voucher: 0,
            report: 0,
        }
    }

    fn for_query(dir: PathBuf, index: u32) -> Self {
        Self {
            dir,
            scope: Scope::Query(index),
            notice: 0,
            voucher: 0,
            report: 0,
        }
    }

    fn filename(&self, what: &str, index: u32) -> PathBuf {
        let name = match self.scope {
            Scope::Input(input) => format!("input-{input}-{what}-{index}.bin"),
            Scope::Query(query) => format!("query-{query}-{what}-{index}.bin"),
        };
        self.dir.join(name)
    }

    fn write_framed(&self, filename: &Path, prefix: &[u8], payload: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(filename)?;
        file.write_all(prefix)?;
        file.write_all(&Be256::from_u64(32).0)?;
        file.write_all(&Be256::from_u64(payload.len() as u64).0)?;
        file.write_all(payload)?;
        info!(filename = %filename.display(), "stored output");
        Ok(())
    }
}

impl super::OutputPort for FilePort {
    fn emit_notice(&mut self, payload: &[u8]) -> io::Result<()> {
        self.write_framed(&self.filename("notice", self.notice), &[], payload)?;
        self.notice += 1;
        Ok(())
    }

    fn emit_voucher(&mut self, destination: EthAddress, payload: &[u8]) -> io::Result<()> {
        let mut prefix = Vec::with_capacity(32);
        prefix.extend_from_slice(&[0u8; 12]);
        prefix.extend_from_slice(destination.as_bytes());
        self.write_framed(&self.filename("voucher", self.voucher), &prefix, payload)?;
        self.voucher += 1;
        Ok(())
    }

    fn emit_report(&mut self, payload: &[u8]) -> io::Result<()> {
        self.write_framed(&self.filename("report", self.report), &[], payload)?;
        self.report += 1;
        Ok(())
    }
}

/// Substitute the index into a `%d` filename format.
fn numbered(format: &str, index: u32) -> String {
    format.replacen("%d", &index.to_string(), 1)
}

fn read_framed(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        fs::read(path).with_context(|| format!("unable to read '{}'", path.display()))?;
    if bytes.len() < FRAME_HEADER_LENGTH {
        bail!("'{}' too short: {} bytes", path.display(), bytes.len());
    }
    Ok(bytes[FRAME_HEADER_LENGTH..].to_vec())
}

fn read_metadata(path: &Path) -> Result<InputMetadata> {
    let bytes =
        fs::read(path).with_context(|| format!("unable to read '{}'", path.display()))?;
    if bytes.len() < 12 + InputMetadata::LENGTH {
        bail!("missing metadata in '{}'", path.display());
    }
    InputMetadata::decode(&bytes[12..])
        .with_context(|| format!("malformed metadata in '{}'", path.display()))
}

/// Map the state image and run every input and query in the configured
/// ranges to completion.
pub fn run(config: &ReplayConfig) -> Result<ReplayStats> {
    let mut arena = Arena::map(Path::new(&config.image_filename), config.virtual_start)
        .context("unable to initialize rollup state")?;
    let mut dispatcher = if config.initialize {
        arena.initialize();
        Dispatcher::genesis(arena).context("unable to commit genesis state")?
    } else {
        Dispatcher::open(arena).context("unable to load state image")?
    };

    let mut stats = ReplayStats::default();
    for index in config.input_begin..config.input_end {
        let metadata_path = config.work_dir.join(numbered(&config.input_metadata_format, index));
        let metadata = read_metadata(&metadata_path)?;
        let input_path = config.work_dir.join(numbered(&config.input_format, index));
        let payload = read_framed(&input_path)?;

        let mut port = FilePort::for_input(config.work_dir.clone(), index);
        match dispatcher.advance(&metadata, &payload, &mut port) {
            Ok(()) => {
                info!(index, "accepted input");
                stats.inputs_accepted += 1;
            }
            Err(err) => {
                warn!(index, error = %err, "rejected input");
                stats.inputs_rejected += 1;
            }
        }
    }

    for index in config.query_begin..config.query_end {
        let query_path = config.work_dir.join(numbered(&config.query_format, index));
        let payload = read_framed(&query_path)?;

        let mut port = FilePort::for_query(config.work_dir.clone(), index);
        match dispatcher.inspect(&payload, &mut port) {
            Ok(()) => {
                info!(index, "accepted query");
                stats.queries_accepted += 1;
            }
            Err(err) => {
                warn!(index, error = %err, "rejected query");
                stats.queries_rejected += 1;
            }
        }
    }

    Ok(stats)
}

/// Frame a payload the way raw input and query files are framed on disk.
/// Test fixtures and input generators share this with the loop above.
pub fn frame_payload(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(FRAME_HEADER_LENGTH + payload.len());
    framed.extend_from_slice(&Be256::from_u64(32).0);
    framed.extend_from_slice(&Be256::from_u64(payload.len() as u64).0);
    framed.extend_from_slice(payload);
    framed
}

/// Frame input metadata the way metadata files are framed on disk.
pub fn frame_metadata(metadata: &InputMetadata) -> Vec<u8> {
    let mut framed = Vec::with_capacity(12 + InputMetadata::LENGTH);
    framed.extend_from_slice(&[0u8; 12]);
    framed.extend_from_slice(&metadata.encode());
    framed
}
