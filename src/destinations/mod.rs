//! Polymorphic destination record (spec §9 "Polymorphic destinations"):
//! `Destination = File | BlockDevice | Socket | Stdout | Hash(algo)`, each
//! implementing `{open, write_chunk, finalize, close, result}`.

pub mod hash;
pub mod scratch;
pub mod write_adapter;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use crate::error::{FlowbufError, Result};
use hash::{DigestAlgorithm, DigestProvider};
use write_adapter::WriteAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    File,
    BlockDevice,
    Socket,
    Stdout,
    Hash,
}

enum Sink {
    File(File),
    Socket(TcpStream),
    Stdout(io::Stdout),
    Hash(DigestProvider),
}

/// One consumer's destination state: argument, open handle, and the
/// `result` string reported in the post-mortem summary (spec §3
/// "Destination descriptor").
pub struct Destination {
    pub name: String,
    pub kind: DestinationKind,
    pub argument: String,
    sink: Sink,
    adapter: Option<WriteAdapter>,
    result: Option<String>,
}

/// How an output destination should be (re)opened, carried across
/// volume changes (spec §4.8).
#[derive(Debug, Clone)]
pub struct OutputOpenSpec {
    pub path: PathBuf,
    pub append: bool,
    pub truncate: bool,
    pub force: bool,
    pub sync_writes: bool,
    pub direct: bool,
}

fn is_block_device(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        fs::metadata(path).map(|m| m.file_type().is_block_device()).unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}

impl Destination {
    pub fn open_file(name: impl Into<String>, spec: &OutputOpenSpec) -> Result<Self> {
        let name = name.into();
        let kind =
            if is_block_device(&spec.path) { DestinationKind::BlockDevice } else { DestinationKind::File };

        // Tape/block devices and paths under /dev/ never honor O_EXCL, and
        // an existing regular file needs --force/--truncate/--append to be
        // opened at all (spec §4.8: "dropping O_EXCL when the path begins
        // with /dev/").
        let drop_excl = kind == DestinationKind::BlockDevice
            || spec.path.to_string_lossy().starts_with("/dev/");

        let mut options = OpenOptions::new();
        options.write(true);
        if spec.append {
            options.append(true).create(true);
        } else if spec.truncate {
            options.create(true).truncate(true);
        } else if spec.force || drop_excl {
            options.create(true);
        } else {
            options.create_new(true);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut flags = 0;
            if spec.sync_writes {
                flags |= libc::O_SYNC;
            }
            if spec.direct {
                flags |= libc::O_DIRECT;
            }
            if flags != 0 {
                options.custom_flags(flags);
            }
        }

        let file = options.open(&spec.path).map_err(|e| {
            FlowbufError::destination(name.clone(), format!("open {}: {e}", spec.path.display()))
        })?;

        Ok(Self {
            name,
            kind,
            argument: spec.path.display().to_string(),
            sink: Sink::File(file),
            adapter: Some(WriteAdapter::new(spec.direct)),
            result: None,
        })
    }

    pub fn reopen(&mut self, spec: &OutputOpenSpec) -> Result<()> {
        let fresh = Self::open_file(self.name.clone(), spec)?;
        self.kind = fresh.kind;
        self.argument = fresh.argument;
        self.sink = fresh.sink;
        self.adapter = fresh.adapter;
        Ok(())
    }

    pub fn open_socket(name: impl Into<String>, addr: &str) -> Result<Self> {
        let name = name.into();
        let stream = TcpStream::connect(addr)
            .map_err(|e| FlowbufError::destination(name.clone(), format!("connect {addr}: {e}")))?;
        Ok(Self {
            name,
            kind: DestinationKind::Socket,
            argument: addr.to_string(),
            sink: Sink::Socket(stream),
            adapter: Some(WriteAdapter::new(false)),
            result: None,
        })
    }

    pub fn stdout(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Stdout,
            argument: "-".to_string(),
            sink: Sink::Stdout(io::stdout()),
            adapter: Some(WriteAdapter::new(false)),
            result: None,
        }
    }

    pub fn hash(name: impl Into<String>, algo: DigestAlgorithm) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Hash,
            argument: algo.name().to_string(),
            sink: Sink::Hash(algo.provider()),
            adapter: None,
            result: None,
        }
    }

    pub fn write_chunk(&mut self, buf: &[u8]) -> Result<()> {
        self.write_chunk_io(buf).map_err(|e| FlowbufError::destination(self.name.clone(), e.to_string()))
    }

    /// Same as [`Destination::write_chunk`] but surfaces the raw `io::Error`
    /// so the primary-destination write path can run the tape `ENOSPC`
    /// heuristic of spec §4.6 step 8.
    pub fn write_chunk_io(&mut self, buf: &[u8]) -> io::Result<()> {
        match &mut self.sink {
            Sink::File(f) => self.adapter.as_ref().unwrap().write_all(f, buf),
            Sink::Socket(s) => self.adapter.as_ref().unwrap().write_all(s, buf),
            Sink::Stdout(_) => {
                let mut lock = io::stdout().lock();
                lock.write_all(buf)
            }
            Sink::Hash(h) => {
                h.update(buf);
                Ok(())
            }
        }
    }

    /// Flush and fsync a file-backed destination, used before a volume
    /// change and at normal completion (spec §4.7, §4.8).
    pub fn sync(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::File(f) => f.sync_all().map_err(|e| FlowbufError::destination(self.name.clone(), e.to_string())),
            Sink::Socket(s) => s.flush().map_err(|e| FlowbufError::destination(self.name.clone(), e.to_string())),
            Sink::Stdout(_) | Sink::Hash(_) => Ok(()),
        }
    }

    /// Called once, when the fan-out barrier publishes `size == 0`: finalize
    /// the destination's result string (spec §4.7).
    pub fn finalize(&mut self) {
        if self.result.is_some() {
            return;
        }
        let _ = self.sync();
        self.result = Some(match std::mem::replace(&mut self.sink, Sink::Stdout(io::stdout())) {
            Sink::Hash(h) => h.finalize_hex(),
            _ => "ok".to_string(),
        });
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        if self.result.is_none() {
            self.result = Some(message.into());
        }
    }

    pub fn record_canceled(&mut self) {
        if self.result.is_none() {
            self.result = Some("canceled".to_string());
        }
    }

    pub fn result(&self) -> &str {
        self.result.as_deref().unwrap_or("canceled")
    }

    pub fn is_tape_aware_candidate(&self) -> bool {
        matches!(self.kind, DestinationKind::BlockDevice)
    }
}
