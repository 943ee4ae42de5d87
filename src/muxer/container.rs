//! Container file format
//!
//! A recording is a single little-endian file:
//! - magic `SRCF`, `u16` version, `u32` header length, header JSON
//! - records: `u8` track id, `i64` pts (µs), `u32` payload length, payload
//! - end marker `0xFF`, `u32` trailer length, trailer JSON
//!
//! Records of different tracks are interleaved in the order the writer
//! worker received them; within a track they keep arrival order.

use crate::capture::traits::{MediaSample, TrackKind, VideoQuality};
use crate::utils::error::{RecorderError, RecorderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// File magic
pub const MAGIC: &[u8; 4] = b"SRCF";

/// Current format version
pub const FORMAT_VERSION: u16 = 1;

/// Extension used for recording files
pub const FILE_EXTENSION: &str = "srcf";

const END_MARKER: u8 = 0xFF;

/// Track table entry in the header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub id: u8,
    pub kind: TrackKind,
}

/// Header written when the container is allocated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerHeader {
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub tracks: Vec<TrackEntry>,
    pub video_quality: VideoQuality,
}

impl ContainerHeader {
    pub fn new(tracks: &[TrackKind], video_quality: VideoQuality) -> Self {
        Self {
            format: format!("srcf-v{}", FORMAT_VERSION),
            created_at: Utc::now(),
            tracks: tracks
                .iter()
                .map(|kind| TrackEntry {
                    id: kind.id(),
                    kind: *kind,
                })
                .collect(),
            video_quality,
        }
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}

/// Per-track totals written on finalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackTrailer {
    pub kind: TrackKind,
    pub samples: u64,
    pub bytes: u64,
    pub first_pts_us: Option<i64>,
    pub last_pts_us: Option<i64>,
}

impl TrackTrailer {
    fn empty(kind: TrackKind) -> Self {
        Self {
            kind,
            samples: 0,
            bytes: 0,
            first_pts_us: None,
            last_pts_us: None,
        }
    }
}

/// Trailer written when the container is finalized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTrailer {
    /// Session start-time anchor (first accepted video timestamp)
    pub anchor_us: Option<i64>,
    pub tracks: Vec<TrackTrailer>,
    pub finalized_at: DateTime<Utc>,
}

impl ContainerTrailer {
    pub fn track(&self, kind: TrackKind) -> Option<&TrackTrailer> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

/// Length prefix for a framed block; blocks must fit in a `u32`
fn frame_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("block of {} bytes exceeds the 4 GiB frame limit", len),
        )
    })
}

/// Write side of a container. Owned by the writer worker.
pub struct ContainerFile {
    path: PathBuf,
    out: BufWriter<File>,
    totals: Vec<TrackTrailer>,
}

impl ContainerFile {
    /// Create a new container at `path` and write its header.
    ///
    /// An existing file at `path` is never overwritten.
    pub fn create(path: &Path, header: &ContainerHeader) -> RecorderResult<Self> {
        let allocation_failed =
            |e: io::Error| RecorderError::WriterAllocationFailed(format!("{}: {}", path.display(), e));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(allocation_failed)?;

        let mut out = BufWriter::new(file);
        let header_json = serde_json::to_vec(header)?;
        let header_len = frame_len(header_json.len()).map_err(allocation_failed)?;

        out.write_all(MAGIC).map_err(allocation_failed)?;
        out.write_all(&FORMAT_VERSION.to_le_bytes()).map_err(allocation_failed)?;
        out.write_all(&header_len.to_le_bytes()).map_err(allocation_failed)?;
        out.write_all(&header_json).map_err(allocation_failed)?;
        out.flush().map_err(allocation_failed)?;

        Ok(Self {
            path: path.to_path_buf(),
            out,
            totals: header.tracks.iter().map(|t| TrackTrailer::empty(t.kind)).collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sample record
    pub fn write_sample(&mut self, sample: &MediaSample) -> io::Result<()> {
        let totals = self
            .totals
            .iter_mut()
            .find(|t| t.kind == sample.track)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("track {} is not part of this container", sample.track),
                )
            })?;
        let payload_len = frame_len(sample.payload.len())?;

        self.out.write_all(&[sample.track.id()])?;
        self.out.write_all(&sample.pts_us.to_le_bytes())?;
        self.out.write_all(&payload_len.to_le_bytes())?;
        self.out.write_all(&sample.payload)?;

        totals.samples += 1;
        totals.bytes += sample.payload.len() as u64;
        totals.first_pts_us.get_or_insert(sample.pts_us);
        totals.last_pts_us = Some(sample.pts_us);
        Ok(())
    }

    /// Write the trailer, flush and sync the file
    pub fn finalize(mut self, anchor_us: Option<i64>) -> io::Result<ContainerTrailer> {
        let trailer = ContainerTrailer {
            anchor_us,
            tracks: self.totals.clone(),
            finalized_at: Utc::now(),
        };
        let trailer_json = serde_json::to_vec(&trailer)?;
        let trailer_len = frame_len(trailer_json.len())?;

        self.out.write_all(&[END_MARKER])?;
        self.out.write_all(&trailer_len.to_le_bytes())?;
        self.out.write_all(&trailer_json)?;
        self.out.flush()?;
        self.out.get_ref().sync_all()?;

        Ok(trailer)
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub kind: TrackKind,
    pub pts_us: i64,
    pub payload: Vec<u8>,
}

/// Sequential reader over a finalized container
pub struct ContainerReader {
    input: BufReader<File>,
    header: ContainerHeader,
    trailer: Option<ContainerTrailer>,
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn read_u32(input: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

impl ContainerReader {
    /// Open a container and parse its header
    pub fn open(path: &Path) -> RecorderResult<Self> {
        let mut input = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        input.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(invalid_data("not a recording container").into());
        }

        let mut version = [0u8; 2];
        input.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(invalid_data(format!("unsupported container version {}", version)).into());
        }

        let header_len = read_u32(&mut input)? as usize;
        let mut header_json = vec![0u8; header_len];
        input.read_exact(&mut header_json)?;
        let header: ContainerHeader = serde_json::from_slice(&header_json)?;

        Ok(Self {
            input,
            header,
            trailer: None,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Trailer, available once [`ContainerReader::next_record`] returned `None`
    pub fn trailer(&self) -> Option<&ContainerTrailer> {
        self.trailer.as_ref()
    }

    /// Read the next record; `None` after the end marker
    pub fn next_record(&mut self) -> RecorderResult<Option<ContainerRecord>> {
        if self.trailer.is_some() {
            return Ok(None);
        }

        let mut tag = [0u8; 1];
        self.input.read_exact(&mut tag)?;

        if tag[0] == END_MARKER {
            let trailer_len = read_u32(&mut self.input)? as usize;
            let mut trailer_json = vec![0u8; trailer_len];
            self.input.read_exact(&mut trailer_json)?;
            self.trailer = Some(serde_json::from_slice(&trailer_json)?);
            return Ok(None);
        }

        let kind = TrackKind::from_id(tag[0])
            .ok_or_else(|| invalid_data(format!("unknown track id {}", tag[0])))?;
        if !self.header.has_track(kind) {
            return Err(invalid_data(format!("record for undeclared track {}", kind)).into());
        }

        let mut pts = [0u8; 8];
        self.input.read_exact(&mut pts)?;
        let len = read_u32(&mut self.input)? as usize;
        let mut payload = vec![0u8; len];
        self.input.read_exact(&mut payload)?;

        Ok(Some(ContainerRecord {
            kind,
            pts_us: i64::from_le_bytes(pts),
            payload,
        }))
    }
}

/// Timestamp and size of one record, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInfo {
    pub kind: TrackKind,
    pub pts_us: i64,
    pub len: usize,
}

/// Everything in a container except the payloads
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub header: ContainerHeader,
    pub trailer: ContainerTrailer,
    pub records: Vec<RecordInfo>,
}

impl ContainerSummary {
    /// Track kinds declared in the header
    pub fn track_kinds(&self) -> Vec<TrackKind> {
        self.header.tracks.iter().map(|t| t.kind).collect()
    }

    /// Timestamps of one track, in file order
    pub fn timestamps(&self, kind: TrackKind) -> Vec<i64> {
        self.records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.pts_us)
            .collect()
    }

    /// Duration between the anchor and the last record of any track
    pub fn duration_us(&self) -> i64 {
        let anchor = self.trailer.anchor_us.unwrap_or(0);
        self.records
            .iter()
            .map(|r| r.pts_us - anchor)
            .max()
            .unwrap_or(0)
    }
}

/// Read a whole finalized container
pub fn read_summary(path: &Path) -> RecorderResult<ContainerSummary> {
    let mut reader = ContainerReader::open(path)?;
    let mut records = Vec::new();

    while let Some(record) = reader.next_record()? {
        records.push(RecordInfo {
            kind: record.kind,
            pts_us: record.pts_us,
            len: record.payload.len(),
        });
    }

    let trailer = reader
        .trailer
        .take()
        .ok_or_else(|| invalid_data("container has no trailer"))?;

    Ok(ContainerSummary {
        header: reader.header,
        trailer,
        records,
    })
}
