use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::message::{DataMessage, LinkDirection, MessageDecodeError};

// TAG(1) LEN(2, BE)
const RECORD_HEADER_BYTES: usize = 3;

pub const TAG_L1_TO_TRX: u8 = 0x01;
pub const TAG_TRX_TO_L1: u8 = 0x02;

pub fn direction_tag(direction: LinkDirection) -> u8 {
    match direction {
        LinkDirection::L1ToTrx => TAG_L1_TO_TRX,
        LinkDirection::TrxToL1 => TAG_TRX_TO_L1,
    }
}

fn tag_direction(tag: u8) -> Option<LinkDirection> {
    match tag {
        TAG_L1_TO_TRX => Some(LinkDirection::L1ToTrx),
        TAG_TRX_TO_L1 => Some(LinkDirection::TrxToL1),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub direction: LinkDirection,
    pub payload: Vec<u8>,
}

impl CaptureRecord {
    pub fn decode_message(&self) -> Result<DataMessage, MessageDecodeError> {
        DataMessage::decode(self.direction, &self.payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    pub direction: LinkDirection,
    pub payload: &'a [u8],
    pub consumed_bytes: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecodeError {
    #[error("need more bytes")]
    NeedMoreData,
    #[error("unknown record tag {0:#04x}")]
    UnknownTag(u8),
    #[error("record length must be > 0")]
    LengthZero,
}

pub fn decode_record_from_slice(
    data: &[u8],
) -> Result<DecodedRecord<'_>, CaptureDecodeError> {
    if data.len() < RECORD_HEADER_BYTES {
        return Err(CaptureDecodeError::NeedMoreData);
    }

    let direction = tag_direction(data[0]).ok_or(CaptureDecodeError::UnknownTag(data[0]))?;
    let declared_bytes = u16::from_be_bytes([data[1], data[2]]) as usize;
    if declared_bytes == 0 {
        return Err(CaptureDecodeError::LengthZero);
    }

    let record_end = RECORD_HEADER_BYTES + declared_bytes;
    if data.len() < record_end {
        return Err(CaptureDecodeError::NeedMoreData);
    }

    Ok(DecodedRecord {
        direction,
        payload: &data[RECORD_HEADER_BYTES..record_end],
        consumed_bytes: record_end,
    })
}

#[derive(Debug, Error)]
pub enum RecordReadError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown record tag {0:#04x}")]
    UnknownTag(u8),
    #[error("record length must be > 0")]
    LengthZero,
    #[error("incomplete record")]
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadRecord {
    EndOfStream,
    Record(CaptureRecord),
}

pub async fn read_record<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<ReadRecord, RecordReadError> {
    let mut header = [0u8; RECORD_HEADER_BYTES];
    let mut read = 0usize;
    while read < RECORD_HEADER_BYTES {
        let n = reader.read(&mut header[read..]).await?;
        if n == 0 {
            if read == 0 {
                return Ok(ReadRecord::EndOfStream);
            }
            return Err(RecordReadError::Incomplete);
        }
        read += n;
    }

    let direction = tag_direction(header[0]).ok_or(RecordReadError::UnknownTag(header[0]))?;
    let declared_bytes = u16::from_be_bytes([header[1], header[2]]) as usize;
    if declared_bytes == 0 {
        return Err(RecordReadError::LengthZero);
    }

    let mut payload = vec![0u8; declared_bytes];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(ReadRecord::Record(CaptureRecord { direction, payload })),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(RecordReadError::Incomplete),
        Err(err) => Err(RecordReadError::Io(err)),
    }
}

/// Writes one record with a single `write_all` so a record is never split
/// across two writes. A failed write may still leave a partial record behind;
/// [`CaptureWriter`] truncates it away.
pub async fn write_record<W: AsyncWrite + Unpin>(
    writer: &mut W,
    direction: LinkDirection,
    payload: &[u8],
) -> io::Result<()> {
    let len_u16 = u16::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?;
    let mut record = Vec::with_capacity(RECORD_HEADER_BYTES + payload.len());
    record.push(direction_tag(direction));
    record.extend_from_slice(&len_u16.to_be_bytes());
    record.extend_from_slice(payload);
    writer.write_all(&record).await?;
    writer.flush().await
}

/// Append-only capture of every message sent during a run.
#[derive(Debug)]
pub struct CaptureWriter {
    file: File,
    path: PathBuf,
    records: u64,
    // File length after the last complete record.
    committed_len: u64,
}

impl CaptureWriter {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed opening capture file {}", path.display()))?;
        let committed_len = file
            .metadata()
            .await
            .with_context(|| format!("failed reading capture file {}", path.display()))?
            .len();
        Ok(Self {
            file,
            path,
            records: 0,
            committed_len,
        })
    }

    /// Appends one record. On failure the file is cut back to its last
    /// complete record so later reads do not hit a partial one.
    pub async fn append(&mut self, msg: &DataMessage) -> io::Result<()> {
        let payload = msg.encode();
        if let Err(err) = self.write_and_sync(msg.direction(), &payload).await {
            self.discard_uncommitted().await;
            return Err(err);
        }
        self.committed_len += (RECORD_HEADER_BYTES + payload.len()) as u64;
        self.records += 1;
        Ok(())
    }

    async fn write_and_sync(
        &mut self,
        direction: LinkDirection,
        payload: &[u8],
    ) -> io::Result<()> {
        write_record(&mut self.file, direction, payload).await?;
        self.file.sync_data().await
    }

    async fn discard_uncommitted(&mut self) {
        if let Err(err) = self.file.set_len(self.committed_len).await {
            warn!(
                path = %self.path.display(),
                error = %err,
                "could not truncate partial capture record"
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this writer, not counting earlier content.
    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Reads every record of a capture file in order.
pub async fn read_capture_file(path: impl AsRef<Path>) -> Result<Vec<CaptureRecord>> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .await
        .with_context(|| format!("failed opening capture file {}", path.display()))?;
    let mut records = Vec::new();
    loop {
        match read_record(&mut file)
            .await
            .with_context(|| format!("corrupt capture file {}", path.display()))?
        {
            ReadRecord::EndOfStream => return Ok(records),
            ReadRecord::Record(record) => records.push(record),
        }
    }
}
