// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! CARv1 containers: a varint-framed `dag-cbor` header naming the roots,
//! followed by varint-framed `(cid, payload)` records with no padding.
//!
//! Offsets matter here. A manifest points at the payload of a record, not at
//! its frame, so every encoder in this module reports where the payload
//! starts relative to the bytes it produced.

use crate::utils::multihash::prelude::*;
use bytes::{Buf as _, Bytes};
use cid::Cid;
use futures::{Stream, StreamExt as _};
use integer_encoding::VarInt as _;
use nunny::Vec as NonEmpty;
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use unsigned_varint::codec::UviBytes;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CarV1Header {
    // The roots array must contain one or more CIDs.
    // See <https://ipld.io/specs/transport/car/carv1/#constraints>
    pub roots: NonEmpty<Cid>,
    pub version: u64,
}

impl CarV1Header {
    pub fn new(roots: NonEmpty<Cid>) -> Self {
        Self { roots, version: 1 }
    }

    /// The header as it appears at offset 0 of a container, varint prefix included.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let body = serde_ipld_dagcbor::to_vec(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut frame = body.len().encode_var_vec();
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    fn decode(frame: &[u8]) -> io::Result<Self> {
        let header: CarV1Header = serde_ipld_dagcbor::from_slice(frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if header.version != 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported CAR version {}", header.version),
            ));
        }
        Ok(header)
    }
}

/// Where the parts of one encoded record sit, relative to the first byte of
/// its varint prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Total bytes of the record: varint, cid and payload.
    pub len: usize,
    /// Bytes preceding the payload: varint and cid.
    pub payload_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarBlock {
    pub cid: Cid,
    pub data: Vec<u8>,
}

impl CarBlock {
    /// The cid length depends on its version, hash function and digest size,
    /// so it is measured rather than assumed.
    pub fn frame_layout(&self) -> FrameLayout {
        let frame_length = self.cid.encoded_len() + self.data.len();
        let payload_offset = frame_length.required_space() + self.cid.encoded_len();
        FrameLayout {
            len: payload_offset + self.data.len(),
            payload_offset,
        }
    }

    // Write a varint frame containing the cid and the data
    pub fn write(&self, mut writer: &mut impl io::Write) -> io::Result<FrameLayout> {
        let frame_length = self.cid.encoded_len() + self.data.len();
        writer.write_all(&frame_length.encode_var_vec())?;
        #[allow(clippy::needless_borrows_for_generic_args)]
        self.cid
            .write_bytes(&mut writer)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(&self.data)?;
        Ok(self.frame_layout())
    }

    /// Encodes the record on its own, returning the bytes and the offset of
    /// the payload within them.
    pub fn encode(&self) -> io::Result<(Vec<u8>, usize)> {
        let mut buf = Vec::with_capacity(self.frame_layout().len);
        let layout = self.write(&mut buf)?;
        debug_assert_eq!(layout.len, buf.len());
        Ok((buf, layout.payload_offset))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> io::Result<CarBlock> {
        let bytes: Bytes = bytes.into();
        let mut cursor = bytes.reader();
        let cid = Cid::read_bytes(&mut cursor)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let bytes = cursor.into_inner();
        Ok(CarBlock {
            cid,
            data: bytes.to_vec(),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let actual = {
            let code = MultihashCode::try_from(self.cid.hash().code())?;
            Cid::new_v1(self.cid.codec(), code.digest(&self.data))
        };
        anyhow::ensure!(
            actual == self.cid,
            "CID/Block mismatch for block {}, actual: {actual}",
            self.cid
        );
        Ok(())
    }
}

/// Byte range of one record's payload inside an encoded container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPosition {
    pub cid: Cid,
    pub offset: u64,
    pub length: u64,
}

/// Encodes a whole container in memory, returning the bytes together with the
/// payload position of every record in encounter order.
pub fn encode_car(
    roots: NonEmpty<Cid>,
    blocks: &[CarBlock],
) -> io::Result<(Vec<u8>, Vec<RecordPosition>)> {
    let mut buf = CarV1Header::new(roots).encode()?;
    let mut positions = Vec::with_capacity(blocks.len());
    for block in blocks {
        let start = buf.len();
        let layout = block.write(&mut buf)?;
        positions.push(RecordPosition {
            cid: block.cid,
            offset: (start + layout.payload_offset) as u64,
            length: block.data.len() as u64,
        });
    }
    Ok((buf, positions))
}

pin_project! {
    /// Stream of CAR blocks. Every block is checked against its CID, and the
    /// first malformed frame or mismatched block ends the stream with an error.
    pub struct CarStream<ReaderT> {
        #[pin]
        reader: FramedRead<ReaderT, UviBytes>,
        pub header: CarV1Header,
        failed: bool,
    }
}

impl<ReaderT: AsyncRead + Unpin> CarStream<ReaderT> {
    pub async fn new(reader: ReaderT) -> io::Result<Self> {
        let mut reader = FramedRead::new(reader, UviBytes::default());
        let frame = reader.next().await.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "missing CAR header")
        })??;
        let header = CarV1Header::decode(&frame)?;
        Ok(CarStream {
            reader,
            header,
            failed: false,
        })
    }
}

impl<ReaderT: AsyncRead> Stream for CarStream<ReaderT> {
    type Item = io::Result<CarBlock>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.failed {
            return Poll::Ready(None);
        }
        let item = futures::ready!(this.reader.poll_next(cx)).map(|frame| {
            let block = CarBlock::from_bytes(frame?)?;
            block
                .validate()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(block)
        });
        if matches!(item, Some(Err(_))) {
            *this.failed = true;
        }
        Poll::Ready(item)
    }
}
