//! MJPEG stream publisher
//!
//! The producer stores each encoded frame in a watch channel; every consumer
//! stream reads the latest value. Slow consumers skip frames and the producer
//! never waits on them. Streams only end when the publisher is closed: on
//! shutdown, or when a live run loses its frame source.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

/// Multipart boundary between frames
pub const BOUNDARY: &str = "frame";

/// Response content type of the MJPEG stream
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Body stream of multipart chunks
pub type MjpegStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// A rendered frame encoded as JPEG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub jpeg: Bytes,
    pub sequence: u32,
    pub timestamp_ns: u64,
}

impl EncodedFrame {
    pub fn new(jpeg: impl Into<Bytes>, sequence: u32, timestamp_ns: u64) -> Self {
        Self {
            jpeg: jpeg.into(),
            sequence,
            timestamp_ns,
        }
    }
}

#[derive(Debug, Clone)]
enum Feed {
    Waiting,
    Frame(EncodedFrame),
    Closed,
}

/// Latest-frame broadcaster for stream consumers
#[derive(Debug, Clone)]
pub struct StreamPublisher {
    tx: Arc<watch::Sender<Feed>>,
}

impl StreamPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Feed::Waiting);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the latest frame; succeeds with or without consumers
    pub fn publish(&self, frame: EncodedFrame) {
        self.tx.send_replace(Feed::Frame(frame));
    }

    /// End every attached stream
    pub fn close(&self) {
        self.tx.send_replace(Feed::Closed);
    }

    /// Accept consumers again after `close`; attached streams are unaffected
    pub fn reopen(&self) {
        self.tx.send_if_modified(|feed| {
            if matches!(feed, Feed::Closed) {
                *feed = Feed::Waiting;
                true
            } else {
                false
            }
        });
    }

    /// Last published frame
    pub fn latest(&self) -> Option<EncodedFrame> {
        match &*self.tx.borrow() {
            Feed::Frame(frame) => Some(frame.clone()),
            Feed::Waiting | Feed::Closed => None,
        }
    }

    /// Number of attached consumers
    pub fn consumers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Attach a consumer.
    ///
    /// The stream starts with the latest frame (if any) and then yields each
    /// newer frame it gets to observe, until the publisher is closed.
    pub fn subscribe(&self) -> MjpegStream {
        let frames = WatchStream::new(self.tx.subscribe())
            .take_while(|feed| !matches!(feed, Feed::Closed))
            .filter_map(|feed| match feed {
                Feed::Frame(frame) => Some(Ok::<_, Infallible>(multipart_chunk(&frame))),
                Feed::Waiting | Feed::Closed => None,
            });
        Box::pin(frames)
    }
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// One boundary-delimited part of the multipart body
pub fn multipart_chunk(frame: &EncodedFrame) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.jpeg.len()
    );
    let mut chunk = BytesMut::with_capacity(header.len() + frame.jpeg.len() + 2);
    chunk.put_slice(header.as_bytes());
    chunk.put_slice(&frame.jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}
