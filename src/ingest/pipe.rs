//! Frame source over any byte stream carrying raw BGR24 frames back to back.

use std::io::{ErrorKind, Read};

use crate::frame::{frame_len, Frame, FrameReadError, FrameSource};
use crate::tracking::FrameGeometry;

/// Reads exactly one frame's worth of bytes per call.
pub struct PipeFrameSource<R> {
    reader: R,
    geometry: FrameGeometry,
    frame_bytes: usize,
    frames_read: u64,
    partial_reads: u64,
}

impl<R: Read + Send> PipeFrameSource<R> {
    pub fn new(reader: R, geometry: FrameGeometry) -> anyhow::Result<Self> {
        let frame_bytes = frame_len(geometry.width, geometry.height)?;
        Ok(Self {
            reader,
            geometry,
            frame_bytes,
            frames_read: 0,
            partial_reads: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn partial_reads(&self) -> u64 {
        self.partial_reads
    }
}

impl<R: Read + Send> FrameSource for PipeFrameSource<R> {
    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    fn next_frame(&mut self) -> Result<Frame, FrameReadError> {
        let mut buf = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameReadError::Io(err)),
            }
        }
        if filled == 0 {
            return Err(FrameReadError::Closed);
        }
        if filled < buf.len() {
            self.partial_reads += 1;
            return Err(FrameReadError::Partial {
                expected: buf.len(),
                received: filled,
            });
        }
        self.frames_read += 1;
        Frame::new(buf, self.geometry.width, self.geometry.height).map_err(|err| {
            FrameReadError::Io(std::io::Error::new(ErrorKind::InvalidData, err.to_string()))
        })
    }
}
