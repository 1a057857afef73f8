//! [`FrameContainer`]: reads an MJPEG file as a sequence of JPEG frames with
//! random-access seek (§4.1).
//!
//! Two wire formats are accepted, auto-detected by peeking the first byte:
//! raw concatenated JPEG (each unit delimited by SOI `0xFF 0xD8` / EOI
//! `0xFF 0xD9`), or a legacy length-prefixed variant (1-10 ASCII decimal
//! digits followed immediately by that many frame bytes).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// Nominal playback rate used to convert a seek time into a frame index.
pub const FPS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerFormat {
    Raw,
    LengthPrefixed,
}

/// An opened MJPEG file plus the cursor state needed to read frames in order
/// or seek to an arbitrary one.
///
/// The format is detected once, at [`open`](Self::open), and kept as an
/// explicit discriminator so later reads never need to re-peek (§9).
pub struct FrameContainer {
    file: File,
    file_size: u64,
    format: ContainerFormat,
    /// One- or two-byte "ungetc" stack; last pushed is read first.
    pushback: Vec<u8>,
    current_frame: u64,
    total_frames: Option<u64>,
}

impl FrameContainer {
    /// Open `path`, detecting its framing format from the first byte.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|_| Error::NotFound {
            filename: path_ref.display().to_string(),
        })?;
        let file_size = file.metadata()?.len();

        let mut container = Self {
            file,
            file_size,
            format: ContainerFormat::Raw,
            pushback: Vec::with_capacity(2),
            current_frame: 0,
            total_frames: None,
        };
        container.format = container.detect_format()?;
        tracing::debug!(
            path = %path_ref.display(),
            format = ?container.format,
            file_size,
            "frame container opened"
        );
        Ok(container)
    }

    fn detect_format(&mut self) -> Result<ContainerFormat> {
        match self.read_raw_byte()? {
            None => Err(Error::Corruption("empty file".into())),
            Some(b) if b == 0xFF => {
                self.push_back(b);
                Ok(ContainerFormat::Raw)
            }
            Some(b) if b.is_ascii_digit() => {
                self.push_back(b);
                Ok(ContainerFormat::LengthPrefixed)
            }
            Some(b) => Err(Error::Corruption(format!(
                "unknown frame format: first byte {b:#04X}"
            ))),
        }
    }

    fn read_raw_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.file.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pushback.pop() {
            return Ok(Some(b));
        }
        self.read_raw_byte()
    }

    fn push_back(&mut self, b: u8) {
        self.pushback.push(b);
    }

    fn skip_bytes(&mut self, mut n: u64) -> Result<()> {
        while n > 0 {
            if self.pushback.pop().is_none() {
                break;
            }
            n -= 1;
        }
        if n > 0 {
            self.file.seek(SeekFrom::Current(n as i64))?;
        }
        Ok(())
    }

    /// Read the next frame into `out` (cleared first), returning its length.
    /// Returns `Ok(None)` at a clean end-of-stream between frames. A frame
    /// larger than `cap` is reported as [`Error::Overflow`]; for the
    /// length-prefixed format the stream position still advances past it so
    /// the next call can proceed.
    pub fn next_frame(&mut self, out: &mut Vec<u8>, cap: usize) -> Result<Option<usize>> {
        out.clear();
        match self.format {
            ContainerFormat::Raw => self.next_frame_raw(out, cap),
            ContainerFormat::LengthPrefixed => self.next_frame_length_prefixed(out, cap),
        }
    }

    fn finish(out: &[u8], cap: usize) -> Result<Option<usize>> {
        if out.len() > cap {
            Err(Error::Overflow {
                frame_size: out.len(),
                capacity: cap,
            })
        } else {
            Ok(Some(out.len()))
        }
    }

    fn next_frame_raw(&mut self, out: &mut Vec<u8>, cap: usize) -> Result<Option<usize>> {
        let Some(first) = self.read_byte()? else {
            return Ok(None);
        };
        if first != 0xFF {
            return Err(Error::Corruption(format!(
                "expected SOI, found {first:#04X}"
            )));
        }
        out.push(first);

        loop {
            let Some(ch) = self.read_byte()? else {
                self.current_frame += 1;
                return Self::finish(out, cap);
            };
            out.push(ch);

            let len = out.len();
            if len < 2 || out[len - 2] != 0xFF || out[len - 1] != 0xD9 {
                continue;
            }

            // Saw a candidate EOI; look ahead for the next frame's SOI.
            let Some(next1) = self.read_byte()? else {
                self.current_frame += 1;
                return Self::finish(out, cap);
            };
            if next1 != 0xFF {
                out.push(next1);
                continue;
            }
            let Some(next2) = self.read_byte()? else {
                // Lone trailing 0xFF belongs to this frame; file ends here.
                out.push(next1);
                self.current_frame += 1;
                return Self::finish(out, cap);
            };
            if next2 == 0xD8 {
                // Genuine next-frame SOI: push both back for the next call.
                self.push_back(next2);
                self.push_back(next1);
                self.current_frame += 1;
                return Self::finish(out, cap);
            }
            // False alarm: these two bytes are frame content, keep scanning.
            out.push(next1);
            out.push(next2);
        }
    }

    fn next_frame_length_prefixed(&mut self, out: &mut Vec<u8>, cap: usize) -> Result<Option<usize>> {
        let Some(first) = self.read_byte()? else {
            return Ok(None);
        };
        if !first.is_ascii_digit() {
            return Err(Error::Corruption(format!(
                "expected length digit, found {first:#04X}"
            )));
        }

        let mut digits = Vec::with_capacity(10);
        digits.push(first);
        while digits.len() < 10 {
            match self.read_byte()? {
                Some(b) if b.is_ascii_digit() => digits.push(b),
                Some(b) => {
                    self.push_back(b);
                    break;
                }
                None => break,
            }
        }

        let frame_len = parse_decimal(&digits)?;
        if frame_len > cap as u64 {
            self.skip_bytes(frame_len)?;
            return Err(Error::Overflow {
                frame_size: frame_len as usize,
                capacity: cap,
            });
        }

        out.reserve(frame_len as usize);
        for _ in 0..frame_len {
            match self.read_byte()? {
                Some(b) => out.push(b),
                None => return Err(Error::Corruption("truncated frame body".into())),
            }
        }
        self.current_frame += 1;
        Ok(Some(out.len()))
    }

    /// Rewind to the start of the file and advance past `frame_number` frame
    /// boundaries (negative inputs clamp to zero). Returns the frame index
    /// actually reached, which is less than requested on early EOF.
    pub fn seek_frame(&mut self, frame_number: i64) -> Result<u64> {
        let target = frame_number.max(0) as u64;
        self.pushback.clear();
        self.file.seek(SeekFrom::Start(0))?;
        match self.format {
            ContainerFormat::Raw => self.seek_frame_raw(target),
            ContainerFormat::LengthPrefixed => self.seek_frame_length_prefixed(target),
        }
    }

    /// Convenience wrapper converting a wall-clock time into a target frame
    /// via the nominal [`FPS`] and delegating to [`seek_frame`](Self::seek_frame).
    pub fn seek_time(&mut self, time_seconds: f64) -> Result<u64> {
        let clamped = time_seconds.max(0.0);
        self.seek_frame((clamped * FPS) as i64)
    }

    fn seek_frame_raw(&mut self, target: u64) -> Result<u64> {
        let mut frames_scanned = 0u64;
        let mut prev: Option<u8> = None;
        loop {
            let Some(ch) = self.read_byte()? else {
                self.current_frame = frames_scanned;
                return Ok(frames_scanned);
            };
            if prev == Some(0xFF) && ch == 0xD8 {
                if frames_scanned == target {
                    self.push_back(ch);
                    self.push_back(0xFF);
                    self.current_frame = target;
                    return Ok(target);
                }
                frames_scanned += 1;
            }
            prev = Some(ch);
        }
    }

    fn seek_frame_length_prefixed(&mut self, target: u64) -> Result<u64> {
        for i in 0..target {
            let Some(first) = self.read_byte()? else {
                self.current_frame = i;
                return Ok(i);
            };
            if !first.is_ascii_digit() {
                return Err(Error::Corruption(
                    "invalid frame header while seeking".into(),
                ));
            }
            let mut digits = vec![first];
            while digits.len() < 10 {
                match self.read_byte()? {
                    Some(b) if b.is_ascii_digit() => digits.push(b),
                    Some(b) => {
                        self.push_back(b);
                        break;
                    }
                    None => break,
                }
            }
            let frame_len = parse_decimal(&digits)?;
            self.skip_bytes(frame_len)?;
            self.current_frame = i + 1;
        }
        Ok(target)
    }

    /// Total frame count, scanning the whole file once and caching the
    /// result. Raw MJPEG is scanned backward counting EOI markers, which is
    /// faster in practice than a forward SOI scan on large files.
    pub fn get_total_frames(&mut self) -> Result<u64> {
        if let Some(total) = self.total_frames {
            return Ok(total);
        }

        let saved_pos = self.file.stream_position()?;
        let saved_pushback = std::mem::take(&mut self.pushback);
        let saved_frame = self.current_frame;

        let total = match self.format {
            ContainerFormat::Raw => self.count_frames_raw_backward()?,
            ContainerFormat::LengthPrefixed => self.count_frames_length_prefixed_forward()?,
        };

        self.file.seek(SeekFrom::Start(saved_pos))?;
        self.pushback = saved_pushback;
        self.current_frame = saved_frame;
        self.total_frames = Some(total);
        Ok(total)
    }

    fn count_frames_raw_backward(&mut self) -> Result<u64> {
        let mut total = 0u64;
        let mut prev_byte: Option<u8> = None;
        let mut buf = [0u8; 1];
        let mut pos = self.file_size as i64 - 1;
        while pos >= 0 {
            self.file.seek(SeekFrom::Start(pos as u64))?;
            self.file.read_exact(&mut buf)?;
            let ch = buf[0];
            if prev_byte == Some(0xD9) && ch == 0xFF {
                total += 1;
            }
            prev_byte = Some(ch);
            pos -= 1;
        }
        Ok(total)
    }

    fn count_frames_length_prefixed_forward(&mut self) -> Result<u64> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut total = 0u64;
        loop {
            let Some(first) = self.read_raw_byte()? else {
                break;
            };
            if !first.is_ascii_digit() {
                break;
            }
            let mut digits = vec![first];
            while digits.len() < 10 {
                match self.read_raw_byte()? {
                    Some(b) if b.is_ascii_digit() => digits.push(b),
                    Some(_) => {
                        self.file.seek(SeekFrom::Current(-1))?;
                        break;
                    }
                    None => break,
                }
            }
            let frame_len = match parse_decimal(&digits) {
                Ok(v) if v > 0 => v,
                _ => break,
            };
            if self.file.seek(SeekFrom::Current(frame_len as i64)).is_err() {
                break;
            }
            total += 1;
        }
        Ok(total)
    }

    /// The zero-based index of the frame that will be returned by the next
    /// successful [`next_frame`](Self::next_frame) call.
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }
}

fn parse_decimal(digits: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(digits)
        .map_err(|_| Error::Corruption("non-ASCII length digits".into()))?;
    let value: u64 = text
        .parse()
        .map_err(|_| Error::Corruption(format!("invalid frame length: {text}")))?;
    if value == 0 {
        return Err(Error::Corruption("invalid frame length: 0".into()));
    }
    Ok(value)
}
