#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use teledyne_dvl::{DvlError, Result, Transport};

/// Scripted device: replies to known commands, records every write and
/// serves input in small chunks so frames arrive split across reads.
pub struct MockTransport {
    pub writes: Vec<Vec<u8>>,
    pub breaks: usize,
    pub reads: usize,
    pub fail_break: bool,
    /// Local line speed, changed through `set_baud_rate`
    pub baud_rate: u32,
    /// Reply `>` to any command without a scripted reply
    pub ack_all: bool,
    /// Number of leading `\n` probes left unanswered
    pub deaf_probes: usize,
    chunk_size: usize,
    scripted: Vec<(Vec<u8>, VecDeque<Vec<u8>>)>,
    pending: VecDeque<u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            writes: Vec::new(),
            breaks: 0,
            reads: 0,
            fail_break: false,
            baud_rate: 9600,
            ack_all: false,
            deaf_probes: 0,
            chunk_size: 3,
            scripted: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// A device that acknowledges everything
    pub fn acking() -> Self {
        let mut mock = Self::new();
        mock.ack_all = true;
        mock
    }

    /// Queue `reply` for the next write of `command`
    pub fn on(mut self, command: &str, reply: &[u8]) -> Self {
        let command = command.as_bytes().to_vec();
        match self.scripted.iter_mut().find(|(c, _)| *c == command) {
            Some((_, replies)) => replies.push_back(reply.to_vec()),
            None => self.scripted.push((command, VecDeque::from([reply.to_vec()]))),
        }
        self
    }

    /// Make bytes available to the next reads regardless of writes
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    fn reply_to(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        if bytes == b"\n" && self.deaf_probes > 0 {
            self.deaf_probes -= 1;
            return None;
        }
        if let Some((_, replies)) = self.scripted.iter_mut().find(|(c, _)| c == bytes) {
            if let Some(reply) = replies.pop_front() {
                return Some(reply);
            }
        }
        let is_start_pinging = bytes == b"CS\n";
        if self.ack_all && !is_start_pinging {
            Some(b">".to_vec())
        } else {
            None
        }
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize> {
        self.writes.push(bytes.to_vec());
        if let Some(reply) = self.reply_to(bytes) {
            self.pending.extend(reply);
        }
        Ok(bytes.len())
    }

    fn read_available(&mut self, buffer: &mut [u8], _timeout: Duration) -> Result<usize> {
        self.reads += 1;
        if self.pending.is_empty() {
            return Err(DvlError::Timeout);
        }
        let n = buffer.len().min(self.chunk_size).min(self.pending.len());
        for slot in buffer.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn send_break(&mut self) -> Result<()> {
        if self.fail_break {
            return Err(DvlError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "tcsendbreak failed",
            )));
        }
        self.breaks += 1;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn baud_rate(&self) -> Result<u32> {
        Ok(self.baud_rate)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.baud_rate = baud_rate;
        Ok(())
    }
}

/// Minimal valid PD0 ensemble carrying `payload` as its only data type
pub fn pd0_frame(payload: &[u8]) -> Vec<u8> {
    let size = 8 + payload.len();
    let mut frame = vec![0x7F, 0x7F];
    frame.extend_from_slice(&(size as u16).to_le_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00]);
    frame.extend_from_slice(payload);
    let sum = frame.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    frame.extend_from_slice(&sum.to_le_bytes());
    frame
}
