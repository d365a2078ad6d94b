use {
    super::*,
    byteorder::{ByteOrder, LittleEndian},
    bytes::{Buf, BufMut, BytesMut},
    tokio_util::codec::{Decoder, Encoder},
};

const MAGIC: u8 = 0x7F;
const HEADER_LEN: usize = 4;

/// Command bytes of the binary ex-message framing used between this agent and upstream
/// pools that understand the btcagent protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Command {
    RegisterWorker = 0x01,
    SubmitShare = 0x02,
    SubmitShareWithTime = 0x03,
    UnregisterWorker = 0x04,
    MiningSetDiff = 0x05,
    SubmitShareWithVersion = 0x12,
    SubmitShareWithTimeVersion = 0x13,
    GetNoncePrefix = 0x21,
    SetNoncePrefix = 0x22,
}

impl Command {
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::RegisterWorker,
            0x02 => Self::SubmitShare,
            0x03 => Self::SubmitShareWithTime,
            0x04 => Self::UnregisterWorker,
            0x05 => Self::MiningSetDiff,
            0x12 => Self::SubmitShareWithVersion,
            0x13 => Self::SubmitShareWithTimeVersion,
            0x21 => Self::GetNoncePrefix,
            0x22 => Self::SetNoncePrefix,
            _ => return None,
        })
    }
}

/// A decoded binary ex-message: command plus raw payload (header stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExMessage {
    pub(crate) command: Command,
    pub(crate) payload: Vec<u8>,
}

impl ExMessage {
    pub(crate) fn register_worker(session_id: u16, user_agent: &str, worker_name: &str) -> Self {
        let mut payload = Vec::with_capacity(3 + user_agent.len() + 1 + worker_name.len() + 1);
        payload.put_u16_le(session_id);
        payload.put_u8(user_agent.len() as u8);
        payload.extend_from_slice(user_agent.as_bytes());
        payload.extend_from_slice(worker_name.as_bytes());
        payload.push(0);

        Self {
            command: Command::RegisterWorker,
            payload,
        }
    }

    pub(crate) fn unregister_worker(session_id: u16) -> Self {
        let mut payload = Vec::with_capacity(2);
        payload.put_u16_le(session_id);

        Self {
            command: Command::UnregisterWorker,
            payload,
        }
    }

    pub(crate) fn submit_share(
        session_id: u16,
        extra_nonce2: u32,
        nonce: u32,
        job_id: u8,
        ntime: Option<u32>,
        version_mask: Option<u32>,
    ) -> Self {
        let command = match (ntime.is_some(), version_mask.is_some()) {
            (false, false) => Command::SubmitShare,
            (true, false) => Command::SubmitShareWithTime,
            (false, true) => Command::SubmitShareWithVersion,
            (true, true) => Command::SubmitShareWithTimeVersion,
        };

        let mut payload = Vec::with_capacity(19);
        payload.put_u16_le(session_id);
        payload.put_u32_le(extra_nonce2);
        payload.put_u32_le(nonce);
        payload.put_u8(job_id);
        if let Some(ntime) = ntime {
            payload.put_u32_le(ntime);
        }
        if let Some(mask) = version_mask {
            payload.put_u32_le(mask);
        }

        Self { command, payload }
    }

    pub(crate) fn mining_set_diff(session_ids: &[u16], diff_exponent: u8) -> Self {
        let mut payload = Vec::with_capacity(1 + 2 * session_ids.len());
        payload.push(diff_exponent);
        for id in session_ids {
            payload.put_u16_le(*id);
        }

        Self {
            command: Command::MiningSetDiff,
            payload,
        }
    }

    pub(crate) fn set_nonce_prefix(session_id: u16, prefix: u32) -> Self {
        debug_assert!(prefix <= 0x00FF_FFFF, "nonce prefix must fit in 24 bits");

        let mut payload = Vec::with_capacity(5);
        payload.put_u16_le(session_id);
        payload.push((prefix & 0xFF) as u8);
        payload.push(((prefix >> 8) & 0xFF) as u8);
        payload.push(((prefix >> 16) & 0xFF) as u8);

        Self {
            command: Command::SetNoncePrefix,
            payload,
        }
    }

    /// Serializes this message with the `0x7F | cmd | len(LE) | payload` header.
    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        let len = (HEADER_LEN + self.payload.len()) as u16;
        dst.put_u8(MAGIC);
        dst.put_u8(self.command as u8);
        dst.put_u16_le(len);
        dst.extend_from_slice(&self.payload);
    }
}

/// A frame read off an upstream or downstream connection: either a JSON-RPC line or a
/// binary ex-message. Only upstream connections that negotiate the btcagent extension
/// ever produce the `Ex` variant.
#[derive(Debug, Clone)]
pub(crate) enum Frame {
    Line(String),
    Ex(ExMessage),
}

/// Decodes both line-delimited JSON-RPC and binary ex-messages from the same byte stream.
///
/// If the next byte in the buffer is `0x7F`, the frame is treated as a binary ex-message
/// candidate; otherwise decoding falls back to newline-delimited text.
#[derive(Debug, Default)]
pub(crate) struct WireCodec {
    max_line_length: usize,
}

impl WireCodec {
    pub(crate) fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

#[derive(Debug, Snafu)]
pub(crate) enum WireCodecError {
    #[snafu(display("malformed ex-message: length field {len} is shorter than the header"))]
    ShortLength { len: u16 },

    #[snafu(display("line exceeds maximum length of {max} bytes"))]
    LineTooLong { max: usize },

    #[snafu(display("{source}"))]
    Io { source: std::io::Error },

    #[snafu(display("invalid utf-8 in line frame: {source}"))]
    Utf8 { source: std::str::Utf8Error },
}

impl From<std::io::Error> for WireCodecError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

impl Decoder for WireCodec {
    type Item = Frame;
    type Error = WireCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Frame>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] == MAGIC {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            let len = LittleEndian::read_u16(&src[2..4]);
            if (len as usize) < HEADER_LEN {
                return Err(WireCodecError::ShortLength { len });
            }

            let len = len as usize;
            if src.len() < len {
                return Ok(None);
            }

            let frame = src.split_to(len);
            let command_byte = frame[1];
            let payload = frame[HEADER_LEN..].to_vec();

            return match Command::from_byte(command_byte) {
                Some(command) => Ok(Some(Frame::Ex(ExMessage { command, payload }))),
                None => {
                    warn!("ignoring ex-message with unknown command byte 0x{command_byte:02x}");
                    Ok(None)
                }
            };
        }

        let Some(newline) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > self.max_line_length {
                return Err(WireCodecError::LineTooLong {
                    max: self.max_line_length,
                });
            }
            return Ok(None);
        };

        let line = src.split_to(newline + 1);
        let line = &line[..line.len() - 1];
        let line = if line.last() == Some(&b'\r') {
            &line[..line.len() - 1]
        } else {
            line
        };

        let line = std::str::from_utf8(line)
            .context(Utf8Snafu)?
            .to_string();

        Ok(Some(Frame::Line(line)))
    }
}

impl Encoder<Frame> for WireCodec {
    type Error = WireCodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        match item {
            Frame::Line(line) => {
                dst.reserve(line.len() + 1);
                dst.extend_from_slice(line.as_bytes());
                dst.put_u8(b'\n');
            }
            Frame::Ex(message) => message.encode(dst),
        }

        Ok(())
    }
}
