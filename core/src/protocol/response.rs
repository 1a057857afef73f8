/// A parsed or to-be-sent RTSP reply (§3, §4.4).
///
/// ```text
/// RTSP/1.0 <code> <reason>
/// CSeq: <n>
/// Session: <id>
///
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtspReply {
    pub status: u16,
    pub cseq: u32,
    pub session_id: u32,
}

impl RtspReply {
    pub fn ok(cseq: u32, session_id: u32) -> Self {
        Self {
            status: 200,
            cseq,
            session_id,
        }
    }

    pub fn not_found(cseq: u32) -> Self {
        Self {
            status: 404,
            cseq,
            session_id: 0,
        }
    }

    pub fn server_error(cseq: u32, session_id: u32) -> Self {
        Self {
            status: 500,
            cseq,
            session_id,
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }

    /// Serialize to the wire format.
    pub fn serialize(&self) -> String {
        format!(
            "RTSP/1.0 {} {}\r\nCSeq: {}\r\nSession: {}\r\n\r\n",
            self.status,
            self.reason(),
            self.cseq,
            self.session_id
        )
    }

    /// Parse a reply line-set, tolerant of LF-only terminators and
    /// case-insensitive header names. Used by the client to read replies
    /// off the TCP control socket.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        use crate::error::{Error, ProtocolErrorKind};

        let mut lines = raw.lines();
        let status_line = lines
            .next()
            .ok_or(Error::Protocol(ProtocolErrorKind::EmptyRequest))?;
        let parts: Vec<&str> = status_line.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(Error::Protocol(ProtocolErrorKind::InvalidRequestLine));
        }
        let status: u16 = parts[1]
            .parse()
            .map_err(|_| Error::Protocol(ProtocolErrorKind::InvalidRequestLine))?;

        let mut cseq = 0u32;
        let mut session_id = 0u32;
        for line in lines {
            if line.is_empty() {
                break;
            }
            let colon = line
                .find(':')
                .ok_or(Error::Protocol(ProtocolErrorKind::InvalidHeader))?;
            let name = line[..colon].trim();
            let value = line[colon + 1..].trim();
            if name.eq_ignore_ascii_case("CSeq") {
                cseq = value.parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("Session") {
                session_id = value.parse().unwrap_or(0);
            }
        }

        Ok(RtspReply {
            status,
            cseq,
            session_id,
        })
    }
}
