use crate::error::{Error, ProtocolErrorKind};

/// One of the five RTSP methods this system understands (§2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
    Seek,
}

impl Method {
    fn parse(raw: &str) -> Result<Self, Error> {
        match raw {
            "SETUP" => Ok(Method::Setup),
            "PLAY" => Ok(Method::Play),
            "PAUSE" => Ok(Method::Pause),
            "TEARDOWN" => Ok(Method::Teardown),
            "SEEK" => Ok(Method::Seek),
            _ => Err(Error::Protocol(ProtocolErrorKind::UnknownMethod)),
        }
    }

    /// The wire form of this method, as written on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
            Method::Seek => "SEEK",
        }
    }
}

/// A parsed RTSP request (§3, §4.4).
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: Method,
    /// The URL's final path segment, e.g. `movie.mjpeg` from
    /// `rtsp://host/stream/movie.mjpeg`.
    pub filename: String,
    pub cseq: u32,
    /// 0 means "unassigned" — only SETUP may legally send this.
    pub session_id: u32,
    /// `client_port` from the Transport header (SETUP only).
    pub client_port: Option<u16>,
    /// Target frame number from the `X-Frame` header (SEEK only).
    pub seek_frame: Option<i64>,
}

impl RtspRequest {
    /// Parse a complete request: request line, headers, trailing blank line.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines
            .next()
            .ok_or(Error::Protocol(ProtocolErrorKind::EmptyRequest))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::Protocol(ProtocolErrorKind::InvalidRequestLine));
        }

        let method = Method::parse(parts[0])?;
        let filename = last_path_segment(parts[1]);

        let mut cseq = None;
        let mut session_id = 0u32;
        let mut client_port = None;
        let mut seek_frame = None;

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
                cseq = value.parse::<u32>().ok();
            } else if name.eq_ignore_ascii_case("Session") {
                session_id = value.parse::<u32>().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("Transport") {
                client_port = parse_client_port(value);
            } else if name.eq_ignore_ascii_case("X-Frame") {
                seek_frame = value.parse::<i64>().ok();
            }
        }

        let cseq = cseq.ok_or(Error::Protocol(ProtocolErrorKind::InvalidHeader))?;

        Ok(RtspRequest {
            method,
            filename,
            cseq,
            session_id,
            client_port,
            seek_frame,
        })
    }
}

fn last_path_segment(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Extracts `<p>` from `RTP/UDP;client_port=<p>`.
fn parse_client_port(transport: &str) -> Option<u16> {
    transport
        .split(';')
        .find_map(|part| part.trim().strip_prefix("client_port="))
        .and_then(|p| p.parse::<u16>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_setup_with_transport() {
        let raw = "SETUP movie.mjpeg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP;client_port=5004\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Setup);
        assert_eq!(req.filename, "movie.mjpeg");
        assert_eq!(req.cseq, 1);
        assert_eq!(req.session_id, 0);
        assert_eq!(req.client_port, Some(5004));
    }

    #[test]
    fn parses_play_with_session() {
        let raw = "PLAY movie.mjpeg RTSP/1.0\r\nCSeq: 2\r\nSession: 123456\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Play);
        assert_eq!(req.session_id, 123456);
    }

    #[test]
    fn parses_seek_with_x_frame() {
        let raw = "SEEK movie.mjpeg RTSP/1.0\r\nCSeq: 4\r\nSession: 1\r\nX-Frame: 42\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Seek);
        assert_eq!(req.seek_frame, Some(42));
    }

    #[test]
    fn url_is_reduced_to_final_segment() {
        let raw = "SETUP rtsp://host:8554/stream/movie.mjpeg RTSP/1.0\r\nCSeq: 1\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.filename, "movie.mjpeg");
    }

    #[test]
    fn tolerates_lf_only_line_endings() {
        let raw = "SETUP movie.mjpeg RTSP/1.0\nCSeq: 1\nTransport: RTP/UDP;client_port=5004\n\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.client_port, Some(5004));
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let raw = "PLAY movie.mjpeg RTSP/1.0\r\ncseq: 7\r\nSESSION: 99\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.cseq, 7);
        assert_eq!(req.session_id, 99);
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(
            RtspRequest::parse(""),
            Err(Error::Protocol(ProtocolErrorKind::EmptyRequest))
        ));
    }

    #[test]
    fn malformed_request_line_is_rejected() {
        assert!(matches!(
            RtspRequest::parse("JUST_A_METHOD\r\n\r\n"),
            Err(Error::Protocol(ProtocolErrorKind::InvalidRequestLine))
        ));
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(matches!(
            RtspRequest::parse("FOO movie.mjpeg RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
            Err(Error::Protocol(ProtocolErrorKind::UnknownMethod))
        ));
    }

    #[test]
    fn missing_cseq_is_rejected() {
        assert!(matches!(
            RtspRequest::parse("PLAY movie.mjpeg RTSP/1.0\r\nSession: 1\r\n\r\n"),
            Err(Error::Protocol(ProtocolErrorKind::InvalidHeader))
        ));
    }
}
