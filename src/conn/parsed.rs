use crate::bytestr::ByteStr;

/// A single parsed header. The host's parser delivers these; the engine
/// never splits raw header bytes itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub name: ByteStr,
    pub value: ByteStr,
}

impl Header {
    pub fn new(name: impl Into<ByteStr>, value: impl Into<ByteStr>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Bytes this header contributes to the running header-length totals.
    pub fn wire_len(&self) -> u64 {
        (self.name.len() + self.value.len()) as u64
    }
}

/// A parsed request line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLine {
    pub raw: ByteStr,
    pub method: ByteStr,
    pub uri: ByteStr,
    pub protocol: ByteStr,
}

impl RequestLine {
    pub fn new(
        method: impl Into<ByteStr>,
        uri: impl Into<ByteStr>,
        protocol: impl Into<ByteStr>,
    ) -> Self {
        let method = method.into();
        let uri = uri.into();
        let protocol = protocol.into();
        let mut raw = Vec::with_capacity(method.len() + uri.len() + protocol.len() + 2);
        raw.extend_from_slice(&method);
        raw.push(b' ');
        raw.extend_from_slice(&uri);
        if !protocol.is_empty() {
            raw.push(b' ');
            raw.extend_from_slice(&protocol);
        }
        Self {
            raw: ByteStr::from(raw),
            method,
            uri,
            protocol,
        }
    }

    /// Split a raw request line on whitespace. A missing protocol token
    /// yields an empty protocol, which marks the transaction HTTP/0.9.
    pub fn from_raw(raw: &str) -> Self {
        let mut parts = raw.split_ascii_whitespace();
        let method = parts.next().unwrap_or("");
        let uri = parts.next().unwrap_or("");
        let protocol = parts.next().unwrap_or("");
        Self {
            raw: ByteStr::from(raw),
            method: ByteStr::from(method),
            uri: ByteStr::from(uri),
            protocol: ByteStr::from(protocol),
        }
    }

    /// An empty protocol token means a protocol-less simple request.
    pub fn is_http09(&self) -> bool {
        self.protocol.is_empty()
    }

    /// The path component of the URI: everything before the query string.
    pub fn path_component(&self) -> ByteStr {
        let uri = self.uri.as_bytes();
        match uri.iter().position(|&b| b == b'?') {
            Some(at) => ByteStr::copy_from(&uri[..at]),
            None => self.uri.clone(),
        }
    }
}

/// A parsed response status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseLine {
    pub raw: ByteStr,
    pub protocol: ByteStr,
    pub status: ByteStr,
    pub message: ByteStr,
}

impl ResponseLine {
    pub fn new(
        protocol: impl Into<ByteStr>,
        status: impl Into<ByteStr>,
        message: impl Into<ByteStr>,
    ) -> Self {
        let protocol = protocol.into();
        let status = status.into();
        let message = message.into();
        let mut raw = Vec::with_capacity(protocol.len() + status.len() + message.len() + 2);
        raw.extend_from_slice(&protocol);
        raw.push(b' ');
        raw.extend_from_slice(&status);
        if !message.is_empty() {
            raw.push(b' ');
            raw.extend_from_slice(&message);
        }
        Self {
            raw: ByteStr::from(raw),
            protocol,
            status,
            message,
        }
    }

    /// Split a raw status line on whitespace; the message keeps its own
    /// internal spacing.
    pub fn from_raw(raw: &str) -> Self {
        let mut parts = raw.splitn(3, char::is_whitespace);
        let protocol = parts.next().unwrap_or("");
        let status = parts.next().unwrap_or("");
        let message = parts.next().unwrap_or("");
        Self {
            raw: ByteStr::from(raw),
            protocol: ByteStr::from(protocol),
            status: ByteStr::from(status),
            message: ByteStr::from(message),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        std::str::from_utf8(&self.status).ok()?.parse().ok()
    }
}
