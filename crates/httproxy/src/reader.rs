//! Bounded read of a single client request off the wire: header block plus
//! whatever body a numeric `Content-Length` declares, capped at
//! [`MAX_REQUEST`] bytes and a 5s inactivity timeout that resets on every
//! byte received (not a hard deadline from connection start).

use std::time::Duration;

use smol::io::AsyncReadExt;
use smol::net::TcpStream;

pub const MAX_REQUEST: usize = 8192;
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads one request. A connection closed before any bytes arrive is an
/// error; closed mid-request returns whatever was read so the parser can
/// reject it with a proper diagnostic.
pub async fn read_request(stream: &mut TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut data: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    while data.len() < MAX_REQUEST {
        let n = read_with_timeout(stream, &mut chunk, INACTIVITY_TIMEOUT).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);

        if let Some(pos) = find_subslice(&data, b"\r\n\r\n") {
            let header_end = pos + 4;
            if let Some(len) = parse_content_length(&data[..header_end]) {
                let body_start = header_end;
                while data.len() - body_start < len && data.len() < MAX_REQUEST + len {
                    let want = (len - (data.len() - body_start)).min(chunk.len());
                    let n = read_with_timeout(stream, &mut chunk[..want], INACTIVITY_TIMEOUT).await?;
                    if n == 0 {
                        break;
                    }
                    data.extend_from_slice(&chunk[..n]);
                }
            }
            break;
        }
    }

    if data.is_empty() {
        anyhow::bail!("client closed the connection before sending any data");
    }
    Ok(data)
}

async fn read_with_timeout(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Duration,
) -> anyhow::Result<usize> {
    enum Outcome {
        Read(std::io::Result<usize>),
        TimedOut,
    }

    let read_fut = async { Outcome::Read(stream.read(buf).await) };
    let timeout_fut = async {
        smol::Timer::after(timeout).await;
        Outcome::TimedOut
    };

    match smol::future::or(read_fut, timeout_fut).await {
        Outcome::Read(result) => Ok(result?),
        Outcome::TimedOut => anyhow::bail!("inactivity timeout waiting for client data"),
    }
}

/// First `Content-Length` header wins; absent or non-numeric means no body
/// is read.
fn parse_content_length(head: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(head);
    for line in text.split("\r\n").skip(1) {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse::<usize>().ok();
            }
        }
    }
    None
}

pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_first_header_wins() {
        let head = b"GET / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 99\r\n\r\n";
        assert_eq!(parse_content_length(head), Some(5));
    }

    #[test]
    fn non_numeric_content_length_means_no_body() {
        let head = b"GET / HTTP/1.1\r\nContent-Length: nope\r\n\r\n";
        assert_eq!(parse_content_length(head), None);
    }

    #[test]
    fn missing_content_length_means_no_body() {
        let head = b"GET / HTTP/1.1\r\nHost: example.test\r\n\r\n";
        assert_eq!(parse_content_length(head), None);
    }

    #[test]
    fn find_subslice_locates_terminator() {
        let data = b"GET / HTTP/1.1\r\n\r\nbody";
        assert_eq!(find_subslice(data, b"\r\n\r\n"), Some(14));
    }
}
