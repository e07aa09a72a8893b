//! Request-line and header parsing: resolves the target host/port from
//! either an absolute-URI request-target or the `Host:` header, with
//! bracket-aware handling of IPv6 literals.
//!
//! The request-line and header grammar itself is delegated to `httparse`
//! (the same crate this pack reaches for wherever raw HTTP/1.x needs
//! parsing); this module adds the proxy-specific host/port resolution on
//! top of what it hands back.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub request_line: String,
    pub raw: Vec<u8>,
}

/// Parses a full request buffer (headers plus any body already read by
/// [`crate::reader`]) into a [`Request`]. Duplicate headers: last one wins,
/// since they're folded into a `HashMap` in parse order.
pub fn parse_request(raw: &[u8]) -> anyhow::Result<Request> {
    let mut header_slots = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Request::new(&mut header_slots);
    match parsed.parse(raw) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => anyhow::bail!("incomplete request headers"),
        Err(err) => anyhow::bail!("malformed request: {err}"),
    }

    let method = parsed.method.ok_or_else(|| anyhow::anyhow!("missing method"))?;
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_uppercase()) {
        anyhow::bail!("malformed method: {method}");
    }
    let target = parsed
        .path
        .ok_or_else(|| anyhow::anyhow!("missing request-target"))?;
    let version = parsed
        .version
        .ok_or_else(|| anyhow::anyhow!("missing HTTP version"))?;
    let request_line = format!("{method} {target} HTTP/1.{version}");

    let mut headers = HashMap::new();
    for header in parsed.headers.iter() {
        let value = String::from_utf8_lossy(header.value).trim().to_string();
        headers.insert(header.name.trim().to_ascii_lowercase(), value);
    }

    let (host, port, path) = resolve_target(target, &headers)?;
    if host.is_empty() {
        anyhow::bail!("could not resolve a target host");
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        host,
        port,
        path,
        headers,
        request_line,
        raw: raw.to_vec(),
    })
}

fn resolve_target(
    target: &str,
    headers: &HashMap<String, String>,
) -> anyhow::Result<(String, u16, String)> {
    let scheme_https = target.starts_with("https://");
    if let Some(rest) = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
    {
        let (authority, path_and_query) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let default_port = if scheme_https { 443 } else { 80 };
        let (host, port) = split_authority(authority, default_port, true)?;
        let path = if path_and_query.is_empty() {
            "/".to_string()
        } else {
            path_and_query.to_string()
        };
        return Ok((host, port, path));
    }

    let host_header = headers.get("host").cloned().unwrap_or_default();
    let (host, port) = split_authority(&host_header, 80, false)?;
    Ok((host, port, target.to_string()))
}

/// Splits `host[:port]`, bracket-aware for IPv6 literals (`[::1]:8080`).
/// In `strict` mode (absolute-URI parsing) an explicit port that fails to
/// parse as a `u16`, or parses to 0, is a hard failure; otherwise a bad
/// port silently falls back to `default_port`, mirroring how a browser
/// treats a malformed `Host:` header.
fn split_authority(authority: &str, default_port: u16, strict: bool) -> anyhow::Result<(String, u16)> {
    let authority = authority.trim();
    if authority.is_empty() {
        return Ok((String::new(), default_port));
    }

    if let Some(rest) = authority.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| anyhow::anyhow!("unterminated IPv6 literal in '{authority}'"))?;
        let host = rest[..close].to_ascii_lowercase();
        let after = &rest[close + 1..];
        let port_str = after.strip_prefix(':');
        let port = resolve_port(port_str, default_port, strict)?;
        return Ok((host, port));
    }

    match authority.rfind(':') {
        Some(idx) => {
            let host = authority[..idx].to_ascii_lowercase();
            let port_str = &authority[idx + 1..];
            let port = resolve_port(Some(port_str), default_port, strict)?;
            Ok((host, port))
        }
        None => Ok((authority.to_ascii_lowercase(), default_port)),
    }
}

fn resolve_port(port_str: Option<&str>, default_port: u16, strict: bool) -> anyhow::Result<u16> {
    match port_str {
        None => Ok(default_port),
        Some(p) => {
            if strict {
                let parsed: u16 = p
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid port '{p}'"))?;
                if parsed == 0 {
                    anyhow::bail!("port 0 is not a valid target port");
                }
                Ok(parsed)
            } else {
                Ok(p.parse::<u16>().unwrap_or(default_port))
            }
        }
    }
}
