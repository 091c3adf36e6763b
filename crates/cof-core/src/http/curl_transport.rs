//! libcurl-backed [`Transport`].

use curl::easy::{Easy, List};
use std::io::Write;
use std::str;
use std::time::Duration;

use super::{HttpError, Request, Response, Transport};

#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

impl CurlTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn easy_for(&self, request: &Request) -> Result<(Easy, String), HttpError> {
        let url = request.full_url()?.to_string();
        let mut easy = Easy::new();
        easy.url(&url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(request.timeout)?;

        let mut list = List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        if !request.headers.is_empty() {
            easy.http_headers(list)?;
        }
        Ok((easy, url))
    }
}

/// Parses one raw header line into (name, value). Status lines and blanks yield None.
fn parse_header_line(data: &[u8]) -> Option<(String, String)> {
    let line = str::from_utf8(data).ok()?.trim();
    let (name, value) = line.split_once(':')?;
    if name.contains(' ') {
        return None;
    }
    Some((name.trim().to_string(), value.trim().to_string()))
}

fn content_length(headers: &[(String, String)]) -> Option<u64> {
    headers
        .iter()
        .rev()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
}

impl Transport for CurlTransport {
    fn get(&self, request: &Request) -> Result<Response, HttpError> {
        let (mut easy, url) = self.easy_for(request)?;
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                // A redirect starts a new header block.
                if data.starts_with(b"HTTP/") {
                    headers.clear();
                } else if let Some(h) = parse_header_line(data) {
                    headers.push(h);
                }
                true
            })?;
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }

    fn download(&self, request: &Request, sink: &mut dyn Write) -> Result<u64, HttpError> {
        let (mut easy, url) = self.easy_for(request)?;
        easy.fail_on_error(true)?;
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;

        let mut headers: Vec<(String, String)> = Vec::new();
        let mut written: u64 = 0;
        let mut write_error: Option<std::io::Error> = None;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if data.starts_with(b"HTTP/") {
                    headers.clear();
                } else if let Some(h) = parse_header_line(data) {
                    headers.push(h);
                }
                true
            })?;
            transfer.write_function(|data| match sink.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    tracing::warn!("download write failed: {}", e);
                    write_error = Some(e);
                    Ok(0) // abort transfer
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = write_error {
            return Err(HttpError::Io(e));
        }
        if let Err(e) = performed {
            if e.is_http_returned_error() {
                let status = easy.response_code().unwrap_or(0);
                return Err(HttpError::Status { url, status });
            }
            return Err(HttpError::Curl(e));
        }

        let status = easy.response_code()?;
        if !(200..300).contains(&status) {
            return Err(HttpError::Status { url, status });
        }
        if let Some(expected) = content_length(&headers) {
            if written != expected {
                return Err(HttpError::PartialTransfer {
                    url,
                    expected,
                    received: written,
                });
            }
        }
        Ok(written)
    }
}
