//! In-memory transport for unit tests: canned replies keyed by full URL.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use super::{HttpError, Request, Response, Transport};

#[derive(Debug, Clone)]
pub(crate) enum FakeBody {
    Ok(Vec<u8>),
    Status(u32),
    /// Writes the prefix then fails like a dropped connection.
    Truncated { sent: Vec<u8>, expected: u64 },
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    pages: Mutex<HashMap<String, (u32, Vec<(String, String)>, Vec<u8>)>>,
    files: Mutex<HashMap<String, FakeBody>>,
    gets: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn json(&self, url: &str, body: serde_json::Value) -> &Self {
        self.reply(url, 200, Vec::new(), body.to_string().into_bytes())
    }

    pub(crate) fn reply(
        &self,
        url: &str,
        status: u32,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> &Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, headers, body));
        self
    }

    pub(crate) fn file(&self, url: &str, body: FakeBody) -> &Self {
        self.files.lock().unwrap().insert(url.to_string(), body);
        self
    }

    pub(crate) fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub(crate) fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn get(&self, request: &Request) -> Result<Response, HttpError> {
        let url = request.full_url()?.to_string();
        self.gets.lock().unwrap().push(url.clone());
        let (status, headers, body) = self
            .pages
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or((404, Vec::new(), Vec::new()));
        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }

    fn download(&self, request: &Request, sink: &mut dyn Write) -> Result<u64, HttpError> {
        let url = request.full_url()?.to_string();
        self.downloads.lock().unwrap().push(url.clone());
        let body = self
            .files
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or(FakeBody::Status(404));
        match body {
            FakeBody::Ok(bytes) => {
                sink.write_all(&bytes)?;
                Ok(bytes.len() as u64)
            }
            FakeBody::Status(status) => Err(HttpError::Status { url, status }),
            FakeBody::Truncated { sent, expected } => {
                sink.write_all(&sent)?;
                Err(HttpError::PartialTransfer {
                    url,
                    expected,
                    received: sent.len() as u64,
                })
            }
        }
    }
}
