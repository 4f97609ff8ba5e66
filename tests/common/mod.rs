#![allow(dead_code)]

use std::convert::Infallible;
use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Request, Response};
use tower::{service_fn, Service};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

pub const NOW: i64 = 1_700_000_000;

pub const THROTTLED_BODY: &str = r#"{"error":"Undefined 429 response. Original message: Too many errors.You have been temporarily throttled."}"#;

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SharedGuard(self.0.clone())
    }
}

struct SharedGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Captured log output of the current thread.
pub struct Logs {
    buffer: Arc<Mutex<Vec<u8>>>,
    _guard: tracing::subscriber::DefaultGuard,
}

impl Logs {
    pub fn contents(&self) -> String {
        String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
    }
}

/// Install a thread-local subscriber that writes into memory.
pub fn capture_logs() -> Logs {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    Logs { buffer, _guard: guard }
}

/// Transport double that answers every request with `status`, `headers` and `body`.
pub fn respond(
    status: u16,
    headers: &[(&str, &str)],
    body: &'static str,
) -> impl Service<Request<Bytes>, Response = Response<Bytes>, Error = Infallible, Future = Ready<Result<Response<Bytes>, Infallible>>>
       + Clone
       + Send
       + 'static {
    let headers: Arc<Vec<(String, String)>> =
        Arc::new(headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
    service_fn(move |_req: Request<Bytes>| {
        let mut builder = Response::builder().status(status);
        for (name, value) in headers.iter() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        ready(Ok::<_, Infallible>(builder.body(Bytes::from_static(body.as_bytes())).unwrap()))
    })
}

/// Transport double that always fails with `message`.
pub fn unreachable_host(
    message: &'static str,
) -> impl Service<Request<Bytes>, Response = Response<Bytes>, Error = std::io::Error, Future = Ready<Result<Response<Bytes>, std::io::Error>>>
       + Clone
       + Send
       + 'static {
    service_fn(move |_req: Request<Bytes>| {
        ready(Err::<Response<Bytes>, _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            message,
        )))
    })
}
