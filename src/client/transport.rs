use serde_json::{json, Value};
use std::io::{BufRead, Write};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("sidecar closed the connection")]
    Closed,
    #[error("response id {got:?} does not match request {expected}")]
    IdMismatch { expected: String, got: Option<String> },
    #[error("{code}: {message}")]
    Remote { code: String, message: String },
}

/// One request/response exchange with the server. Calls block until the
/// response arrives, so a caller never has two calls in flight.
pub trait RemoteCall {
    fn call(&mut self, method: &str, params: Value) -> Result<Value, TransportError>;
}

/// Line-protocol client: one JSON request per line out, one JSON response
/// per line back.
pub struct SidecarClient<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
}

impl<R: BufRead, W: Write> SidecarClient<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> RemoteCall for SidecarClient<R, W> {
    fn call(&mut self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = format!("c{}", self.next_id);
        self.next_id += 1;

        let payload = json!({ "id": id, "method": method, "params": params });
        writeln!(self.writer, "{}", payload)?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(TransportError::Closed);
        }
        let resp: Value = serde_json::from_str(line.trim())?;

        let got = resp.get("id").and_then(|v| v.as_str());
        if got != Some(id.as_str()) {
            return Err(TransportError::IdMismatch {
                expected: id,
                got: got.map(str::to_string),
            });
        }
        if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = resp.get("error");
            let field = |k: &str| {
                error
                    .and_then(|e| e.get(k))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string()
            };
            return Err(TransportError::Remote {
                code: field("code"),
                message: field("message"),
            });
        }
        Ok(resp.get("result").cloned().unwrap_or_else(|| json!({})))
    }
}
