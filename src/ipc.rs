//! Out-of-process backend over a local socket (Unix socket / named pipe).
//!
//! Wire format: one JSON object per line. The client writes a [`Query`], the
//! server answers with a [`Response`]. Every client query uses its own
//! connection, so one [`IpcExecutor`] can be shared by parallel samplers.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use interprocess::local_socket::{LocalSocketListener, LocalSocketStream};
use serde::{Deserialize, Serialize};

use crate::backend::{Bindings, Query, QueryExecutor};
use crate::config::DfsConfig;
use crate::error::{DfsError, ErrorKind, Result, WireError};

/// Server answer to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ok(Bindings),
    Err(WireError),
}

/// Client side: forwards queries to a backend process listening on `name`.
#[derive(Debug, Clone)]
pub struct IpcExecutor {
    name: String,
}

impl IpcExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_config(config: &DfsConfig) -> Self {
        Self::new(config.ipc_name.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn unavailable(&self, e: std::io::Error) -> DfsError {
        DfsError::BackendUnavailable(format!("{}: {e}", self.name))
    }
}

impl QueryExecutor for IpcExecutor {
    fn execute(&self, query: &Query) -> Result<Bindings> {
        let stream =
            LocalSocketStream::connect(self.name.as_str()).map_err(|e| self.unavailable(e))?;
        let mut conn = BufReader::new(stream);

        let mut request = serde_json::to_string(query)?;
        request.push('\n');
        conn.get_mut()
            .write_all(request.as_bytes())
            .and_then(|_| conn.get_mut().flush())
            .map_err(|e| self.unavailable(e))?;

        let mut answer = String::new();
        let read = conn.read_line(&mut answer).map_err(|e| self.unavailable(e))?;
        if read == 0 {
            return Err(DfsError::BackendUnavailable(format!(
                "{}: connection closed before {} was answered",
                self.name, query.query
            )));
        }

        match serde_json::from_str::<Response>(&answer)? {
            Response::Ok(outputs) => Ok(outputs),
            Response::Err(e) => Err(e.into_error(query.query)),
        }
    }
}

/// Host side: exposes a [`QueryExecutor`] on a local socket.
///
/// On Unix the socket path is unlinked when the server is dropped.
pub struct IpcServer {
    listener: LocalSocketListener,
    name: String,
    executor: Arc<dyn QueryExecutor>,
}

impl std::fmt::Debug for IpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcServer").field("name", &self.name).finish()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.name);
        }
    }
}

impl IpcServer {
    /// Binds `name`, replacing a socket left behind by an earlier run.
    pub fn bind(name: &str, executor: Arc<dyn QueryExecutor>) -> Result<Self> {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(name);
        }

        let listener = LocalSocketListener::bind(name).map_err(|e| {
            DfsError::BackendUnavailable(format!("failed to bind IPC server ({name}): {e}"))
        })?;
        tracing::info!(name, "IPC backend listening");

        Ok(Self {
            listener,
            name: name.to_string(),
            executor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepts one connection and serves it until the client hangs up.
    pub fn accept_one(&self) -> Result<()> {
        let stream = self.listener.accept().map_err(|e| {
            DfsError::BackendUnavailable(format!("{}: accept failed: {e}", self.name))
        })?;
        serve_connection(stream, self.executor.as_ref())
    }

    /// Serves connections forever, each on its own scoped thread.
    pub fn run(&self) -> Result<()> {
        let executor = self.executor.as_ref();
        std::thread::scope(|scope| {
            for conn in self.listener.incoming() {
                match conn {
                    Ok(stream) => {
                        scope.spawn(move || {
                            if let Err(e) = serve_connection(stream, executor) {
                                tracing::warn!(error = %e, "IPC connection failed");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "IPC accept failed"),
                }
            }
        });
        Ok(())
    }
}

#[tracing::instrument(skip_all)]
fn serve_connection(stream: LocalSocketStream, executor: &dyn QueryExecutor) -> Result<()> {
    let mut conn = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        let read = conn
            .read_line(&mut line)
            .map_err(|e| DfsError::BackendUnavailable(format!("read failed: {e}")))?;
        if read == 0 {
            return Ok(());
        }

        let response = match serde_json::from_str::<Query>(&line) {
            Ok(query) => {
                tracing::debug!(query = %query.query, "serving query");
                match executor.execute(&query) {
                    Ok(outputs) => Response::Ok(outputs),
                    Err(e) => Response::Err(WireError::from_error(&e)),
                }
            }
            Err(e) => Response::Err(WireError {
                kind: ErrorKind::InvalidArgument,
                message: format!("undecodable request: {e}"),
            }),
        };

        let mut answer = serde_json::to_string(&response)?;
        answer.push('\n');
        conn.get_mut()
            .write_all(answer.as_bytes())
            .and_then(|_| conn.get_mut().flush())
            .map_err(|e| DfsError::BackendUnavailable(format!("write failed: {e}")))?;
    }
}
