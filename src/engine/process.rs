//! Engine adapter backed by a child process.
//!
//! The bridge process speaks newline-delimited JSON on stdin/stdout. After
//! launch it prints a single handshake line, `{"ready": true}`. Each request
//! is one object tagged by `op` plus a numeric `id`; each reply is
//! `{"id": n, "ok": true, "result": ...}` or `{"id": n, "ok": false, "error": "..."}`.
//! Requests are strictly sequential.
//!
//! Arrays travel as `{"dims": [...], "data": [...]}` with `data` in
//! column-major order. JSON has no NaN or infinity, so a missing sample (NaN)
//! is sent as `null` and infinities as `"Inf"` / `"-Inf"`; the bridge maps
//! them to the engine's own values and back.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Engine, EngineError, EngineValue, NumericArray};
use crate::config::EngineConfig;

/// Save flag for large (HDF5-backed) containers.
const LARGE_FILE_FORMAT: &str = "-v7.3";

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Decode {
        path: &'a Path,
    },
    Persist {
        path: &'a Path,
        format: &'static str,
        variables: &'a BTreeMap<String, NumericArray>,
    },
    RenderTimeSeries {
        values: &'a NumericArray,
        sample_rate: f64,
        title: &'a str,
    },
    RenderSpectrum {
        values: &'a NumericArray,
        sample_rate: f64,
        title: &'a str,
    },
    CloseAll,
    AddPath {
        path: &'a Path,
    },
    Quit,
}

impl Request<'_> {
    fn op(&self) -> &'static str {
        match self {
            Request::Decode { .. } => "decode",
            Request::Persist { .. } => "persist",
            Request::RenderTimeSeries { .. } => "render_time_series",
            Request::RenderSpectrum { .. } => "render_spectrum",
            Request::CloseAll => "close_all",
            Request::AddPath { .. } => "add_path",
            Request::Quit => "quit",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a Request<'a>,
}

#[derive(Deserialize)]
struct Handshake {
    ready: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    result: JsonValue,
    #[serde(default)]
    error: Option<String>,
}

struct Connection {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl Connection {
    fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(EngineError::Disconnected);
        }
        Ok(line)
    }

    fn roundtrip(&mut self, request: &Request<'_>) -> Result<JsonValue, EngineError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut payload = serde_json::to_vec(&Envelope { id, request })?;
        payload.push(b'\n');
        self.stdin.write_all(&payload)?;
        self.stdin.flush()?;

        let line = self.read_line()?;
        let response: Response = serde_json::from_str(&line)?;
        if let Some(reply_id) = response.id {
            if reply_id != id {
                warn!("engine answered request {reply_id}, expected {id}");
            }
        }
        if response.ok {
            Ok(response.result)
        } else {
            Err(EngineError::Rejected {
                op: request.op(),
                message: response.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

/// A running engine bridge process.
pub struct ProcessEngine {
    command: String,
    connection: Mutex<Option<Connection>>,
}

impl ProcessEngine {
    /// Launch the bridge and block until its handshake arrives.
    ///
    /// This is slow (the engine boots a full runtime); run it through
    /// [`EngineStartup`](super::EngineStartup) rather than on an interactive thread.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        info!("starting engine: {} {:?}", config.command, config.args);
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::Launch {
                command: config.command.clone(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                return Err(EngineError::Disconnected);
            }
        };
        let mut connection = Connection {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        };

        let hello: Handshake = serde_json::from_str(&connection.read_line()?)?;
        if !hello.ready {
            let _ = connection.child.kill();
            return Err(EngineError::Rejected {
                op: "start",
                message: hello.error.unwrap_or_else(|| "engine refused to start".to_string()),
            });
        }

        if let Some(dir) = &config.functions_path {
            connection.roundtrip(&Request::AddPath { path: dir })?;
            debug!("engine search path extended with {}", dir.display());
        }

        info!("engine ready");
        Ok(Self {
            command: config.command.clone(),
            connection: Mutex::new(Some(connection)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn call(&self, request: &Request<'_>) -> Result<JsonValue, EngineError> {
        let mut guard = self.lock();
        let connection = guard.as_mut().ok_or(EngineError::NotRunning)?;
        debug!("engine request: {}", request.op());
        match connection.roundtrip(request) {
            Err(e @ (EngineError::Disconnected | EngineError::Io(_))) => {
                warn!("lost connection to engine '{}': {e}", self.command);
                *guard = None;
                Err(e)
            }
            other => other,
        }
    }

    /// Ask the bridge to exit and reap it. Safe to call more than once.
    pub fn stop(&self) -> Result<(), EngineError> {
        let Some(mut connection) = self.lock().take() else {
            return Ok(());
        };
        if let Err(e) = connection.roundtrip(&Request::Quit) {
            debug!("engine quit request failed: {e}");
        }
        drop(connection.stdin);
        let status = connection.child.wait()?;
        info!("engine exited with {status}");
        Ok(())
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("failed to stop engine: {e}");
        }
    }
}

impl Engine for ProcessEngine {
    fn is_ready(&self) -> bool {
        match self.lock().as_mut() {
            Some(connection) => matches!(connection.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn decode_numeric_container(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, EngineValue>, EngineError> {
        let result = self.call(&Request::Decode { path })?;
        Ok(serde_json::from_value(result)?)
    }

    fn encode_and_persist(
        &self,
        path: &Path,
        variables: &BTreeMap<String, NumericArray>,
    ) -> Result<(), EngineError> {
        self.call(&Request::Persist {
            path,
            format: LARGE_FILE_FORMAT,
            variables,
        })
        .map(drop)
    }

    fn render_time_series(
        &self,
        values: &NumericArray,
        sample_rate: f64,
        title: &str,
    ) -> Result<(), EngineError> {
        self.call(&Request::RenderTimeSeries {
            values,
            sample_rate,
            title,
        })
        .map(drop)
    }

    fn render_spectrum(
        &self,
        values: &NumericArray,
        sample_rate: f64,
        title: &str,
    ) -> Result<(), EngineError> {
        self.call(&Request::RenderSpectrum {
            values,
            sample_rate,
            title,
        })
        .map(drop)
    }

    fn close_all_rendered_views(&self) -> Result<(), EngineError> {
        self.call(&Request::CloseAll).map(drop)
    }
}
