//! shaare-store RPC server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"url":"...","title":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Logs go to stderr; `$SHAARE_STORE_CONFIG` selects the config file.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;

use shaare_store::app::App;
use shaare_store::rpc_handler::handle_method;

use serde_json::{json, Value};
use tracing::{error, warn};

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn respond(out: &mut impl Write, response: &Value) -> io::Result<()> {
    writeln!(out, "{}", response)?;
    out.flush()
}

fn main() -> ExitCode {
    shaare_store::logging::init(std::env::var_os("SHAARE_STORE_VERBOSE").is_some());

    let app = match App::new(None) {
        Ok(app) => Mutex::new(app),
        Err(e) => {
            error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let ready = json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")});
    if respond(&mut out, &ready).is_err() {
        return ExitCode::FAILURE;
    }

    let mut rate_limiter = RateLimiter::new(200);

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Err(e) => json!({"id": null, "error": format!("parse error: {}", e)}),
            Ok(req) => {
                let id = req.get("id").cloned().unwrap_or(Value::Null);
                if !rate_limiter.check() {
                    warn!("Rate limit exceeded");
                    json!({"id": id, "error": "rate limit exceeded"})
                } else {
                    let method = req.get("method").and_then(Value::as_str).unwrap_or("");
                    let params = req.get("params").cloned().unwrap_or(json!({}));
                    match handle_method(&app, method, &params) {
                        Ok(val) => json!({"id": id, "result": val}),
                        Err(err) => {
                            warn!(method, error = %err, "RPC call failed");
                            json!({"id": id, "error": err})
                        }
                    }
                }
            }
        };
        if respond(&mut out, &response).is_err() {
            break;
        }
    }
    ExitCode::SUCCESS
}
