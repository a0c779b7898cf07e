//! Simulated system interface and the process bridge
//!
//! The tick scheduler owns the simulated system exclusively. `BridgeSystem`
//! drives an external emulator process over a JSON-lines protocol: one request
//! object per line on the child's stdin, one reply object per line on its
//! stdout. Frames and snapshots travel base64-encoded.
//!
//! ```text
//! > {"op":"step","ticks":1}
//! < {"ok":true}
//! > {"op":"capture_frame"}
//! < {"ok":true,"media_type":"image/png","data":"iVBORw0..."}
//! > {"op":"send_input","action":"UP","phase":"press"}
//! < {"ok":false,"error":"emulator halted"}
//! ```

use autoplay_core::{ActionToken, Error, Frame, InputPhase, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// The device being driven. Only the tick loop calls these.
pub trait SimulatedSystem: Send {
    /// Advance the system by `ticks` steps.
    fn step(&mut self, ticks: u32) -> Result<()>;
    fn capture_frame(&mut self) -> Result<Frame>;
    fn send_input(&mut self, action: ActionToken, phase: InputPhase) -> Result<()>;
    fn load_snapshot(&mut self, bytes: &[u8]) -> Result<()>;
    fn save_snapshot(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Step { ticks: u32 },
    CaptureFrame,
    SendInput { action: ActionToken, phase: InputPhase },
    LoadSnapshot { data: &'a str },
    SaveSnapshot,
}

impl BridgeRequest<'_> {
    fn name(&self) -> &'static str {
        match self {
            BridgeRequest::Step { .. } => "step",
            BridgeRequest::CaptureFrame => "capture_frame",
            BridgeRequest::SendInput { .. } => "send_input",
            BridgeRequest::LoadSnapshot { .. } => "load_snapshot",
            BridgeRequest::SaveSnapshot => "save_snapshot",
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

/// A simulated system living in a child process.
pub struct BridgeSystem {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl BridgeSystem {
    /// Launch the bridge process. `command[0]` is the program, the rest its arguments.
    pub fn spawn(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::ConfigError("empty system bridge command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::system("spawn", format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::system("spawn", "bridge stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::system("spawn", "bridge stdout unavailable"))?;

        info!("System bridge started: {} (pid {})", program, child.id());
        Ok(Self { child, stdin, stdout: BufReader::new(stdout) })
    }

    fn call(&mut self, request: BridgeRequest<'_>) -> Result<BridgeReply> {
        let op = request.name();
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| Error::system(op, e.to_string()))?;

        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .map_err(|e| Error::system(op, e.to_string()))?;
        if read == 0 {
            return Err(Error::system(op, "bridge closed its output"));
        }

        let reply: BridgeReply = serde_json::from_str(reply.trim())
            .map_err(|e| Error::system(op, format!("malformed reply: {}", e)))?;
        if !reply.ok {
            return Err(Error::system(op, reply.error.unwrap_or_else(|| "unspecified".into())));
        }
        Ok(reply)
    }

    fn decode(op: &str, data: Option<String>) -> Result<Vec<u8>> {
        let data = data.ok_or_else(|| Error::system(op, "reply carried no data"))?;
        base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| Error::system(op, format!("bad base64: {}", e)))
    }
}

impl SimulatedSystem for BridgeSystem {
    fn step(&mut self, ticks: u32) -> Result<()> {
        self.call(BridgeRequest::Step { ticks }).map(|_| ())
    }

    fn capture_frame(&mut self) -> Result<Frame> {
        let reply = self.call(BridgeRequest::CaptureFrame)?;
        let media_type = reply.media_type.unwrap_or_else(|| "image/png".to_string());
        let bytes = Self::decode("capture_frame", reply.data)?;
        Ok(Frame::new(media_type, bytes))
    }

    fn send_input(&mut self, action: ActionToken, phase: InputPhase) -> Result<()> {
        debug!("bridge input {} {}", action, phase);
        self.call(BridgeRequest::SendInput { action, phase }).map(|_| ())
    }

    fn load_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.call(BridgeRequest::LoadSnapshot { data: &data }).map(|_| ())
    }

    fn save_snapshot(&mut self) -> Result<Vec<u8>> {
        let reply = self.call(BridgeRequest::SaveSnapshot)?;
        Self::decode("save_snapshot", reply.data)
    }
}

impl Drop for BridgeSystem {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop system bridge: {}", e);
        }
        let _ = self.child.wait();
    }
}
