use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::cgi::environment::CgiEnvironment;
use crate::cgi::response::CgiResponse;
use crate::error::CgiError;
use crate::http::Request;

/// Wall-clock budget a CGI script gets to produce output (`spec.md` §4.8).
const TIMEOUT: Duration = Duration::from_secs(5);
const MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

/// Resolve the interpreter for a script by extension, per `spec.md` §4.8's
/// dispatch table: `.py` → python3, `.js` → node, otherwise run the file
/// itself (it's expected to be executable, e.g. via a shebang).
///
/// `execute()` below `chdir`s into the script's directory first, so the
/// argv/command here must name the script by its basename, not the path
/// it was resolved from — otherwise the interpreter (or the direct exec)
/// resolves a stale relative path against the new cwd and finds nothing.
fn command_for(script_path: &Path) -> (String, Vec<String>) {
    let script_name = script_path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
    match script_path.extension().and_then(|e| e.to_str()) {
        Some("py") => ("/usr/bin/python3".to_string(), vec![script_name]),
        Some("js") => ("/usr/bin/node".to_string(), vec![script_name]),
        // `./` keeps this a direct relative-path exec: `Command` does its own
        // PATH search for slash-less program names, unlike plain `execve`.
        _ => (format!("./{script_name}"), vec![]),
    }
}

/// Spawn the script, feed it the request body, and collect its output
/// within the 5-second budget. Stateless: one call per request.
pub struct CgiExecutor;

impl CgiExecutor {
    pub fn execute(request: &Request, script_path: &Path, env: &CgiEnvironment) -> Result<CgiResponse, CgiError> {
        let (command, args) = command_for(script_path);
        let working_dir = script_path.parent().unwrap_or_else(|| Path::new("."));

        let mut child = Command::new(&command)
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .envs(env.to_env_strings().iter().filter_map(|kv| kv.split_once('=')))
            .spawn()
            .map_err(|e| CgiError::SpawnFailed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&request.body);
        }

        let output = Self::collect_output(&mut child)?;
        Ok(CgiResponse::parse(&output))
    }

    /// Poll the child's stdout with a 5-second wall-clock budget. On expiry,
    /// `SIGKILL` the child and reap it before failing the request.
    fn collect_output(child: &mut std::process::Child) -> Result<Vec<u8>, CgiError> {
        let start = Instant::now();
        let mut stdout = child.stdout.take().expect("stdout was piped");
        stdout.set_nonblocking_hint();

        let mut output = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            if start.elapsed() > TIMEOUT {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CgiError::Timeout);
            }

            match stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    output.extend_from_slice(&buf[..n]);
                    if output.len() > MAX_OUTPUT_SIZE {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CgiError::BadOutput("CGI output exceeded the size cap".to_string()));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(CgiError::Io(e)),
            }
        }

        match child.wait() {
            Ok(status) if status.success() => Ok(output),
            Ok(status) => Err(CgiError::NonZeroExit(status.code().unwrap_or(-1))),
            Err(e) => Err(CgiError::Io(e)),
        }
    }
}

/// Put a child's stdout pipe in non-blocking mode so the polling loop above
/// can enforce the wall-clock budget instead of blocking forever on `read`.
trait NonBlockingHint {
    fn set_nonblocking_hint(&self);
}

impl NonBlockingHint for std::process::ChildStdout {
    fn set_nonblocking_hint(&self) {
        use std::os::unix::io::AsRawFd;
        unsafe {
            let fd = self.as_raw_fd();
            let flags = libc::fcntl(fd, libc::F_GETFL, 0);
            if flags >= 0 {
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }
    }
}
