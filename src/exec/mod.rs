use rand::Rng;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Failure of a single host command
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },
}

/// Synchronous execution of one host-level command.
///
/// The single seam between the attachment logic and the host; tests substitute
/// a recording implementation.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), ExecError>;
}

impl<T: CommandRunner> CommandRunner for &T {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), ExecError> {
        (**self).run(program, args)
    }
}

/// Runs commands on the host via `std::process::Command`, logging each
/// executed command line.
#[derive(Debug, Default)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), ExecError> {
        let command = format!("{} {}", program, args.join(" "));
        info!("{}", command);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExecError::Failed {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random suffix for the host end of a veth pair, drawn uniformly from
/// `[a-zA-Z0-9]`. The host end is disposable, so the name only has to be
/// unique enough to avoid clashing inside one namespace.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
        .collect()
}

/// Random locally-administered MAC address for the bridge. Without an explicit
/// address the kernel derives the bridge MAC from the lowest-numbered attached
/// port, which churns as containers come and go.
pub fn random_mac() -> String {
    let mut buf = [0u8; 6];
    rand::thread_rng().fill(&mut buf);
    // Set the locally-administered bit; the multicast bit is left as generated.
    buf[0] |= 2;
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5]
    )
}
