use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use anyhow::{Context, bail};

const FORGE: &str = "forge";

/// Pipe Solidity source through `forge fmt --raw -`.
pub fn format_solidity(src: &str) -> anyhow::Result<String> {
    format_with(FORGE, src)
}

/// Run `<program> fmt --raw -` over `src` and return its stdout.
pub fn format_with(program: &str, src: &str) -> anyhow::Result<String> {
    log::debug!("formatting {} bytes with {program}", src.len());
    let mut child = Command::new(program)
        .args(["fmt", "--raw", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{program}` (is Foundry installed and on PATH?)"))?;

    // stdin must be dropped so the formatter sees EOF.
    {
        let mut stdin = child
            .stdin
            .take()
            .with_context(|| format!("failed to open {program} stdin"))?;
        // A formatter that exits early closes the pipe; its exit status says why.
        match stdin.write_all(src.as_bytes()) {
            Err(error) if error.kind() != ErrorKind::BrokenPipe => {
                return Err(error).with_context(|| format!("failed to write to {program} stdin"));
            }
            _ => {}
        }
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} fmt failed ({}):\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    String::from_utf8(output.stdout).with_context(|| format!("{program} fmt produced non-UTF-8 output"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_formatter_is_an_error() {
        let err = format_with("template-json-no-such-formatter", "library A {}").unwrap_err();
        assert!(err.to_string().contains("failed to spawn `template-json-no-such-formatter`"), "{err:#}");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let err = format_with("false", "library A {}").unwrap_err();
        assert!(err.to_string().starts_with("false fmt failed"), "{err:#}");
    }
}
