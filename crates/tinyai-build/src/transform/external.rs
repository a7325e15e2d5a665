use super::{ModuleUnit, Transform, TransformContext, TransformError};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// A shell command standing in for a built-in step.
///
/// The code is written to the command's stdin and replaced by its stdout.
/// `TINYAI_FILE`, `TINYAI_TARGET` and `TINYAI_STEP` are set for the
/// command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    step: String,
    command: String,
}

impl ExternalTool {
    pub fn new(step: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            command: command.into(),
        }
    }

    fn run(&self, input: &str, envs: &[(&str, String)]) -> Result<String, TransformError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransformError::Failed(format!("cannot start '{}': {}", self.command, e))
            })?;

        let stdin = child.stdin.take();
        let bytes = input.as_bytes().to_vec();
        // Feed stdin from a thread so a tool that writes before reading
        // everything cannot deadlock on a full pipe
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&bytes),
            None => Ok(()),
        });

        let output = child
            .wait_with_output()
            .map_err(|e| {
                TransformError::Failed(format!("'{}' did not finish: {}", self.command, e))
            })?;

        // A tool may exit without draining stdin; the exit status decides
        let _ = writer.join();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransformError::Failed(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|_| {
            TransformError::Failed(format!("'{}' produced non-UTF-8 output", self.command))
        })
    }
}

impl Transform for ExternalTool {
    fn name(&self) -> &str {
        &self.step
    }

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        debug!(
            step = %self.step,
            command = %self.command,
            file = %unit.path.display(),
            "running external tool"
        );
        let envs = [
            ("TINYAI_FILE", unit.path.display().to_string()),
            ("TINYAI_TARGET", ctx.target.name.clone()),
            ("TINYAI_STEP", self.step.clone()),
        ];
        unit.code = self.run(&unit.code, &envs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipes_code_through_command() {
        let tool = ExternalTool::new("minify", "tr a-z A-Z");
        assert_eq!(tool.run("var x;", &[]).unwrap(), "VAR X;");
    }

    #[test]
    fn test_non_zero_exit_fails() {
        let tool = ExternalTool::new("minify", "echo broken >&2; exit 3");
        match tool.run("var x;", &[]) {
            Err(TransformError::Failed(message)) => assert!(message.contains("broken")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_environment_is_passed() {
        let tool = ExternalTool::new("minify", "cat >/dev/null; printf %s \"$TINYAI_STEP\"");
        let out = tool.run("", &[("TINYAI_STEP", "minify".to_string())]).unwrap();
        assert_eq!(out, "minify");
    }
}
