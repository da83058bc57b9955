use crate::domain::model::TransformSpec;
use crate::domain::ports::{GeometryTransformService, ServiceOutput};
use crate::utils::error::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs an external transform tool as `<program> <args...> <input> <output> [--flag value]...`
/// and waits for it to exit. No shell is involved.
#[derive(Debug, Clone)]
pub struct SubprocessTransformService {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl SubprocessTransformService {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// 組出完整參數列（不含 program 本身）
    pub fn command_args(&self, input: &Path, output: &Path, spec: &TransformSpec) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(input.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        args.extend(spec.to_cli_args().into_iter().map(OsString::from));
        args
    }

    fn build_command(&self, input: &Path, output: &Path, spec: &TransformSpec) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.command_args(input, output, spec));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl GeometryTransformService for SubprocessTransformService {
    fn apply(&self, input: &Path, output: &Path, spec: &TransformSpec) -> Result<ServiceOutput> {
        let mut command = self.build_command(input, output, spec);
        tracing::debug!("Running: {:?}", command);

        let result = command.output()?;

        Ok(ServiceOutput {
            success: result.status.success(),
            exit_code: result.status.code(),
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        })
    }
}
