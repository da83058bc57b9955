use crate::domain::model::TransformSpec;
use crate::utils::error::Result;
use std::path::Path;

/// 外部服務一次呼叫的結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ServiceOutput {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// stdout 與 stderr 合併，給錯誤訊息使用
    pub fn diagnostics(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Applies scale and/or a rigid transform to the geometry asset at `input`,
/// writing the result to `output`.
///
/// A non-successful `ServiceOutput` is a reported failure of the transform itself;
/// `Err` is reserved for not being able to run the service at all.
pub trait GeometryTransformService {
    fn apply(&self, input: &Path, output: &Path, spec: &TransformSpec) -> Result<ServiceOutput>;
}

impl<S: GeometryTransformService + ?Sized> GeometryTransformService for &S {
    fn apply(&self, input: &Path, output: &Path, spec: &TransformSpec) -> Result<ServiceOutput> {
        (**self).apply(input, output, spec)
    }
}
