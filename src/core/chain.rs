use crate::domain::model::{ChainParameters, StageKind, StageSuffixes, TransformStage};
use crate::domain::ports::GeometryTransformService;
use crate::utils::error::{ChainError, Result};
use crate::utils::monitor::ResourceMonitor;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// `dir/cloud.ply` + `_scale` -> `dir/cloud_scale.ply`
pub fn derive_output_path(input: &Path, suffix: &str) -> PathBuf {
    let mut name = input.file_stem().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    if let Some(extension) = input.extension() {
        name.push(".");
        name.push(extension);
    }
    input.with_file_name(name)
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: TransformStage,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// 一次執行的結果；失敗時只含已完成的階段
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub started_at: DateTime<Utc>,
    /// Last asset written to disk, or the input when no stage completed.
    pub final_output: PathBuf,
    pub stages: Vec<StageReport>,
    pub failed_stage: Option<StageKind>,
}

impl ChainReport {
    fn new(input: &Path) -> Self {
        Self {
            started_at: Utc::now(),
            final_output: input.to_path_buf(),
            stages: Vec::with_capacity(StageKind::ORDER.len()),
            failed_stage: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_stage.is_none() && self.stages.len() == StageKind::ORDER.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn summary(&self) -> serde_json::Value {
        let stages: Vec<serde_json::Value> = self
            .stages
            .iter()
            .map(|report| {
                serde_json::json!({
                    "stage": report.stage.kind.name(),
                    "input": report.stage.input.display().to_string(),
                    "output": report.stage.output.display().to_string(),
                    "spec": report.stage.spec,
                    "duration_ms": report.duration.as_millis() as u64,
                })
            })
            .collect();

        let status = match self.failed_stage {
            Some(_) => "failed",
            None => "completed",
        };

        serde_json::json!({
            "started_at": self.started_at.to_rfc3339(),
            "status": status,
            "failed_stage": self.failed_stage.map(|kind| kind.name()),
            "final_output": self.final_output.display().to_string(),
            "total_stages": self.stages.len(),
            "total_duration_ms": self.total_duration().as_millis() as u64,
            "stages": stages,
        })
    }

    pub fn write_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(path, content)?;
        tracing::info!("📝 Run report written to: {}", path.display());
        Ok(())
    }
}

/// Runs SCALE -> GLOBAL -> FINE, feeding each stage's output asset into the next.
pub struct TransformChainRunner<S: GeometryTransformService> {
    service: S,
    suffixes: StageSuffixes,
    monitor: ResourceMonitor,
}

impl<S: GeometryTransformService> TransformChainRunner<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            suffixes: StageSuffixes::default(),
            monitor: ResourceMonitor::default(),
        }
    }

    pub fn with_suffixes(mut self, suffixes: StageSuffixes) -> Self {
        self.suffixes = suffixes;
        self
    }

    /// 啟用或禁用資源監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = ResourceMonitor::new(enabled);
        self
    }

    pub fn plan(&self, input: &Path, params: &ChainParameters) -> Vec<TransformStage> {
        let mut current = input.to_path_buf();
        StageKind::ORDER
            .iter()
            .map(|&kind| {
                let output = derive_output_path(&current, self.suffixes.for_stage(kind));
                TransformStage {
                    kind,
                    input: std::mem::replace(&mut current, output.clone()),
                    output,
                    spec: params.spec_for(kind),
                }
            })
            .collect()
    }

    pub fn run(&self, input: &Path, params: &ChainParameters) -> Result<ChainReport> {
        let (report, outcome) = self.run_recorded(input, params);
        outcome.map(|()| report)
    }

    /// Like [`run`](Self::run), but the report of the stages that did finish is
    /// returned even when a stage fails.
    pub fn run_recorded(
        &self,
        input: &Path,
        params: &ChainParameters,
    ) -> (ChainReport, Result<()>) {
        let mut report = ChainReport::new(input);
        let outcome = self.execute(input, params, &mut report);
        (report, outcome)
    }

    fn execute(
        &self,
        input: &Path,
        params: &ChainParameters,
        report: &mut ChainReport,
    ) -> Result<()> {
        for stage in self.plan(input, params) {
            tracing::info!(
                "🔄 Stage {}: {} -> {}",
                stage.kind,
                stage.input.display(),
                stage.output.display()
            );
            tracing::debug!("Stage {} options: {:?}", stage.kind, stage.spec);

            let start_time = Instant::now();
            let output = match self.service.apply(&stage.input, &stage.output, &stage.spec) {
                Ok(output) => output,
                Err(e) => {
                    report.failed_stage = Some(stage.kind);
                    return Err(e);
                }
            };
            let duration = start_time.elapsed();

            if !output.stdout.trim().is_empty() {
                tracing::info!("STDOUT [{}]: {}", stage.kind, output.stdout.trim_end());
            }
            if !output.stderr.trim().is_empty() {
                tracing::warn!("STDERR [{}]: {}", stage.kind, output.stderr.trim_end());
            }

            if !output.success {
                tracing::error!(
                    "❌ Stage {} failed (exit code: {:?}), earlier outputs are left in place",
                    stage.kind,
                    output.exit_code
                );
                report.failed_stage = Some(stage.kind);
                return Err(ChainError::StageFailure {
                    stage: stage.kind.name().to_string(),
                    exit_code: output.exit_code,
                    diagnostics: output.diagnostics(),
                });
            }

            tracing::info!("✅ Stage {} finished in {:?}", stage.kind, duration);
            self.monitor.log_stage(stage.kind.name());

            report.final_output = stage.output.clone();
            report.stages.push(StageReport {
                stage,
                stdout: output.stdout,
                stderr: output.stderr,
                duration,
            });
        }

        Ok(())
    }
}
