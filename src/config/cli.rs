use crate::config::toml_config::ChainConfig;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "transform-chain")]
#[command(about = "Apply persisted scale, global and ICP registration results to a point cloud")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "transform-chain.toml")]
    pub config: String,

    /// Override chain.input_asset from config
    #[arg(short, long)]
    pub input: Option<String>,

    /// Override output.report_path from config
    #[arg(long)]
    pub report: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Show the planned stages without invoking the transform service
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// 將命令列覆蓋套用到設定檔
    pub fn apply_overrides(&self, config: &mut ChainConfig) {
        if let Some(input) = &self.input {
            tracing::info!("🔧 Input asset overridden to: {}", input);
            config.chain.input_asset = input.clone();
        }
        if let Some(report) = &self.report {
            tracing::info!("🔧 Report path overridden to: {}", report);
            config.output.report_path = Some(report.clone());
        }
    }

    pub fn monitoring_enabled(&self, config: &ChainConfig) -> bool {
        self.monitor.unwrap_or_else(|| config.monitoring_enabled())
    }
}
