use crate::adapters::SubprocessTransformService;
use crate::core::records::{RecordSources, RecordTable};
use crate::domain::model::{ChainParameters, StageSuffixes};
use crate::utils::error::{ChainError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_suffix, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain: ChainSection,
    #[serde(default)]
    pub records: RecordsConfig,
    pub service: ServiceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSection {
    pub name: Option<String>,
    pub input_asset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    pub directory: Option<String>,
    #[serde(default = "default_global_file")]
    pub global_file: String,
    #[serde(default = "default_fine_file")]
    pub fine_file: String,
    /// 預設與 global_file 相同
    pub scale_file: Option<String>,
    #[serde(default = "default_global_key")]
    pub global_key: String,
    #[serde(default = "default_fine_key")]
    pub fine_key: String,
}

fn default_global_file() -> String {
    "global_reg_result.csv".to_string()
}

fn default_fine_file() -> String {
    "fine_reg_result.csv".to_string()
}

fn default_global_key() -> String {
    "result_T_m2_m1".to_string()
}

fn default_fine_key() -> String {
    "icp_result.transformation".to_string()
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            global_file: default_global_file(),
            fine_file: default_fine_file(),
            scale_file: None,
            global_key: default_global_key(),
            fine_key: default_fine_key(),
        }
    }
}

impl RecordsConfig {
    fn resolve_file(&self, file: &str) -> PathBuf {
        match &self.directory {
            Some(dir) => Path::new(dir).join(file),
            None => PathBuf::from(file),
        }
    }

    pub fn global_path(&self) -> PathBuf {
        self.resolve_file(&self.global_file)
    }

    pub fn fine_path(&self) -> PathBuf {
        self.resolve_file(&self.fine_file)
    }

    pub fn scale_path(&self) -> PathBuf {
        self.resolve_file(self.scale_file.as_deref().unwrap_or(&self.global_file))
    }

    /// 讀取所有 record 檔並解析出整條鏈的參數
    pub fn load_parameters(&self) -> Result<ChainParameters> {
        let global = RecordTable::from_path(self.global_path())?;
        let fine = RecordTable::from_path(self.fine_path())?;
        let separate_scale = match &self.scale_file {
            Some(_) => Some(RecordTable::from_path(self.scale_path())?),
            None => None,
        };

        ChainParameters::resolve(RecordSources {
            global: &global,
            global_key: &self.global_key,
            fine: &fine,
            fine_key: &self.fine_key,
            scale: separate_scale.as_ref().unwrap_or(&global),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<String>,
}

impl ServiceConfig {
    pub fn build(&self) -> SubprocessTransformService {
        SubprocessTransformService::new(self.program.clone(), self.args.clone())
            .with_working_dir(self.working_dir.as_ref().map(PathBuf::from))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub scale_suffix: Option<String>,
    pub global_suffix: Option<String>,
    pub fine_suffix: Option<String>,
    pub report_path: Option<String>,
}

impl OutputConfig {
    pub fn suffixes(&self) -> StageSuffixes {
        let defaults = StageSuffixes::default();
        StageSuffixes {
            scale: self.scale_suffix.clone().unwrap_or(defaults.scale),
            global: self.global_suffix.clone().unwrap_or(defaults.global),
            fine: self.fine_suffix.clone().unwrap_or(defaults.fine),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl ChainConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ChainError::ConfigError {
            message: format!("cannot read '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ChainError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_ROOT})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ChainError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn name(&self) -> &str {
        self.chain.name.as_deref().unwrap_or("transform-chain")
    }

    pub fn input_asset(&self) -> &Path {
        Path::new(&self.chain.input_asset)
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.output.report_path.as_deref().map(Path::new)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for ChainConfig {
    fn validate(&self) -> Result<()> {
        validate_path("chain.input_asset", &self.chain.input_asset)?;

        if let Some(dir) = &self.records.directory {
            validate_path("records.directory", dir)?;
        }
        validate_path("records.global_file", &self.records.global_file)?;
        validate_path("records.fine_file", &self.records.fine_file)?;
        if let Some(scale_file) = &self.records.scale_file {
            validate_path("records.scale_file", scale_file)?;
        }
        validate_non_empty_string("records.global_key", &self.records.global_key)?;
        validate_non_empty_string("records.fine_key", &self.records.fine_key)?;

        validate_non_empty_string("service.program", &self.service.program)?;
        if let Some(dir) = &self.service.working_dir {
            validate_path("service.working_dir", dir)?;
        }

        let suffixes = self.output.suffixes();
        validate_suffix("output.scale_suffix", &suffixes.scale)?;
        validate_suffix("output.global_suffix", &suffixes.global)?;
        validate_suffix("output.fine_suffix", &suffixes.fine)?;

        if let Some(report) = &self.output.report_path {
            validate_path("output.report_path", report)?;
        }

        Ok(())
    }
}
