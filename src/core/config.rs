//! Run configuration
//!
//! Built once by the CLI and validated before any file is touched: every
//! problem reported here aborts the run.

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::remap::{RemapSettings, DEFAULT_RANGE_KB, DEFAULT_STEP_SIZE};
use crate::core::translate::LiftOverCommand;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Chain names shipped in the chain directory
pub const KNOWN_CHAINS: [&str; 5] = [
    "hg18ToHg19",
    "hg18ToHg38",
    "hg19ToHg38",
    "hg38ToHg19",
    "hg19ToHg18",
];

pub const DEFAULT_ENGINE: &str = "./liftOver";
pub const DEFAULT_CHAIN_DIR: &str = "chains";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Resolve a known chain name to `<chain_dir>/<name>.over.chain.gz`
///
/// Anything else is taken as a path.
///
/// # Examples
/// ```
/// use segment_liftover::core::resolve_chain;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     resolve_chain("hg19ToHg38", Path::new("chains")),
///     PathBuf::from("chains/hg19ToHg38.over.chain.gz")
/// );
/// assert_eq!(resolve_chain("my.chain", Path::new("chains")), PathBuf::from("my.chain"));
/// ```
pub fn resolve_chain(name: &str, chain_dir: &Path) -> PathBuf {
    if KNOWN_CHAINS.contains(&name) {
        chain_dir.join(format!("{}.over.chain.gz", name))
    } else {
        PathBuf::from(name)
    }
}

/// Index and progress files of an interrupted run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFiles {
    pub index: PathBuf,
    pub progress: PathBuf,
}

/// Everything a liftover run needs to know
#[derive(Debug, Clone)]
pub struct LiftoverConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// liftOver executable
    pub engine: PathBuf,
    /// Chain file (already resolved, see [`resolve_chain`])
    pub chain: PathBuf,
    /// Basename patterns, matched at the start of the name
    pub segment_pattern: Option<String>,
    pub probe_pattern: Option<String>,
    /// Output file names; default is the matched part of the input name
    pub segment_output: Option<String>,
    pub probe_output: Option<String>,
    pub step_size: i64,
    pub range_kb: i64,
    pub fallback: bool,
    pub segment_header: Option<[String; 4]>,
    pub probe_header: Option<[String; 3]>,
    pub engine_timeout: Option<Duration>,
    pub threads: usize,
    pub remap_seed: Option<PathBuf>,
    pub resume: Option<ResumeFiles>,
    pub index_file: Option<PathBuf>,
    /// Process at most this many files
    pub limit: Option<usize>,
    pub log_dir: PathBuf,
}

impl Default for LiftoverConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            engine: PathBuf::from(DEFAULT_ENGINE),
            chain: PathBuf::new(),
            segment_pattern: None,
            probe_pattern: None,
            segment_output: None,
            probe_output: None,
            step_size: DEFAULT_STEP_SIZE,
            range_kb: DEFAULT_RANGE_KB,
            fallback: true,
            segment_header: None,
            probe_header: None,
            engine_timeout: None,
            threads: 1,
            remap_seed: None,
            resume: None,
            index_file: None,
            limit: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl LiftoverConfig {
    /// Check the configuration, returning the derived search settings
    pub fn validate(&self) -> ConfigResult<RemapSettings> {
        if self.segment_pattern.is_none() && self.probe_pattern.is_none() {
            return Err(ConfigError::NoInputKind);
        }
        for pattern in [&self.segment_pattern, &self.probe_pattern].into_iter().flatten() {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                });
            }
        }

        if !self.engine.is_file() {
            return Err(ConfigError::EngineNotFound(self.engine.clone()));
        }
        if !self.chain.is_file() {
            return Err(ConfigError::ChainNotFound(self.chain.clone()));
        }

        let settings = RemapSettings::from_range(self.step_size, self.range_kb)?;

        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }

        if let Some(resume) = &self.resume {
            if !resume.index.is_file() {
                return Err(ConfigError::ResumeFileNotFound {
                    role: "index",
                    path: resume.index.clone(),
                });
            }
            if !resume.progress.is_file() {
                return Err(ConfigError::ResumeFileNotFound {
                    role: "progress",
                    path: resume.progress.clone(),
                });
            }
        } else if self.index_file.is_none() && !self.input_dir.is_dir() {
            return Err(ConfigError::InputDirNotFound(self.input_dir.clone()));
        }

        Ok(settings)
    }

    /// The external engine driver for this run
    pub fn engine_command(&self) -> LiftOverCommand {
        LiftOverCommand::new(&self.engine, &self.chain).with_timeout(self.engine_timeout)
    }
}

fn opt<T: fmt::Debug>(value: &Option<T>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => "None".to_string(),
    }
}

impl fmt::Display for LiftoverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters:")?;
        writeln!(f, "  input_dir: {}", self.input_dir.display())?;
        writeln!(f, "  output_dir: {}", self.output_dir.display())?;
        writeln!(f, "  liftover: {}", self.engine.display())?;
        writeln!(f, "  chain_file: {}", self.chain.display())?;
        writeln!(f, "  segment_input_file: {}", opt(&self.segment_pattern))?;
        writeln!(f, "  segment_output_file: {}", opt(&self.segment_output))?;
        writeln!(f, "  probe_input_file: {}", opt(&self.probe_pattern))?;
        writeln!(f, "  probe_output_file: {}", opt(&self.probe_output))?;
        writeln!(f, "  step_size: {}", self.step_size)?;
        writeln!(f, "  range: {}", self.range_kb)?;
        writeln!(f, "  no_remapping: {}", !self.fallback)?;
        writeln!(f, "  new_segment_header: {}", opt(&self.segment_header))?;
        writeln!(f, "  new_probe_header: {}", opt(&self.probe_header))?;
        writeln!(f, "  index_file: {}", opt(&self.index_file))?;
        writeln!(f, "  remap_file: {}", opt(&self.remap_seed))?;
        writeln!(f, "  resume: {}", opt(&self.resume))?;
        writeln!(f, "  test_mode: {}", opt(&self.limit))?;
        writeln!(f, "  threads: {}", self.threads)?;
        write!(f, "  timeout: {}", opt(&self.engine_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn valid_config(dir: &Path) -> LiftoverConfig {
        let engine = dir.join("liftOver");
        let chain = dir.join("test.chain");
        fs::write(&engine, "").unwrap();
        fs::write(&chain, "").unwrap();
        LiftoverConfig {
            input_dir: dir.to_path_buf(),
            engine,
            chain,
            segment_pattern: Some("segments".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_derives_steps() {
        let dir = tempdir().unwrap();
        let config = valid_config(dir.path());
        assert_eq!(config.validate().unwrap(), RemapSettings::new(400, 25));
    }

    #[test]
    fn test_missing_engine_and_chain() {
        let dir = tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.chain = dir.path().join("missing.chain");
        assert!(matches!(config.validate(), Err(ConfigError::ChainNotFound(_))));

        config.engine = dir.path().join("nope");
        assert!(matches!(config.validate(), Err(ConfigError::EngineNotFound(_))));
    }

    #[test]
    fn test_numeric_settings() {
        let dir = tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.step_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidStepSize(0))));

        config.step_size = 400;
        config.range_kb = -3;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRange(-3))));

        config.step_size = 1;
        config.range_kb = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::TooManySteps { .. })));

        config.step_size = 400;
        config.range_kb = 10;
        config.threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreads)));
    }

    #[test]
    fn test_patterns() {
        let dir = tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.segment_pattern = None;
        assert!(matches!(config.validate(), Err(ConfigError::NoInputKind)));

        config.probe_pattern = Some("probes(".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_resume_files_must_exist() {
        let dir = tempdir().unwrap();
        let mut config = valid_config(dir.path());
        let index = dir.path().join("fileList.log");
        fs::write(&index, "a\n").unwrap();
        config.resume = Some(ResumeFiles {
            index,
            progress: dir.path().join("progress.log"),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ResumeFileNotFound { role: "progress", .. })
        ));
    }

    #[test]
    fn test_known_chain_names() {
        for name in KNOWN_CHAINS {
            let path = resolve_chain(name, Path::new("/opt/chains"));
            assert!(path.starts_with("/opt/chains"));
            assert!(path.to_string_lossy().ends_with(".over.chain.gz"));
        }
    }

    #[test]
    fn test_parameter_echo() {
        let text = LiftoverConfig::default().to_string();
        assert!(text.starts_with("Parameters:"));
        assert!(text.contains("step_size: 400"));
        assert!(text.contains("no_remapping: false"));
    }
}
