//! File classification by basename pattern
//!
//! A file is a segment or probe table if its basename matches the
//! corresponding pattern starting at the first character. Segment patterns
//! are tried first.

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::stats::RecordKind;
use crate::core::LiftoverConfig;
use regex::Regex;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct FilePattern {
    regex: Regex,
    output_name: Option<String>,
}

impl FilePattern {
    fn compile(pattern: &str, output_name: Option<String>) -> ConfigResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex, output_name })
    }

    /// The part of `name` matched from its first character
    fn matched<'n>(&self, name: &'n str) -> Option<&'n str> {
        self.regex
            .find(name)
            .filter(|m| m.start() == 0)
            .map(|m| m.as_str())
    }
}

/// A classified input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    pub kind: RecordKind,
    /// Matched prefix of the basename
    pub matched: String,
}

/// Decides the record kind and output location of input files
#[derive(Debug, Clone)]
pub struct FileClassifier {
    segment: Option<FilePattern>,
    probe: Option<FilePattern>,
}

impl FileClassifier {
    pub fn new(segment: Option<&str>, probe: Option<&str>) -> ConfigResult<Self> {
        if segment.is_none() && probe.is_none() {
            return Err(ConfigError::NoInputKind);
        }
        Ok(Self {
            segment: segment.map(|p| FilePattern::compile(p, None)).transpose()?,
            probe: probe.map(|p| FilePattern::compile(p, None)).transpose()?,
        })
    }

    pub fn from_config(config: &LiftoverConfig) -> ConfigResult<Self> {
        Self::new(
            config.segment_pattern.as_deref(),
            config.probe_pattern.as_deref(),
        )
        .map(|c| c.with_output_names(config.segment_output.clone(), config.probe_output.clone()))
    }

    /// Fixed output file names per kind
    pub fn with_output_names(mut self, segment: Option<String>, probe: Option<String>) -> Self {
        if let Some(p) = &mut self.segment {
            p.output_name = segment;
        }
        if let Some(p) = &mut self.probe {
            p.output_name = probe;
        }
        self
    }

    fn patterns(&self) -> impl Iterator<Item = (RecordKind, &FilePattern)> {
        [
            (RecordKind::Segment, self.segment.as_ref()),
            (RecordKind::Probe, self.probe.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, p)| p.map(|p| (kind, p)))
    }

    pub fn classify(&self, path: &Path) -> Option<FileMatch> {
        let name = path.file_name()?.to_str()?;
        self.patterns().find_map(|(kind, pattern)| {
            pattern.matched(name).map(|m| FileMatch {
                kind,
                matched: m.to_string(),
            })
        })
    }

    /// Record kind and output path for `input`
    ///
    /// The output keeps the input's directory relative to `input_dir`, and is
    /// named after the configured output name or the matched basename prefix.
    pub fn output_path(
        &self,
        input: &Path,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Option<(RecordKind, PathBuf)> {
        let found = self.classify(input)?;
        let name = self
            .patterns()
            .find(|(kind, _)| *kind == found.kind)
            .and_then(|(_, p)| p.output_name.clone())
            .unwrap_or(found.matched);

        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        let relative = match parent.strip_prefix(input_dir) {
            Ok(rel) => rel,
            Err(_) => {
                log::debug!(
                    "{} is outside {}, writing to the output root",
                    input.display(),
                    input_dir.display()
                );
                Path::new("")
            }
        };
        Some((found.kind, output_dir.join(relative).join(name)))
    }
}
