//! # Render Jobs
//!
//! A render job bundles everything one render needs, so a set of renders can
//! be kept as files next to the styles they use:
//!
//! ```yaml
//! style: styles/Bossa.sty
//! out: out/bossa-main-b.mid
//! part: Main B
//! chart: "Am7 | D7 | Gmaj7 | Cmaj7"
//! tempo: 132
//! ppq: 480
//! trace: out/bossa-main-b.yaml
//! ```
//!
//! Keys are kebab-case. `chart` and `chart-file` are mutually exclusive;
//! without either the song plays `C7`. Relative paths in a job file are
//! resolved against the file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::api::{RenderOptions, DEFAULT_OUTPUT_TICKS_PER_BEAT};
use crate::error::{Result, StyleError};
use crate::midi::{MAX_TEMPO, MAX_TICKS_PER_BEAT};

/// Slowest tempo a MIDI tempo event can hold.
const MIN_TEMPO_BPM: f64 = 60_000_000.0 / MAX_TEMPO as f64;

/// Part rendered when a job names none.
pub const DEFAULT_PART: &str = "Main A";

/// Raw render job for YAML deserialization
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawRenderJob {
    pub style: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub part: Option<String>,
    pub bars: Option<u32>,
    pub chart: Option<String>,
    pub chart_file: Option<PathBuf>,
    /// Beats per minute.
    pub tempo: Option<f64>,
    /// Output ticks per beat.
    pub ppq: Option<u16>,
    /// Where to write the per-note mapping trace.
    pub trace: Option<PathBuf>,
}

/// A validated render job.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub style: PathBuf,
    pub out: PathBuf,
    pub trace: Option<PathBuf>,
    /// Chart read by [`RenderJob::load_chart`].
    pub chart_file: Option<PathBuf>,
    pub options: RenderOptions,
}

impl RenderJob {
    /// Validate a raw job.
    ///
    /// # Examples
    /// ```
    /// use stylemap::config::{RawRenderJob, RenderJob};
    ///
    /// let raw = RawRenderJob {
    ///     style: Some("Jazz.sty".into()),
    ///     out: Some("jazz.mid".into()),
    ///     bars: Some(0),
    ///     ..Default::default()
    /// };
    /// let err = RenderJob::from_raw(raw).unwrap_err();
    /// assert_eq!(err.to_string(), "Invalid render configuration: bars must be at least 1");
    /// ```
    pub fn from_raw(raw: RawRenderJob) -> Result<Self> {
        let style = raw.style.ok_or_else(|| missing("style"))?;
        let out = raw.out.ok_or_else(|| missing("out"))?;

        if raw.chart.is_some() && raw.chart_file.is_some() {
            return Err(StyleError::Config(
                "`chart` and `chart-file` cannot be combined".to_string(),
            ));
        }
        if raw.bars == Some(0) {
            return Err(StyleError::Config("bars must be at least 1".to_string()));
        }
        if let Some(ppq) = raw.ppq {
            if ppq == 0 || ppq > MAX_TICKS_PER_BEAT {
                return Err(StyleError::Config(format!(
                    "ppq must be between 1 and {}",
                    MAX_TICKS_PER_BEAT
                )));
            }
        }
        if let Some(tempo) = raw.tempo {
            if !tempo.is_finite() || tempo < MIN_TEMPO_BPM {
                return Err(StyleError::Config(format!("Invalid tempo: {}", tempo)));
            }
        }

        let mut options = RenderOptions::new(raw.part.unwrap_or_else(|| DEFAULT_PART.to_string()));
        options.bars = raw.bars;
        options.chord_chart = raw.chart;
        options.tempo_bpm = raw.tempo;
        options.output_ticks_per_beat = raw.ppq.unwrap_or(DEFAULT_OUTPUT_TICKS_PER_BEAT);

        Ok(Self {
            style,
            out,
            trace: raw.trace,
            chart_file: raw.chart_file,
            options,
        })
    }

    /// Parse and validate a YAML render job.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawRenderJob =
            serde_yaml::from_str(content).map_err(|e| StyleError::Config(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Read a job file; relative paths inside it are taken from the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StyleError::Config(format!("Cannot read job file '{}': {}", path.display(), e))
        })?;
        let mut job = Self::from_yaml(&content)?;
        if let Some(base) = path.parent() {
            job.resolve_paths(base);
        }
        Ok(job)
    }

    /// Join every relative path of the job onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.style);
        resolve(&mut self.out);
        if let Some(trace) = self.trace.as_mut() {
            resolve(trace);
        }
        if let Some(chart_file) = self.chart_file.as_mut() {
            resolve(chart_file);
        }
    }

    /// Read the chart file, if any, into the render options.
    pub fn load_chart(&mut self) -> Result<()> {
        if let Some(path) = &self.chart_file {
            let text = fs::read_to_string(path).map_err(|e| {
                StyleError::Config(format!("Cannot read chart file '{}': {}", path.display(), e))
            })?;
            self.options.chord_chart = Some(text);
        }
        Ok(())
    }
}

fn missing(key: &str) -> StyleError {
    StyleError::Config(format!("missing `{}`", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_job() {
        let job = RenderJob::from_yaml(
            r#"
style: styles/Bossa.sty
out: out/bossa.mid
part: Main B
bars: 8
chart: "Am7 | D7"
tempo: 132
ppq: 480
trace: out/bossa.yaml
"#,
        )
        .unwrap();
        assert_eq!(job.style, PathBuf::from("styles/Bossa.sty"));
        assert_eq!(job.out, PathBuf::from("out/bossa.mid"));
        assert_eq!(job.trace, Some(PathBuf::from("out/bossa.yaml")));
        assert_eq!(job.options.part, "Main B");
        assert_eq!(job.options.bars, Some(8));
        assert_eq!(job.options.chord_chart.as_deref(), Some("Am7 | D7"));
        assert_eq!(job.options.tempo_bpm, Some(132.0));
        assert_eq!(job.options.output_ticks_per_beat, 480);
    }

    #[test]
    fn test_defaults() {
        let job = RenderJob::from_yaml("style: a.sty\nout: a.mid\n").unwrap();
        assert_eq!(job.options.part, DEFAULT_PART);
        assert_eq!(job.options.output_ticks_per_beat, 960);
        assert_eq!(job.options.bars, None);
        assert_eq!(job.trace, None);
    }

    #[test]
    fn test_missing_keys() {
        let err = RenderJob::from_yaml("out: a.mid\n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid render configuration: missing `style`");
        let err = RenderJob::from_yaml("style: a.sty\n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid render configuration: missing `out`");
    }

    #[test]
    fn test_invalid_values() {
        assert!(RenderJob::from_yaml("style: a\nout: b\nppq: 0\n").is_err());
        assert!(RenderJob::from_yaml("style: a\nout: b\nppq: 40000\n").is_err());
        assert!(RenderJob::from_yaml("style: a\nout: b\nppq: 32767\n").is_ok());
        assert!(RenderJob::from_yaml("style: a\nout: b\ntempo: -10\n").is_err());
        assert!(RenderJob::from_yaml("style: a\nout: b\ntempo: 3\n").is_err());
        assert!(RenderJob::from_yaml("style: a\nout: b\ntempo: 4\n").is_ok());
        assert!(RenderJob::from_yaml("style: a\nout: b\nchart: C\nchart-file: c.txt\n").is_err());
        assert!(RenderJob::from_yaml("style: a\nout: b\nswing: 60\n").is_err());
        assert!(matches!(
            RenderJob::from_yaml("style: [a\n"),
            Err(StyleError::Config(_))
        ));
    }

    #[test]
    fn test_resolve_paths() {
        let mut job =
            RenderJob::from_yaml("style: a.sty\nout: /tmp/a.mid\nchart-file: chart.txt\n").unwrap();
        job.resolve_paths(Path::new("jobs"));
        assert_eq!(job.style, PathBuf::from("jobs/a.sty"));
        assert_eq!(job.out, PathBuf::from("/tmp/a.mid"));
        assert_eq!(job.chart_file, Some(PathBuf::from("jobs/chart.txt")));
    }
}
