use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::throttle::{ThrottleConfig, ThrottleMode};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8793";
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INFERENCE_INTERVAL_MS: u64 = 200;
const DEFAULT_EVIDENCE_ENDPOINT: &str = "mem://evidence";
const DEFAULT_MIN_UPLOAD_SECS: u64 = 10;
const DEFAULT_SAMPLE_WINDOW_SECS: u64 = 60;

#[derive(Debug, Deserialize, Default)]
struct SentineldConfigFile {
    api: Option<ApiConfigFile>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    evidence: Option<EvidenceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<String>,
    violation_threshold: Option<f32>,
    safe_threshold: Option<f32>,
    unsafe_keywords: Option<Vec<String>>,
    safe_keywords: Option<Vec<String>>,
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct EvidenceConfigFile {
    endpoint: Option<String>,
    throttle_mode: Option<String>,
    min_interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SentineldConfig {
    pub api_addr: String,
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub evidence: EvidenceSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<String>,
    pub violation_threshold: f32,
    pub safe_threshold: f32,
    pub unsafe_keywords: Vec<String>,
    pub safe_keywords: Vec<String>,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct EvidenceSettings {
    pub endpoint: String,
    pub throttle: ThrottleConfig,
}

impl SentineldConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentineldConfigFile) -> Result<Self> {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());

        let source = SourceSettings {
            url: file
                .source
                .as_ref()
                .and_then(|source| source.url.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_SOURCE_FPS),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_SOURCE_HEIGHT),
        };

        let classify_defaults = crate::detect::ClassifyConfig::default();
        let detector = DetectorSettings {
            backend: file
                .detector
                .as_ref()
                .and_then(|det| det.backend.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: file.detector.as_ref().and_then(|det| det.model_path.clone()),
            violation_threshold: file
                .detector
                .as_ref()
                .and_then(|det| det.violation_threshold)
                .unwrap_or(classify_defaults.violation_threshold),
            safe_threshold: file
                .detector
                .as_ref()
                .and_then(|det| det.safe_threshold)
                .unwrap_or(classify_defaults.safe_threshold),
            unsafe_keywords: file
                .detector
                .as_ref()
                .and_then(|det| det.unsafe_keywords.clone())
                .unwrap_or(classify_defaults.unsafe_keywords),
            safe_keywords: file
                .detector
                .as_ref()
                .and_then(|det| det.safe_keywords.clone())
                .unwrap_or(classify_defaults.safe_keywords),
            interval: Duration::from_millis(
                file.detector
                    .as_ref()
                    .and_then(|det| det.interval_ms)
                    .unwrap_or(DEFAULT_INFERENCE_INTERVAL_MS),
            ),
        };

        let throttle_mode = file
            .evidence
            .as_ref()
            .and_then(|ev| ev.throttle_mode.clone())
            .unwrap_or_else(|| "debounce".to_string());
        let evidence = EvidenceSettings {
            endpoint: file
                .evidence
                .as_ref()
                .and_then(|ev| ev.endpoint.clone())
                .unwrap_or_else(|| DEFAULT_EVIDENCE_ENDPOINT.to_string()),
            throttle: throttle_from(
                &throttle_mode,
                file.evidence.as_ref().and_then(|ev| ev.min_interval_secs),
            )?,
        };

        Ok(Self {
            api_addr,
            source,
            detector,
            evidence,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SENTINEL_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("SENTINEL_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(endpoint) = std::env::var("SENTINEL_EVIDENCE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.evidence.endpoint = endpoint;
            }
        }
        if let Ok(secs) = std::env::var("SENTINEL_MIN_UPLOAD_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                anyhow!("SENTINEL_MIN_UPLOAD_SECS must be an integer number of seconds")
            })?;
            self.evidence.throttle.min_interval = Duration::from_secs(secs);
        }
        if let Ok(backend) = std::env::var("SENTINEL_DETECTOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Ok(keywords) = std::env::var("SENTINEL_UNSAFE_KEYWORDS") {
            let parsed = split_csv(&keywords);
            if !parsed.is_empty() {
                self.detector.unsafe_keywords = parsed;
            }
        }
        if let Ok(keywords) = std::env::var("SENTINEL_SAFE_KEYWORDS") {
            let parsed = split_csv(&keywords);
            if !parsed.is_empty() {
                self.detector.safe_keywords = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for threshold in [
            self.detector.violation_threshold,
            self.detector.safe_threshold,
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(anyhow!("detector thresholds must be within 0..=1"));
            }
        }
        if self.detector.violation_threshold > self.detector.safe_threshold {
            return Err(anyhow!(
                "violation_threshold must not exceed safe_threshold"
            ));
        }
        if self.detector.unsafe_keywords.is_empty() {
            return Err(anyhow!("at least one unsafe keyword is required"));
        }
        if self.evidence.throttle.min_interval.is_zero() {
            return Err(anyhow!("evidence min interval must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source resolution must be non-zero"));
        }
        Ok(())
    }

    /// Classification settings derived from the detector section.
    pub fn classify_config(&self) -> crate::detect::ClassifyConfig {
        crate::detect::ClassifyConfig {
            unsafe_keywords: self.detector.unsafe_keywords.clone(),
            safe_keywords: self.detector.safe_keywords.clone(),
            violation_threshold: self.detector.violation_threshold,
            safe_threshold: self.detector.safe_threshold,
        }
    }
}

fn throttle_from(mode: &str, min_interval_secs: Option<u64>) -> Result<ThrottleConfig> {
    let (mode, default_secs) = match mode {
        "debounce" => (ThrottleMode::Debounce, DEFAULT_MIN_UPLOAD_SECS),
        "sample" => (ThrottleMode::Sample, DEFAULT_SAMPLE_WINDOW_SECS),
        other => {
            return Err(anyhow!(
                "unknown throttle mode '{}'; expected 'debounce' or 'sample'",
                other
            ))
        }
    };
    Ok(ThrottleConfig {
        mode,
        min_interval: Duration::from_secs(min_interval_secs.unwrap_or(default_secs)),
    })
}

fn read_config_file(path: &Path) -> Result<SentineldConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
