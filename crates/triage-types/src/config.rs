//! Configuration for the triage engine.
//!
//! [`OrganizerConfig`] is the immutable object the engine consumes; it is
//! validated once when an organizer is built. [`Settings`] is the layered
//! process configuration used by the CLI:
//! defaults -> config file -> CLI config file -> env vars.

use std::collections::BTreeMap;
use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// Largest neighbor count a caller may ask for.
pub const MAX_K: usize = 20;

/// Embedding model identity and input limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier: "hashing" or a Hugging Face repo id
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Expected model version. When set, the organizer refuses to start
    /// with a model reporting a different version.
    #[serde(default)]
    pub model_version: Option<String>,

    /// Dimension used by the hashing model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Cleaned text is cut to this many chars, keeping the head
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_model_id() -> String {
    "hashing".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_max_input_chars() -> usize {
    8192
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            model_version: None,
            dimension: default_dimension(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model_id.trim().is_empty() {
            return Err("model_id must not be empty".to_string());
        }
        if self.dimension == 0 {
            return Err("dimension must be > 0".to_string());
        }
        if self.max_input_chars == 0 {
            return Err("max_input_chars must be > 0".to_string());
        }
        Ok(())
    }
}

/// Nearest-neighbor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Neighbors returned per ticket
    #[serde(default = "default_k")]
    pub k: usize,

    /// Links scoring below this are dropped
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_k() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.5
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_score: default_min_score(),
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.k == 0 || self.k > MAX_K {
            return Err(format!("k must be 1-{MAX_K}, got {}", self.k));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(format!("min_score must be 0.0-1.0, got {}", self.min_score));
        }
        Ok(())
    }
}

/// Theme clustering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Minimum centroid similarity to join a theme, and to merge two themes
    #[serde(default = "default_join_threshold")]
    pub join_threshold: f32,

    /// Themes whose average pairwise member similarity is below this are
    /// split during a full reprocess
    #[serde(default = "default_min_cohesion")]
    pub min_cohesion: f32,

    /// Below this many embedded tickets a loose match is held as noise
    /// instead of seeding a new theme
    #[serde(default = "default_small_population")]
    pub small_population: usize,

    /// Lower bound of a "loose" match
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: f32,

    /// Full-reprocess clusters smaller than this become noise
    #[serde(default = "default_min_theme_size")]
    pub min_theme_size: usize,

    /// Recursion limit for cohesion splits
    #[serde(default = "default_max_split_depth")]
    pub max_split_depth: usize,

    /// Number of terms in a generated theme label
    #[serde(default = "default_label_terms")]
    pub label_terms: usize,
}

fn default_join_threshold() -> f32 {
    0.6
}

fn default_min_cohesion() -> f32 {
    0.45
}

fn default_small_population() -> usize {
    20
}

fn default_noise_threshold() -> f32 {
    0.4
}

fn default_min_theme_size() -> usize {
    1
}

fn default_max_split_depth() -> usize {
    3
}

fn default_label_terms() -> usize {
    3
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            join_threshold: default_join_threshold(),
            min_cohesion: default_min_cohesion(),
            small_population: default_small_population(),
            noise_threshold: default_noise_threshold(),
            min_theme_size: default_min_theme_size(),
            max_split_depth: default_max_split_depth(),
            label_terms: default_label_terms(),
        }
    }
}

impl ThemeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.join_threshold) {
            return Err(format!(
                "join_threshold must be 0.0-1.0, got {}",
                self.join_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.min_cohesion) {
            return Err(format!(
                "min_cohesion must be 0.0-1.0, got {}",
                self.min_cohesion
            ));
        }
        if !(0.0..=self.join_threshold).contains(&self.noise_threshold) {
            return Err(format!(
                "noise_threshold must be 0.0-join_threshold, got {}",
                self.noise_threshold
            ));
        }
        if self.min_theme_size == 0 {
            return Err("min_theme_size must be >= 1".to_string());
        }
        if self.label_terms == 0 {
            return Err("label_terms must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Relative weight of each tag signal in the combined confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWeights {
    #[serde(default = "default_similar_weight")]
    pub similar_ticket: f32,
    #[serde(default = "default_theme_weight")]
    pub theme: f32,
    #[serde(default = "default_rule_weight")]
    pub content_rule: f32,
}

fn default_similar_weight() -> f32 {
    1.0
}

fn default_theme_weight() -> f32 {
    0.8
}

fn default_rule_weight() -> f32 {
    1.0
}

impl Default for TagWeights {
    fn default() -> Self {
        Self {
            similar_ticket: default_similar_weight(),
            theme: default_theme_weight(),
            content_rule: default_rule_weight(),
        }
    }
}

/// Tag inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    /// Cap on suggestions per ticket
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Neighbors consulted for the similar-ticket vote
    #[serde(default = "default_neighbor_k")]
    pub neighbor_k: usize,

    /// A label needs at least this many neighbors carrying it
    #[serde(default = "default_min_votes")]
    pub min_votes: usize,

    #[serde(default)]
    pub weights: TagWeights,

    /// Suggestions below this combined confidence are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Variant -> canonical label, applied after case/separator folding
    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,

    /// Cap on component suggestions per ticket (0 disables them)
    #[serde(default = "default_max_components")]
    pub max_components: usize,
}

fn default_max_components() -> usize {
    2
}

fn default_max_suggestions() -> usize {
    5
}

fn default_neighbor_k() -> usize {
    5
}

fn default_min_votes() -> usize {
    2
}

fn default_min_confidence() -> f32 {
    0.2
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
            neighbor_k: default_neighbor_k(),
            min_votes: default_min_votes(),
            weights: TagWeights::default(),
            min_confidence: default_min_confidence(),
            synonyms: BTreeMap::new(),
            max_components: default_max_components(),
        }
    }
}

impl TagConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_suggestions == 0 {
            return Err("max_suggestions must be >= 1".to_string());
        }
        if self.neighbor_k == 0 || self.neighbor_k > MAX_K {
            return Err(format!(
                "neighbor_k must be 1-{MAX_K}, got {}",
                self.neighbor_k
            ));
        }
        if self.min_votes == 0 {
            return Err("min_votes must be >= 1".to_string());
        }
        for (name, w) in [
            ("similar_ticket", self.weights.similar_ticket),
            ("theme", self.weights.theme),
            ("content_rule", self.weights.content_rule),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(format!("weights.{name} must be 0.0-1.0, got {w}"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(format!(
                "min_confidence must be 0.0-1.0, got {}",
                self.min_confidence
            ));
        }
        Ok(())
    }
}

/// A deterministic keyword/pattern rule that proposes one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRule {
    /// Project the rule applies to; `None` applies it to every project
    #[serde(default)]
    pub project: Option<String>,
    pub label: String,
    /// Case-insensitive regular expressions matched against ticket text
    pub patterns: Vec<String>,
    pub confidence: f32,
}

impl ContentRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err("rule label must not be empty".to_string());
        }
        if self.patterns.is_empty() {
            return Err(format!("rule {:?} has no patterns", self.label));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "rule {:?} confidence must be 0.0-1.0, got {}",
                self.label, self.confidence
            ));
        }
        Ok(())
    }
}

/// Batch pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Texts per `embed_batch` call
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Embedding chunks in flight at once
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,

    /// Retries for transient failures (0 = single attempt)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_embed_batch_size() -> usize {
    16
}

fn default_embed_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2000
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: default_embed_batch_size(),
            embed_concurrency: default_embed_concurrency(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.embed_batch_size == 0 {
            return Err("embed_batch_size must be >= 1".to_string());
        }
        if self.embed_concurrency == 0 {
            return Err("embed_concurrency must be >= 1".to_string());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "initial_backoff_ms ({}) must not exceed max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        Ok(())
    }
}

/// Everything an organizer needs to know, fixed for its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizerConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub themes: ThemeConfig,
    #[serde(default)]
    pub tags: TagConfig,
    /// Content rules, global and per project
    #[serde(default)]
    pub rules: Vec<ContentRule>,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl OrganizerConfig {
    /// Validate every section, naming the offending one.
    pub fn validate(&self) -> Result<(), String> {
        self.model.validate().map_err(|e| format!("model: {e}"))?;
        self.similarity
            .validate()
            .map_err(|e| format!("similarity: {e}"))?;
        self.themes.validate().map_err(|e| format!("themes: {e}"))?;
        self.tags.validate().map_err(|e| format!("tags: {e}"))?;
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate().map_err(|e| format!("rules[{i}]: {e}"))?;
        }
        self.batch.validate().map_err(|e| format!("batch: {e}"))?;
        Ok(())
    }

    /// Rules that apply to a project, in configuration order.
    pub fn rules_for<'a>(
        &'a self,
        project_key: &'a str,
    ) -> impl Iterator<Item = &'a ContentRule> {
        self.rules
            .iter()
            .filter(move |r| r.project.as_deref().map_or(true, |p| p == project_key))
    }
}

/// Process settings for the `backlog-triage` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub organizer: OrganizerConfig,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "backlog-triage")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            organizer: OrganizerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/backlog-triage/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TRIAGE_DB_PATH, TRIAGE_ORGANIZER__SIMILARITY__K, ...)
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TriageError> {
        let config_dir = ProjectDirs::from("", "", "backlog-triage")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| TriageError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TriageError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Nested keys use a double underscore so field names keep theirs
        builder = builder.add_source(
            Environment::with_prefix("TRIAGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        settings.organizer.validate().map_err(TriageError::Config)?;
        Ok(settings)
    }

    /// Expand a leading `~/` in db_path.
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(base) = directories::BaseDirs::new() {
                return base.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrganizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.similarity.k, 5);
        assert!((config.themes.join_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.tags.max_suggestions, 5);
        assert_eq!(config.tags.max_components, 2);
    }

    #[test]
    fn test_validation_names_section() {
        let mut config = OrganizerConfig::default();
        config.similarity.k = 0;
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("similarity:"), "{err}");

        let mut config = OrganizerConfig::default();
        config.themes.noise_threshold = 0.9;
        assert!(config.validate().unwrap_err().starts_with("themes:"));

        let mut config = OrganizerConfig::default();
        config.batch.initial_backoff_ms = 5000;
        assert!(config.validate().unwrap_err().starts_with("batch:"));
    }

    #[test]
    fn test_rule_validation() {
        let mut config = OrganizerConfig::default();
        config.rules.push(ContentRule {
            project: Some("PAY".to_string()),
            label: "crash".to_string(),
            patterns: vec![],
            confidence: 0.9,
        });
        assert!(config.validate().unwrap_err().starts_with("rules[0]:"));
    }

    #[test]
    fn test_rules_for_filters_by_project() {
        let rule = |project: Option<&str>, label: &str| ContentRule {
            project: project.map(str::to_string),
            label: label.to_string(),
            patterns: vec![label.to_string()],
            confidence: 0.7,
        };
        let mut config = OrganizerConfig::default();
        config.rules = vec![
            rule(None, "crash"),
            rule(Some("PAY"), "payments"),
            rule(Some("WEB"), "ui"),
        ];

        let labels: Vec<_> = config.rules_for("PAY").map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["crash", "payments"]);
        let labels: Vec<_> = config.rules_for("OPS").map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["crash"]);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: OrganizerConfig =
            serde_json::from_str(r#"{"similarity": {"k": 3}, "themes": {"join_threshold": 0.7}}"#)
                .unwrap();
        assert_eq!(config.similarity.k, 3);
        assert!((config.similarity.min_score - 0.5).abs() < f32::EPSILON);
        assert!((config.themes.join_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.batch, BatchConfig::default());
    }

    #[test]
    fn test_load_from_cli_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
db_path = "/tmp/triage-test-db"
log_level = "debug"

[organizer.similarity]
k = 7

[[organizer.rules]]
project = "PAY"
label = "payments"
patterns = ["payment", "checkout"]
confidence = 0.6
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(settings.db_path, "/tmp/triage-test-db");
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.organizer.similarity.k, 7);
        assert_eq!(settings.organizer.rules[0].project.as_deref(), Some("PAY"));
        assert_eq!(settings.organizer.rules[0].patterns.len(), 2);
    }

    #[test]
    fn test_expanded_db_path_passthrough() {
        let settings = Settings {
            db_path: "/var/lib/triage".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.expanded_db_path(), PathBuf::from("/var/lib/triage"));
    }
}
