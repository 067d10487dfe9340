//! Layered configuration.
//!
//! Values are resolved, lowest precedence first, from:
//!
//! 1. Built-in defaults.
//! 2. `config.toml`, `config.yaml` or `config.json` in the user's config
//!    directory, when present.
//! 3. An explicitly given file, which must exist.
//! 4. `SLIDECAP_*` environment variables, nested with `__`
//!    (`SLIDECAP_TRAVERSAL__STEP_CEILING=50`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use slidecap_jobs::JobOptions;
use slidecap_render::ChromeOptions;
use slidecap_traverse::TraversalOptions;
use slidecap_traverse::capture::StyleConfig;
use slidecap_traverse::page::Viewport;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SLIDECAP_";
/// Upper bound on every configured delay and timeout: one day.
const MAX_WAIT_MS: u64 = 86_400_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub traversal: TraversalConfig,
    pub styles: StylesConfig,
    pub jobs: JobsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chrome or Chromium binary. Searched for on `PATH` when unset.
    pub executable: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub sandbox: bool,
    pub launch_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub args: Vec<String>,
}
impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            width: 1280,
            height: 720,
            sandbox: false,
            launch_timeout_secs: 30,
            request_timeout_secs: 120,
            args: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub step_ceiling: u64,
    pub settle_ms: u64,
    pub replay_settle_ms: u64,
    pub load_timeout_secs: u64,
    pub ready_timeout_ms: u64,
    /// Time without a new resource fetch after which the network is idle.
    pub network_quiet_ms: u64,
    pub capture_timeout_secs: u64,
    pub poll_interval_ms: u64,
}
impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            step_ceiling: 200,
            settle_ms: 1000,
            replay_settle_ms: 150,
            load_timeout_secs: 120,
            ready_timeout_ms: 10_000,
            network_quiet_ms: 500,
            capture_timeout_secs: 30,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Hide navigation controls, progress bars and the like.
    pub suppress_chrome: bool,
    /// Extra stylesheets, injected in order after the builtin.
    pub files: Vec<PathBuf>,
    /// Raw CSS, injected last.
    pub inline: Vec<String>,
}
impl Default for StylesConfig {
    fn default() -> Self {
        Self { suppress_chrome: true, files: Vec::new(), inline: Vec::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub batch_size: u64,
    pub ttl_secs: u64,
    pub evict_every_secs: u64,
}
impl Default for JobsConfig {
    fn default() -> Self {
        Self { batch_size: 25, ttl_secs: 3600, evict_every_secs: 60 }
    }
}

impl Config {
    /// Load and validate the configuration, optionally layering `explicit` on
    /// top of the user's config directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "slidecap");
        let config = Self::from_figment(figment(dirs.as_ref().map(ProjectDirs::config_dir), explicit)?)?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("browser.width", u64::from(self.browser.width)),
            ("browser.height", u64::from(self.browser.height)),
            ("browser.launch_timeout_secs", self.browser.launch_timeout_secs),
            ("traversal.step_ceiling", self.traversal.step_ceiling),
            ("traversal.load_timeout_secs", self.traversal.load_timeout_secs),
            ("traversal.capture_timeout_secs", self.traversal.capture_timeout_secs),
            ("traversal.poll_interval_ms", self.traversal.poll_interval_ms),
            ("jobs.batch_size", self.jobs.batch_size),
            ("jobs.evict_every_secs", self.jobs.evict_every_secs),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);
        if let Some((key, _)) = zero {
            exn::bail!(ErrorKind::Invalid(format!("{key} must be greater than zero")));
        }

        let browser = &self.browser;
        let traversal = &self.traversal;
        let jobs = &self.jobs;
        let too_long = [
            ("browser.launch_timeout_secs", browser.launch_timeout_secs.saturating_mul(1000)),
            ("browser.request_timeout_secs", browser.request_timeout_secs.saturating_mul(1000)),
            ("traversal.settle_ms", traversal.settle_ms),
            ("traversal.replay_settle_ms", traversal.replay_settle_ms),
            ("traversal.load_timeout_secs", traversal.load_timeout_secs.saturating_mul(1000)),
            ("traversal.ready_timeout_ms", traversal.ready_timeout_ms),
            ("traversal.network_quiet_ms", traversal.network_quiet_ms),
            ("traversal.capture_timeout_secs", traversal.capture_timeout_secs.saturating_mul(1000)),
            ("traversal.poll_interval_ms", traversal.poll_interval_ms),
            ("jobs.evict_every_secs", jobs.evict_every_secs.saturating_mul(1000)),
        ]
        .into_iter()
        .find(|(_, ms)| *ms > MAX_WAIT_MS);
        if let Some((key, _)) = too_long {
            exn::bail!(ErrorKind::Invalid(format!("{key} must not exceed one day")));
        }
        Ok(())
    }

    pub fn executable(&self) -> Option<&Path> {
        self.browser.executable.as_deref()
    }

    pub fn chrome_options(&self) -> ChromeOptions {
        let browser = &self.browser;
        ChromeOptions {
            viewport: Viewport::new(browser.width, browser.height),
            sandbox: browser.sandbox,
            launch_timeout: Duration::from_secs(browser.launch_timeout_secs),
            request_timeout: Duration::from_secs(browser.request_timeout_secs),
            args: browser.args.clone(),
        }
    }

    /// Traversal options, with every configured stylesheet read in.
    pub fn traversal_options(&self) -> Result<TraversalOptions> {
        let traversal = &self.traversal;
        let mut styles =
            if self.styles.suppress_chrome { StyleConfig::suppressing_chrome() } else { StyleConfig::new() };
        for file in &self.styles.files {
            styles = styles.with_file(file).or_raise(|| ErrorKind::Style)?;
        }
        for css in &self.styles.inline {
            styles = styles.with_content(css.clone());
        }
        Ok(TraversalOptions {
            step_ceiling: traversal.step_ceiling,
            settle: Duration::from_millis(traversal.settle_ms),
            replay_settle: Duration::from_millis(traversal.replay_settle_ms),
            load_timeout: Duration::from_secs(traversal.load_timeout_secs),
            ready_timeout: Duration::from_millis(traversal.ready_timeout_ms),
            network_quiet: Duration::from_millis(traversal.network_quiet_ms),
            capture_timeout: Duration::from_secs(traversal.capture_timeout_secs),
            poll_interval: Duration::from_millis(traversal.poll_interval_ms),
            styles,
        })
    }

    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            batch_size: self.jobs.batch_size,
            ttl: Duration::from_secs(self.jobs.ttl_secs),
            evict_every: Duration::from_secs(self.jobs.evict_every_secs),
        }
    }
}

fn figment(config_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
    Ok(files(config_dir, explicit)?.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Defaults and configuration files, without the environment.
fn files(config_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(dir) = config_dir {
        figment = figment
            .merge(Toml::file(dir.join("config.toml")))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Json::file(dir.join("config.json")));
    }
    if let Some(path) = explicit {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.display().to_string()));
        }
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default().to_ascii_lowercase();
        figment = match extension.as_str() {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::Unsupported(path.display().to_string())),
        };
    }
    Ok(figment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::from_figment(files(None, None).unwrap()).unwrap();
        assert_eq!(config, Config::default());
        let options = config.traversal_options().unwrap();
        assert_eq!(options.step_ceiling, 200);
        assert_eq!(options.ready_timeout, Duration::from_secs(10));
        assert!(!options.styles.is_empty());
        assert_eq!(config.chrome_options().viewport, Viewport::new(1280, 720));
        assert_eq!(config.job_options(), JobOptions::default());
    }

    #[rstest]
    #[case::toml("config.toml", "[traversal]\nstep_ceiling = 50\n[jobs]\nbatch_size = 5\n")]
    #[case::yaml("config.yaml", "traversal:\n  step_ceiling: 50\njobs:\n  batch_size: 5\n")]
    #[case::yml("config.yml", "traversal:\n  step_ceiling: 50\njobs:\n  batch_size: 5\n")]
    #[case::json("config.json", r#"{"traversal": {"step_ceiling": 50}, "jobs": {"batch_size": 5}}"#)]
    fn explicit_file_overrides_defaults(#[case] name: &str, #[case] content: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, name, content);
        let config = Config::from_figment(files(None, Some(&path)).unwrap()).unwrap();
        assert_eq!(config.traversal.step_ceiling, 50);
        assert_eq!(config.traversal.settle_ms, 1000);
        assert_eq!(config.jobs.batch_size, 5);
    }

    #[test]
    fn explicit_file_overrides_config_dir() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.toml", "[browser]\nwidth = 800\nheight = 600\n");
        let explicit = write(&dir, "override.toml", "[browser]\nwidth = 1024\n");
        let config = Config::from_figment(files(Some(dir.path()), Some(&explicit)).unwrap()).unwrap();
        assert_eq!((config.browser.width, config.browser.height), (1024, 600));
    }

    #[test]
    fn missing_explicit_file() {
        let err = files(None, Some(Path::new("/nonexistent/slidecap.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.ini", "step_ceiling=5");
        let err = files(None, Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported(_)));
    }

    #[test]
    fn malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", "[traversal]\nstep_ceiling = \"lots\"\n");
        let err = Config::from_figment(files(None, Some(&path)).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[rstest]
    #[case::width("[browser]\nwidth = 0\n", "browser.width")]
    #[case::ceiling("[traversal]\nstep_ceiling = 0\n", "traversal.step_ceiling")]
    #[case::batch("[jobs]\nbatch_size = 0\n", "jobs.batch_size")]
    fn zero_values_are_rejected(#[case] content: &str, #[case] key: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", content);
        let err = Config::from_figment(files(None, Some(&path)).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(message) if message.starts_with(key)));
    }

    #[rstest]
    #[case::settle("[traversal]\nsettle_ms = 9000000000000\n", "traversal.settle_ms")]
    #[case::load("[traversal]\nload_timeout_secs = 90000\n", "traversal.load_timeout_secs")]
    #[case::evict("[jobs]\nevict_every_secs = 9000000000000000\n", "jobs.evict_every_secs")]
    fn unbounded_waits_are_rejected(#[case] content: &str, #[case] key: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", content);
        let err = Config::from_figment(files(None, Some(&path)).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(message) if message.starts_with(key)));
    }

    #[test]
    fn job_and_network_settings_are_applied() {
        let dir = TempDir::new().unwrap();
        let content = "[traversal]\nnetwork_quiet_ms = 250\n[jobs]\nttl_secs = 600\nevict_every_secs = 15\n";
        let path = write(&dir, "config.toml", content);
        let config = Config::from_figment(files(None, Some(&path)).unwrap()).unwrap();
        let jobs = config.job_options();
        assert_eq!(jobs.ttl, Duration::from_secs(600));
        assert_eq!(jobs.evict_every, Duration::from_secs(15));
        assert_eq!(config.traversal_options().unwrap().network_quiet, Duration::from_millis(250));
    }

    #[test]
    fn environment_wins() {
        Jail::expect_with(|jail| {
            jail.create_file("slidecap.toml", "[traversal]\nstep_ceiling = 50\n")?;
            jail.set_env("SLIDECAP_TRAVERSAL__STEP_CEILING", "75");
            jail.set_env("SLIDECAP_BROWSER__SANDBOX", "true");
            let config = Config::from_figment(figment(None, Some(Path::new("slidecap.toml"))).unwrap()).unwrap();
            assert_eq!(config.traversal.step_ceiling, 75);
            assert!(config.browser.sandbox);
            Ok(())
        });
    }

    #[test]
    fn stylesheets_are_read_eagerly() {
        let dir = TempDir::new().unwrap();
        let css = write(&dir, "extra.css", "body { background: white; }");
        let mut config = Config::default();
        config.styles.suppress_chrome = false;
        assert!(config.traversal_options().unwrap().styles.is_empty());

        config.styles.files.push(css);
        assert!(!config.traversal_options().unwrap().styles.is_empty());

        config.styles.files.push(dir.path().join("missing.css"));
        let err = config.traversal_options().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Style));
    }
}
