//! Settings file – reads/writes `~/.remote-robot/config.toml`.
//!
//! `remote-robot config-init` writes the file; every other command only reads
//! it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use remote_robot_types::{DEFAULT_JETBOT_PORT, DEFAULT_SO101_PORT, JetbotConfig, So101Config};

/// Persisted CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interface the servers listen on.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Host of the robot server the demos connect to. Unset means the demos
    /// drive a local robot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_host: Option<String>,

    #[serde(default = "default_jetbot_port")]
    pub jetbot_port: u16,

    #[serde(default = "default_so101_port")]
    pub so101_port: u16,

    /// Force simulated hardware for every robot.
    #[serde(default)]
    pub mock: bool,

    #[serde(default)]
    pub jetbot: JetbotConfig,

    #[serde(default)]
    pub so101: So101Config,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}
fn default_jetbot_port() -> u16 {
    DEFAULT_JETBOT_PORT
}
fn default_so101_port() -> u16 {
    DEFAULT_SO101_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            remote_host: None,
            jetbot_port: default_jetbot_port(),
            so101_port: default_so101_port(),
            mock: false,
            jetbot: JetbotConfig::default(),
            so101: So101Config::default(),
        }
    }
}

/// Return the path to `~/.remote-robot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".remote-robot").join("config.toml")
}

/// Load the file at `path` (or the default path), fall back to defaults
/// when it does not exist, then apply environment overrides.
pub fn resolve(path: Option<&Path>) -> Result<Config, String> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let mut cfg = load_from(&path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply `REMOTE_ROBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `REMOTE_ROBOT_HOST` | `remote_host` |
/// | `REMOTE_ROBOT_JETBOT_PORT` | `jetbot_port` |
/// | `REMOTE_ROBOT_SO101_PORT` | `so101_port` |
/// | `REMOTE_ROBOT_MOCK` | `mock` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("REMOTE_ROBOT_HOST")
        && !v.trim().is_empty()
    {
        cfg.remote_host = Some(v.trim().to_string());
    }
    if let Ok(v) = std::env::var("REMOTE_ROBOT_JETBOT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.jetbot_port = port;
    }
    if let Ok(v) = std::env::var("REMOTE_ROBOT_SO101_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.so101_port = port;
    }
    if let Ok(v) = std::env::var("REMOTE_ROBOT_MOCK")
        && let Some(mock) = parse_flag(&v)
    {
        cfg.mock = mock;
    }
}

/// Create `dir` (and parents) readable by the owner only.
fn ensure_private_dir(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| format!("Failed to restrict {}: {}", dir.display(), e))?;
    }
    Ok(())
}

/// Write `cfg` to `path` as TOML, mode `0600` on Unix.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_private_dir(parent)?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let write = |mut file: fs::File| {
        use std::io::Write;
        file.write_all(raw.as_bytes())?;
        // An existing file keeps its old mode through `open`.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        Ok::<(), std::io::Error>(())
    };
    options
        .open(path)
        .and_then(write)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

/// `config-init`: write the effective settings to `path` (or the default
/// path) so they can be edited. An existing file is kept unless `force`.
pub fn init(cfg: &Config, path: Option<&Path>, force: bool) -> Result<PathBuf, String> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if path.exists() && !force {
        return Err(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        ));
    }
    save_to(cfg, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_robot_types::CameraConfig;

    #[test]
    fn defaults_use_well_known_ports() {
        let cfg = Config::default();
        assert_eq!(cfg.jetbot_port, 18861);
        assert_eq!(cfg.so101_port, 18862);
        assert_eq!(cfg.listen_host, "0.0.0.0");
        assert!(cfg.remote_host.is_none());
        assert!(!cfg.mock);
    }

    #[test]
    fn config_path_points_to_remote_robot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.remote-robot/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn roundtrip_with_robot_sections() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.remote_host = Some("192.168.1.42".to_string());
        cfg.jetbot = JetbotConfig::mock().with_camera("front", CameraConfig::new(320, 240));
        cfg.so101.port = "/dev/ttyACM0".to_string();
        cfg.so101.max_relative_target = Some(15.0);
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("partial.toml");
        fs::write(&path, "so101_port = 19000\n\n[so101]\nmock = true\n").expect("write");
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.so101_port, 19000);
        assert_eq!(cfg.jetbot_port, 18861);
        assert!(cfg.so101.mock);
        assert_eq!(cfg.so101.port, "/dev/ttyUSB0");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "jetbot_port = \"lots\"").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.so101_port = 19500;
        let written = init(&cfg, Some(&path), false).expect("first init");
        assert_eq!(written, path);
        assert_eq!(load_from(&path).expect("load").expect("some").so101_port, 19500);

        let err = init(&Config::default(), Some(&path), false).unwrap_err();
        assert!(err.contains("--force"));
        assert_eq!(load_from(&path).expect("load").expect("some").so101_port, 19500);

        init(&Config::default(), Some(&path), true).expect("forced init");
        assert_eq!(load_from(&path).expect("load").expect("some").so101_port, 18862);
    }

    #[cfg(unix)]
    #[test]
    fn save_tightens_an_existing_loose_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        save_to(&Config::default(), &path).expect("save");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn parse_flag_accepts_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    // All environment mutation lives in one test so parallel tests never
    // observe each other's variables.
    #[test]
    fn apply_env_overrides_reads_remote_robot_vars() {
        // SAFETY: the only test touching these variables.
        unsafe {
            std::env::set_var("REMOTE_ROBOT_HOST", "robot-host.local");
            std::env::set_var("REMOTE_ROBOT_JETBOT_PORT", "9999");
            std::env::set_var("REMOTE_ROBOT_SO101_PORT", "not-a-port");
            std::env::set_var("REMOTE_ROBOT_MOCK", "yes");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("REMOTE_ROBOT_HOST");
            std::env::remove_var("REMOTE_ROBOT_JETBOT_PORT");
            std::env::remove_var("REMOTE_ROBOT_SO101_PORT");
            std::env::remove_var("REMOTE_ROBOT_MOCK");
        }
        assert_eq!(cfg.remote_host.as_deref(), Some("robot-host.local"));
        assert_eq!(cfg.jetbot_port, 9999);
        assert_eq!(cfg.so101_port, 18862);
        assert!(cfg.mock);
    }
}
