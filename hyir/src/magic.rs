/// Name of the environment variable containing the path to the hyir configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/hyir/config.toml` or `$HOME/.config/hyir/config.toml`
///  (2) on Windows: `%APPDATA%\hyir\config.toml`
pub const ENV_CONFIG_PATH: &str = "HYIR_CONFIG_PATH";

/// Directory name used under the platform configuration root.
pub const CONFIG_DIR_NAME: &str = "hyir";

/// File name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// First identifier handed out by a fresh [`Context`](crate::context::Context).
pub const FIRST_MD_KIND_ID: u32 = 0;
