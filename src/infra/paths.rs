// src/infra/paths.rs — Default locations for the store, site and source texts
//
// All paths respect the PSALM_PAIRS_HOME environment variable. When it is
// unset, everything lives under the platform data dir (XDG_DATA_HOME/psalm-pairs
// on Linux), or the working directory when no home directory can be found.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<Option<ProjectDirs>> = OnceLock::new();

fn project_dirs() -> Option<&'static ProjectDirs> {
    PROJECT_DIRS
        .get_or_init(|| ProjectDirs::from("", "", "psalm-pairs"))
        .as_ref()
}

fn home_override() -> Option<PathBuf> {
    std::env::var_os("PSALM_PAIRS_HOME").map(PathBuf::from)
}

/// Root directory: $PSALM_PAIRS_HOME or the platform data dir.
pub fn base_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home;
    }
    project_dirs()
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn data_dir() -> PathBuf {
    base_dir().join("data")
}

/// SQLite store path
pub fn db_path() -> PathBuf {
    data_dir().join("psalm_pairs.sqlite3")
}

/// Rendered site output
pub fn site_dir() -> PathBuf {
    base_dir().join("site")
}

/// One `psalm_NNN.json` per psalm
pub fn psalms_dir() -> PathBuf {
    base_dir().join("psalms_json")
}

pub fn config_file_path() -> PathBuf {
    base_dir().join("config.toml")
}

/// Fallback credential file when OPENAI_API_KEY is unset.
pub fn openai_key_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".openai.key"))
        .unwrap_or_else(|| PathBuf::from(".openai.key"))
}
