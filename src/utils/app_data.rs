use crate::index::types::{IndexConfig, IndexMeta};
use crate::indexer::DEFAULT_MAX_FILE_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const APP_NAME: &str = "symdex";
const CONFIG_FILE: &str = "config.json";
const META_FILE: &str = "meta.json";
const INDEX_FILE: &str = "symbols.index";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Settings applied to every opened index
    #[serde(default)]
    pub index: IndexConfig,

    /// Directory names skipped while walking a codebase, on top of .gitignore
    #[serde(default = "default_ignored_paths")]
    pub ignored_paths: Vec<String>,

    /// Files larger than this many bytes are not indexed
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_ignored_paths() -> Vec<String> {
    [".git", "node_modules", "target", "__pycache__", ".venv", "venv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            ignored_paths: default_ignored_paths(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(config_path)
            .with_context(|| {
                format!("Failed to read config file {}", config_path.display())
            })?;
        serde_json::from_str(&content)
            .with_context(|| {
                format!("Failed to parse config file {}", config_path.display())
            })
    }

    /// Save config to the app data directory
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.ignored_paths.iter().any(|p| p == file_name)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory for storing indexes
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Get the index directory for a specific codebase root
pub fn get_index_dir(root_path: &Path) -> Result<PathBuf> {
    let indexes_dir = get_app_data_dir()?.join("indexes");
    fs::create_dir_all(&indexes_dir)?;
    Ok(indexes_dir.join(hash_path(root_path)))
}

/// Location of the index file for a codebase root
pub fn index_file_path(root_path: &Path) -> Result<PathBuf> {
    Ok(get_index_dir(root_path)?.join(INDEX_FILE))
}

/// Hash a path to create a unique folder name
/// Format: first 16 chars of dir name + hash
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    let dir_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let sanitized: String = dir_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();

    let mut hasher = DefaultHasher::new();
    path_str.hash(&mut hasher);
    format!("{}-{:016x}", sanitized, hasher.finish())
}

/// Find the root of a codebase starting from a given path
/// Walks up the directory tree looking for:
/// 1. A .git directory (git repo root)
/// 2. A previously indexed root (stored in our app data)
pub fn find_codebase_root(start_path: &Path) -> Result<PathBuf> {
    let start = start_path
        .canonicalize()
        .with_context(|| format!("Invalid path {}", start_path.display()))?;

    if let Some(git_root) = start.ancestors().find(|dir| dir.join(".git").exists()) {
        return Ok(git_root.to_path_buf());
    }

    for dir in start.ancestors() {
        if is_indexed(dir)? {
            return Ok(dir.to_path_buf());
        }
    }

    Ok(start)
}

/// Check if a path has an existing index
pub fn is_indexed(root_path: &Path) -> Result<bool> {
    Ok(get_index_dir(root_path)?.join(META_FILE).exists())
}

/// Read meta.json beside an index file, if present
pub fn read_meta(index_dir: &Path) -> Result<Option<IndexMeta>> {
    let meta_path = index_dir.join(META_FILE);
    if !meta_path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(&meta_path)
        .with_context(|| format!("Failed to open {}", meta_path.display()))?;
    let meta = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse {}", meta_path.display()))?;
    Ok(Some(meta))
}

/// Write meta.json for a codebase, keeping the original creation time
pub fn write_meta(root_path: &Path, index_file: &Path, doc_count: usize) -> Result<IndexMeta> {
    let index_dir = index_file
        .parent()
        .context("Index file has no parent directory")?;
    let now = unix_now();
    let created_at = read_meta(index_dir)
        .ok()
        .flatten()
        .map_or(now, |meta| meta.created_at);

    let meta = IndexMeta {
        root_path: root_path.to_path_buf(),
        index_file: index_file.to_path_buf(),
        doc_count: doc_count as u32,
        created_at,
        updated_at: now,
        ..IndexMeta::default()
    };
    let content =
        serde_json::to_string_pretty(&meta).context("Failed to serialize meta.json")?;
    fs::write(index_dir.join(META_FILE), content).context("Failed to write meta.json")?;
    Ok(meta)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// List all indexed codebases
pub fn list_indexed_codebases() -> Result<Vec<IndexLocation>> {
    let indexes_dir = get_app_data_dir()?.join("indexes");
    if !indexes_dir.exists() {
        return Ok(Vec::new());
    }

    let mut codebases = Vec::new();
    for entry in fs::read_dir(&indexes_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        // Unreadable metadata just hides that entry
        if let Ok(Some(meta)) = read_meta(&path) {
            codebases.push(IndexLocation {
                root_path: meta.root_path.clone(),
                index_dir: path,
                meta,
            });
        }
    }

    codebases.sort_by(|a, b| a.root_path.cmp(&b.root_path));
    Ok(codebases)
}

/// Information about an indexed codebase
#[derive(Debug, Clone)]
pub struct IndexLocation {
    pub root_path: PathBuf,
    pub index_dir: PathBuf,
    pub meta: IndexMeta,
}
