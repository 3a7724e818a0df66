// Location: src/backend/fetch.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::{Api, ApiBuilder, ApiError};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable holding an optional Hugging Face access token.
///
/// Gated repositories need it; public ones work without. The token is read
/// only here, never logged, and never stored.
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Errors raised while resolving model files.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The hub client failed to download or look up a file.
    #[error("hub api error: {0}")]
    Hub(#[from] ApiError),

    /// A local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A required checkpoint file is absent from a local model directory.
    #[error("missing {kind} at {path}")]
    MissingFile {
        /// Which artifact is missing.
        kind: &'static str,
        /// Where it was expected.
        path: PathBuf,
    },

    /// The safetensors index exists but cannot be interpreted.
    #[error("invalid checkpoint index {path}: {reason}")]
    Index {
        /// Offending index file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// No weight files could be located at all.
    #[error("no weight files found for {model}")]
    MissingWeights {
        /// Model identifier being resolved.
        model: String,
    },
}

/// Resolved checkpoint file set for one model identifier.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    /// Path to `config.json`.
    pub config: PathBuf,
    /// Path to `tokenizer.json`.
    pub tokenizer: PathBuf,
    /// Safetensors shards, in index order.
    pub weights: Vec<PathBuf>,
}

/// Resolve `model` to concrete files.
///
/// A local directory wins; anything else is treated as a hub repo id and
/// fetched through the shared cache, so repeated runs do not re-download.
pub fn resolve_artifacts(model: &str) -> Result<ModelArtifacts, FetchError> {
    let local = Path::new(model);
    if local.is_dir() {
        debug!(model = %model, "resolving artifacts from local directory");
        resolve_local(local, model)
    } else {
        info!(model = %model, "resolving artifacts from the hub");
        resolve_hub(model)
    }
}

fn resolve_local(dir: &Path, model: &str) -> Result<ModelArtifacts, FetchError> {
    let config = require_file(dir.join(CONFIG_FILE), "model config")?;
    let tokenizer = require_file(dir.join(TOKENIZER_FILE), "tokenizer")?;

    let index_path = dir.join(WEIGHTS_INDEX_FILE);
    let weights = if index_path.is_file() {
        read_index(&index_path)?
            .into_iter()
            .map(|shard| require_file(dir.join(shard), "weight shard"))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        let single = dir.join(WEIGHTS_FILE);
        if single.is_file() {
            vec![single]
        } else {
            scan_safetensors(dir)?
        }
    };

    if weights.is_empty() {
        return Err(FetchError::MissingWeights {
            model: model.to_string(),
        });
    }

    Ok(ModelArtifacts {
        config,
        tokenizer,
        weights,
    })
}

fn resolve_hub(model: &str) -> Result<ModelArtifacts, FetchError> {
    let api = hub_api()?;
    let repo = api.model(model.to_string());

    let config = repo.get(CONFIG_FILE)?;
    let tokenizer = repo.get(TOKENIZER_FILE)?;

    // Sharded checkpoints publish an index; single-file ones do not.
    let weights = match repo.get(WEIGHTS_INDEX_FILE) {
        Ok(index_path) => {
            let shards = read_index(&index_path)?;
            debug!(model = %model, shards = shards.len(), "downloading sharded checkpoint");
            shards
                .into_iter()
                .map(|shard| repo.get(&shard))
                .collect::<Result<Vec<_>, _>>()?
        }
        Err(_) => vec![repo.get(WEIGHTS_FILE)?],
    };

    Ok(ModelArtifacts {
        config,
        tokenizer,
        weights,
    })
}

fn hub_api() -> Result<Api, FetchError> {
    let api = match std::env::var(HF_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            debug!("using hub token from {}", HF_TOKEN_ENV);
            ApiBuilder::new().with_token(Some(token)).build()?
        }
        _ => Api::new()?,
    };
    Ok(api)
}

/// Parse a safetensors index and return its shard file names, deduplicated
/// and in lexical order.
fn read_index(path: &Path) -> Result<Vec<String>, FetchError> {
    let raw = std::fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let index: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|e| FetchError::Index {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let weight_map = index
        .get("weight_map")
        .and_then(|v| v.as_object())
        .ok_or_else(|| FetchError::Index {
            path: path.to_path_buf(),
            reason: "no weight_map object".to_string(),
        })?;

    let shards: BTreeSet<String> = weight_map
        .values()
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect();

    if shards.is_empty() {
        return Err(FetchError::Index {
            path: path.to_path_buf(),
            reason: "weight_map names no files".to_string(),
        });
    }

    Ok(shards.into_iter().collect())
}

fn scan_safetensors(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let entries = std::fs::read_dir(dir).map_err(|source| FetchError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "safetensors").unwrap_or(false))
        .collect();
    found.sort();
    Ok(found)
}

fn require_file(path: PathBuf, kind: &'static str) -> Result<PathBuf, FetchError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(FetchError::MissingFile { kind, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_local_single_file_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "{}");
        write(dir.path(), TOKENIZER_FILE, "{}");
        write(dir.path(), WEIGHTS_FILE, "");

        let artifacts = resolve_artifacts(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(artifacts.weights, vec![dir.path().join(WEIGHTS_FILE)]);
    }

    #[test]
    fn test_local_sharded_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "{}");
        write(dir.path(), TOKENIZER_FILE, "{}");
        write(
            dir.path(),
            WEIGHTS_INDEX_FILE,
            r#"{"weight_map": {
                "a.weight": "model-00002-of-00002.safetensors",
                "b.weight": "model-00001-of-00002.safetensors",
                "c.weight": "model-00001-of-00002.safetensors"
            }}"#,
        );
        write(dir.path(), "model-00001-of-00002.safetensors", "");
        write(dir.path(), "model-00002-of-00002.safetensors", "");

        let artifacts = resolve_artifacts(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<_> = artifacts
            .weights
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        // Deduplicated and ordered.
        assert_eq!(
            names,
            vec![
                "model-00001-of-00002.safetensors",
                "model-00002-of-00002.safetensors"
            ]
        );
    }

    #[test]
    fn test_local_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), TOKENIZER_FILE, "{}");
        write(dir.path(), WEIGHTS_FILE, "");

        let error = resolve_artifacts(dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(
            error,
            FetchError::MissingFile {
                kind: "model config",
                ..
            }
        ));
    }

    #[test]
    fn test_local_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "{}");
        write(dir.path(), TOKENIZER_FILE, "{}");

        let error = resolve_artifacts(dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(error, FetchError::MissingWeights { .. }));
    }

    #[test]
    fn test_index_without_weight_map() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join(WEIGHTS_INDEX_FILE);
        fs::write(&index, r#"{"metadata": {}}"#).unwrap();

        let error = read_index(&index).unwrap_err();
        assert!(matches!(error, FetchError::Index { .. }));
    }

    #[test]
    fn test_scan_fallback_orders_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "{}");
        write(dir.path(), TOKENIZER_FILE, "{}");
        write(dir.path(), "part-b.safetensors", "");
        write(dir.path(), "part-a.safetensors", "");
        write(dir.path(), "notes.txt", "");

        let artifacts = resolve_artifacts(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<_> = artifacts
            .weights
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["part-a.safetensors", "part-b.safetensors"]);
    }
}
