//! Local model weights the voice pipeline loads at startup.
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const TURN_DETECTOR_BASE: &str = "https://huggingface.co/livekit/turn-detector/resolve/v0.3.0-intl";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Could not download {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("Could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file to fetch, stored under `file` relative to the cache directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    pub name: String,
    pub url: String,
    pub file: PathBuf,
}

impl ModelAsset {
    pub fn new<N, U, F>(name: N, url: U, file: F) -> Self
    where
        N: Into<String>,
        U: Into<String>,
        F: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            url: url.into(),
            file: file.into(),
        }
    }

    /// Voice activity detection and multilingual turn detection weights
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "silero-vad",
                "https://raw.githubusercontent.com/snakers4/silero-vad/master/src/silero_vad/data/silero_vad.onnx",
                "silero/silero_vad.onnx",
            ),
            Self::new(
                "turn-detector-model",
                format!("{}/onnx/model_q8.onnx", TURN_DETECTOR_BASE),
                "turn-detector/model_q8.onnx",
            ),
            Self::new(
                "turn-detector-tokenizer",
                format!("{}/tokenizer.json", TURN_DETECTOR_BASE),
                "turn-detector/tokenizer.json",
            ),
            Self::new(
                "turn-detector-languages",
                format!("{}/languages.json", TURN_DETECTOR_BASE),
                "turn-detector/languages.json",
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    AlreadyPresent,
}

pub struct AssetDownloader {
    client: Client,
    dir: PathBuf,
}

impl AssetDownloader {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            client: Client::new(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch one asset unless it is already on disk.
    ///
    /// The body is streamed into a `.part` file that is renamed into place once
    /// complete, an interrupted download never looks finished.
    pub async fn fetch(&self, asset: &ModelAsset) -> Result<DownloadOutcome, AssetError> {
        let target = self.dir.join(&asset.file);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!(asset = %asset.name, path = %target.display(), "already present");
            return Ok(DownloadOutcome::AlreadyPresent);
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| AssetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let network = |source| AssetError::Network {
            url: asset.url.clone(),
            source,
        };
        let response = self.client.get(&asset.url).send().await.map_err(network)?;
        if !response.status().is_success() {
            return Err(AssetError::Status {
                url: asset.url.clone(),
                status: response.status(),
            });
        }

        let partial = part_path(&target);
        let io = |source| AssetError::Io {
            path: partial.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&partial).await.map_err(io)?;
        let mut bytes = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(network(e));
                }
            };
            file.write_all(&chunk).await.map_err(io)?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(io)?;
        drop(file);

        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|source| AssetError::Io {
                path: target.clone(),
                source,
            })?;
        info!(asset = %asset.name, bytes, path = %target.display(), "downloaded");
        Ok(DownloadOutcome::Downloaded { bytes })
    }

    /// Fetch every asset in order, stopping at the first failure
    pub async fn fetch_all(
        &self,
        assets: &[ModelAsset],
    ) -> Result<Vec<(String, DownloadOutcome)>, AssetError> {
        let mut outcomes = Vec::with_capacity(assets.len());
        for asset in assets {
            outcomes.push((asset.name.clone(), self.fetch(asset).await?));
        }
        Ok(outcomes)
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
