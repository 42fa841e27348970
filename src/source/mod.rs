//! Spec source abstraction (SPEC_FULL.md §F.1).
//!
//! `spec.md` §6 names "a reference to an OpenAPI 3.x document (local path
//! or URL)" as C2's input without specifying the collaborator shape. Two
//! implementations: a local file (reusing the teacher's `FileSystem`
//! trait for testability) and an HTTP GET via the same client shape used
//! for target calls.

use crate::error::Error;
use crate::fs::FileSystem;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn fetch(&self) -> Result<String, Error>;
}

pub struct FileSpecSource<F: FileSystem + Send + Sync> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem + Send + Sync> FileSpecSource<F> {
    #[must_use]
    pub fn new(fs: F, path: PathBuf) -> Self {
        Self { fs, path }
    }
}

#[async_trait]
impl<F: FileSystem + Send + Sync> SpecSource for FileSpecSource<F> {
    async fn fetch(&self) -> Result<String, Error> {
        Ok(self.fs.read_to_string(&self.path)?)
    }
}

pub struct UrlSpecSource {
    client: reqwest::Client,
    url: String,
}

impl UrlSpecSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl SpecSource for UrlSpecSource {
    async fn fetch(&self) -> Result<String, Error> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::transport_error(e.to_string()))?;
        response.text().await.map_err(|e| Error::transport_error(e.to_string()))
    }
}
