//! Model asset locations.
//!
//! A deployment root is either an http(s) URL or a local directory. Relative
//! asset paths are resolved against it by a [`PathResolver`], so the same
//! descriptor path works whether the app is served from `/` or a sub-path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agro_core::{Error, Result};
use reqwest::{Client, Url};
use tracing::debug;

/// Absolute location of a model asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocation {
    Url(Url),
    Path(PathBuf),
}

impl ModelLocation {
    /// Parse an absolute location. Anything without an http(s) scheme is a path.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            let url = Url::parse(location)
                .map_err(|e| Error::Config(format!("invalid model URL {location:?}: {e}")))?;
            Ok(ModelLocation::Url(url))
        } else {
            Ok(ModelLocation::Path(PathBuf::from(location)))
        }
    }

    /// Resolve a file that lives next to this one (weight shards next to the descriptor)
    pub fn sibling(&self, name: &str) -> Result<Self> {
        match self {
            ModelLocation::Url(url) => url
                .join(name)
                .map(ModelLocation::Url)
                .map_err(|e| Error::ModelUnavailable(format!("cannot resolve {name:?} next to {url}: {e}"))),
            ModelLocation::Path(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                Ok(ModelLocation::Path(dir.join(name)))
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ModelLocation::Url(_))
    }
}

impl fmt::Display for ModelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLocation::Url(url) => write!(f, "{url}"),
            ModelLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Turns a path relative to the deployment root into an absolute location
pub trait PathResolver: Send + Sync {
    fn resolve(&self, relative: &str) -> Result<ModelLocation>;
}

impl<F> PathResolver for F
where
    F: Fn(&str) -> Result<ModelLocation> + Send + Sync,
{
    fn resolve(&self, relative: &str) -> Result<ModelLocation> {
        self(relative)
    }
}

/// Leading `./` and `/` would escape a sub-path deployment
fn trim_relative(relative: &str) -> &str {
    relative
        .trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
}

/// Resolves against an http(s) base URL
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    base: Url,
}

impl BaseUrlResolver {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base.trim())
            .map_err(|e| Error::Config(format!("invalid base URL {base:?}: {e}")))?;

        // Url::join replaces the last segment unless the path ends in a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl PathResolver for BaseUrlResolver {
    fn resolve(&self, relative: &str) -> Result<ModelLocation> {
        self.base
            .join(trim_relative(relative))
            .map(ModelLocation::Url)
            .map_err(|e| Error::Config(format!("cannot resolve {relative:?} against {}: {e}", self.base)))
    }
}

/// Resolves against a directory on disk
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathResolver for DirectoryResolver {
    fn resolve(&self, relative: &str) -> Result<ModelLocation> {
        Ok(ModelLocation::Path(self.root.join(trim_relative(relative))))
    }
}

/// Pick the resolver matching the shape of the configured base
pub fn resolver_for(base: &str) -> Result<Box<dyn PathResolver>> {
    match ModelLocation::parse(base)? {
        ModelLocation::Url(_) => Ok(Box::new(BaseUrlResolver::new(base)?)),
        ModelLocation::Path(root) => Ok(Box::new(DirectoryResolver::new(root))),
    }
}

/// Read an asset into memory
pub async fn fetch_bytes(client: &Client, location: &ModelLocation) -> Result<Vec<u8>> {
    match location {
        ModelLocation::Url(url) => {
            let response = client
                .get(url.clone())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| Error::ModelUnavailable(format!("failed to fetch {url}: {e}")))?;

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::ModelUnavailable(format!("failed to read {url}: {e}")))?;
            Ok(bytes.to_vec())
        }
        ModelLocation::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| Error::ModelUnavailable(format!("failed to read {}: {e}", path.display()))),
    }
}

/// Lightweight existence check: `HEAD` for URLs, metadata for files.
///
/// Never fails; every error means "not there".
pub async fn exists(client: &Client, location: &ModelLocation, timeout: Duration) -> bool {
    match location {
        ModelLocation::Url(url) => match client.head(url.clone()).timeout(timeout).send().await {
            Ok(response) => {
                debug!("HEAD {} -> {}", url, response.status());
                response.status().is_success()
            }
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        },
        ModelLocation::Path(path) => match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                debug!("{} not readable: {}", path.display(), e);
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let resolver = BaseUrlResolver::new("https://example.org/app").unwrap();
        assert_eq!(resolver.base().as_str(), "https://example.org/app/");

        let location = resolver.resolve("model/model.json").unwrap();
        assert_eq!(location.to_string(), "https://example.org/app/model/model.json");
    }

    #[test]
    fn test_leading_slash_stays_under_sub_path() {
        let resolver = BaseUrlResolver::new("https://example.org/app/").unwrap();
        for relative in ["/model/model.json", "./model/model.json", "model/model.json"] {
            let location = resolver.resolve(relative).unwrap();
            assert_eq!(location.to_string(), "https://example.org/app/model/model.json");
        }
    }

    #[test]
    fn test_root_deployment() {
        let resolver = BaseUrlResolver::new("http://localhost:8080").unwrap();
        let location = resolver.resolve("model/model.json").unwrap();
        assert_eq!(location.to_string(), "http://localhost:8080/model/model.json");
    }

    #[test]
    fn test_directory_resolver() {
        let resolver = DirectoryResolver::new("/srv/agrovision");
        let location = resolver.resolve("/model/model.json").unwrap();
        assert_eq!(location, ModelLocation::Path(PathBuf::from("/srv/agrovision/model/model.json")));
        assert!(!location.is_remote());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |relative: &str| ModelLocation::parse(&format!("https://cdn.example.org/{relative}"));
        let location = resolver.resolve("model.json").unwrap();
        assert!(location.is_remote());
        assert_eq!(location.to_string(), "https://cdn.example.org/model.json");
    }

    #[test]
    fn test_resolver_for_picks_by_scheme() {
        let url = resolver_for("https://example.org/app").unwrap();
        assert!(url.resolve("model/model.json").unwrap().is_remote());

        let dir = resolver_for("./public").unwrap();
        assert_eq!(
            dir.resolve("model/model.json").unwrap(),
            ModelLocation::Path(PathBuf::from("./public/model/model.json"))
        );
    }

    #[test]
    fn test_sibling() {
        let url = ModelLocation::parse("https://example.org/app/model/model.json").unwrap();
        assert_eq!(
            url.sibling("weights.mpk").unwrap().to_string(),
            "https://example.org/app/model/weights.mpk"
        );

        let path = ModelLocation::parse("/srv/model/model.json").unwrap();
        assert_eq!(
            path.sibling("weights.mpk").unwrap(),
            ModelLocation::Path(PathBuf::from("/srv/model/weights.mpk"))
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(ModelLocation::parse("http://"), Err(Error::Config(_))));
        assert!(BaseUrlResolver::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_file_exists_and_fetch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("model.json");
        std::fs::write(&file, b"{}").unwrap();

        let client = Client::new();
        let timeout = Duration::from_secs(1);

        let present = ModelLocation::Path(file);
        assert!(exists(&client, &present, timeout).await);
        assert_eq!(fetch_bytes(&client, &present).await.unwrap(), b"{}");

        let missing = ModelLocation::Path(dir.path().join("missing.json"));
        assert!(!exists(&client, &missing, timeout).await);
        assert!(matches!(
            fetch_bytes(&client, &missing).await,
            Err(Error::ModelUnavailable(_))
        ));

        // A directory is not a model file
        let directory = ModelLocation::Path(dir.path().to_path_buf());
        assert!(!exists(&client, &directory, timeout).await);
    }
}
