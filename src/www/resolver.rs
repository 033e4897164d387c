//! Turning a classified request into a [`ResponseDescriptor`].

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use bytes::BytesMut;
use futures::StreamExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fs::ReactiveFs;
use crate::fs::stream::ByteStream;
use crate::http::mime;
use crate::http::response::ResponseDescriptor;

/// Decides the response for a static asset request.
///
/// `filename` is already joined onto the static root. Implement this to
/// replace the default file lookup.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, filename: PathBuf) -> BoxFuture<'static, Result<ResponseDescriptor>>;
}

impl<F, Fut> AssetResolver for F
where
    F: Fn(PathBuf) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResponseDescriptor>> + Send + 'static,
{
    fn resolve(&self, filename: PathBuf) -> BoxFuture<'static, Result<ResponseDescriptor>> {
        Box::pin(self(filename))
    }
}

/// Default asset lookup: readable file → 200 streamed from disk; a path that
/// names no usable file (missing, unreadable, bad name) → plain-text 404.
#[derive(Debug, Clone)]
pub struct FsAssetResolver {
    fs: ReactiveFs,
}

impl FsAssetResolver {
    pub fn new(fs: ReactiveFs) -> Self {
        Self { fs }
    }
}

impl AssetResolver for FsAssetResolver {
    fn resolve(&self, filename: PathBuf) -> BoxFuture<'static, Result<ResponseDescriptor>> {
        let probe = self.fs.access_read(filename.clone());

        Box::pin(async move {
            match probe.await {
                Ok(path) => {
                    let content_type = mime::for_path(&path);
                    Ok(ResponseDescriptor::asset(path, content_type))
                }
                Err(e) if e.is_unresolvable_path() => {
                    tracing::info!(path = %filename.display(), error = %e, "not exists");
                    Ok(ResponseDescriptor::not_found())
                }
                Err(e) => Err(e),
            }
        })
    }
}

/// Maps a URL path onto the static root.
///
/// `/` and any path ending in `/` get the index document appended. Returns
/// `None` for paths that would leave the root or are not valid UTF-8 after
/// percent-decoding.
pub fn asset_path(root: &Path, index: &str, url_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(url_path).ok()?;

    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if decoded.ends_with('/') {
        path.push(index);
    }
    Some(path)
}

/// Drains an API request body and decodes it as JSON.
///
/// An empty body decodes to an empty object.
pub async fn read_api_body(mut body: ByteStream) -> Result<Value> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk.map_err(Error::BodySource)?);
    }
    parse_api_body(&buf)
}

pub fn parse_api_body(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(bytes).map_err(Error::MalformedBody)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_maps_to_index() {
        let root = Path::new("/srv/www");
        assert_eq!(
            asset_path(root, "index.html", "/"),
            Some(PathBuf::from("/srv/www/index.html"))
        );
        assert_eq!(
            asset_path(root, "index.html", "/docs/"),
            Some(PathBuf::from("/srv/www/docs/index.html"))
        );
    }

    #[test]
    fn percent_decoding_and_traversal() {
        let root = Path::new("/srv/www");
        assert_eq!(
            asset_path(root, "index.html", "/my%20file.txt"),
            Some(PathBuf::from("/srv/www/my file.txt"))
        );
        assert_eq!(asset_path(root, "index.html", "/%2e%2e/secret"), None);
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(parse_api_body(b"").unwrap(), serde_json::json!({}));
        assert!(matches!(parse_api_body(b"{oops"), Err(Error::MalformedBody(_))));
    }
}
