//! Request classification and the per-request pipeline.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tokio::io::AsyncWrite;

use crate::error::{Error, Result};
use crate::fs::ReactiveFs;
use crate::fs::stream::ByteStream;
use crate::http::request::{Method, Request};
use crate::http::response::{Body, ResponseDescriptor, StatusCode};
use crate::http::writer::{Head, ResponseWriter, SendSummary};
use crate::www::resolver::{self, AssetResolver, FsAssetResolver};

/// What an API handler receives.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Decoded JSON body; `{}` when the request had none
    pub body: Value,
    pub query: Option<String>,
}

pub trait ApiHandler: Send + Sync {
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, anyhow::Result<ResponseDescriptor>>;
}

impl<F, Fut> ApiHandler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ResponseDescriptor>> + Send + 'static,
{
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, anyhow::Result<ResponseDescriptor>> {
        Box::pin(self(request))
    }
}

/// URL path → API handler. Fixed once the server is built.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<dyn ApiHandler>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `path`, replacing an earlier registration.
    pub fn route(mut self, path: impl Into<String>, handler: impl ApiHandler + 'static) -> Self {
        let path = path.into();
        if self.routes.insert(path.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(route = %path, "api route registered twice, keeping the last handler");
        }
        self
    }

    pub fn get(&self, path: &str) -> Option<&Arc<dyn ApiHandler>> {
        self.routes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<_> = self.routes.keys().collect();
        paths.sort();
        f.debug_struct("RouteTable").field("routes", &paths).finish()
    }
}

/// Which branch of the pipeline a request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Api,
    Asset,
}

/// Result of the single dispatch step.
pub enum Classification {
    Api {
        route: String,
        handler: Arc<dyn ApiHandler>,
    },
    Asset,
}

impl Classification {
    pub fn class(&self) -> RequestClass {
        match self {
            Classification::Api { .. } => RequestClass::Api,
            Classification::Asset => RequestClass::Asset,
        }
    }
}

/// How a request ended, in the pipeline's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Asset streamed with 200
    Served,
    /// Asset missing, 404 sent
    NotFound,
    /// Asset resolved but could not be opened for streaming
    CantCreateReadStream,
    /// Answered by a registered handler with this status
    ApiCall(StatusCode),
    /// Asset answered by a custom resolver with some other status
    Other(StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub class: RequestClass,
    pub status: ResponseStatus,
    pub bytes_written: u64,
    /// The connection must not be reused
    pub close: bool,
}

/// One inbound request: head, body source and the sink its response goes to.
pub struct RequestRecord<W> {
    pub request: Request,
    pub body: ByteStream,
    pub response: W,
}

/// A finished request from [`WwwServer::serve`], with its sink handed back.
pub struct Served<W> {
    pub request: Request,
    pub outcome: Outcome,
    pub response: W,
}

/// Static root, index document, route table and asset resolver, fixed at
/// construction.
pub struct WwwServer {
    root: PathBuf,
    index: String,
    routes: RouteTable,
    assets: Arc<dyn AssetResolver>,
    fs: ReactiveFs,
    headers: HashMap<String, String>,
}

pub struct WwwServerBuilder {
    root: PathBuf,
    index: String,
    routes: RouteTable,
    assets: Option<Arc<dyn AssetResolver>>,
    fs: ReactiveFs,
    headers: HashMap<String, String>,
}

impl WwwServerBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Replaces the default file-system asset lookup.
    pub fn asset_resolver(mut self, resolver: impl AssetResolver + 'static) -> Self {
        self.assets = Some(Arc::new(resolver));
        self
    }

    /// Header added to every response that does not set it itself.
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> WwwServer {
        let assets = self
            .assets
            .unwrap_or_else(|| Arc::new(FsAssetResolver::new(self.fs.clone())));

        WwwServer {
            root: self.root,
            index: self.index,
            routes: self.routes,
            assets,
            fs: self.fs,
            headers: self.headers,
        }
    }
}

impl WwwServer {
    pub fn builder(fs: ReactiveFs) -> WwwServerBuilder {
        WwwServerBuilder {
            root: PathBuf::from("./wwwroot_dev"),
            index: "index.html".to_string(),
            routes: RouteTable::new(),
            assets: None,
            fs,
            headers: HashMap::new(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn fs(&self) -> &ReactiveFs {
        &self.fs
    }

    /// The api/asset decision: a path in the route table is an API call,
    /// everything else is an asset.
    pub fn classify(&self, path: &str) -> Classification {
        match self.routes.get(path) {
            Some(handler) => Classification::Api {
                route: path.to_string(),
                handler: Arc::clone(handler),
            },
            None => Classification::Asset,
        }
    }

    /// Runs one request to completion: classify, resolve, write head, write body.
    pub async fn handle<W>(&self, request: &Request, body: ByteStream, sink: &mut W) -> Result<Outcome>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let classification = self.classify(&request.path);
        let class = classification.class();

        let result = match classification {
            Classification::Api { route, handler } => {
                self.handle_api(request, body, route, handler, sink).await
            }
            Classification::Asset => self.handle_asset(request, sink).await,
        };

        match &result {
            Ok(outcome) => tracing::info!(
                method = %request.method,
                path = %request.path,
                ?class,
                status = ?outcome.status,
                bytes = outcome.bytes_written,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request complete"
            ),
            Err(e) => tracing::warn!(
                method = %request.method,
                path = %request.path,
                ?class,
                error = %e,
                "request failed"
            ),
        }

        result
    }

    async fn handle_api<W>(
        &self,
        request: &Request,
        body: ByteStream,
        route: String,
        handler: Arc<dyn ApiHandler>,
        sink: &mut W,
    ) -> Result<Outcome>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let body = resolver::read_api_body(body).await?;
        let api_request = ApiRequest {
            method: request.method,
            body,
            query: request.query.clone(),
        };

        let descriptor = handler
            .call(api_request)
            .await
            .map_err(|source| Error::Handler { route, source })?;

        let status = ResponseStatus::ApiCall(descriptor.status);
        self.commit_or_fail(RequestClass::Api, status, request, descriptor, sink)
            .await
    }

    async fn handle_asset<W>(&self, request: &Request, sink: &mut W) -> Result<Outcome>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let descriptor = match resolver::asset_path(&self.root, &self.index, &request.path) {
            Some(filename) => self.assets.resolve(filename).await?,
            None => {
                tracing::info!(path = %request.path, "not exists");
                ResponseDescriptor::not_found()
            }
        };

        let status = match descriptor.status.as_u16() {
            200 => ResponseStatus::Served,
            404 => ResponseStatus::NotFound,
            _ => ResponseStatus::Other(descriptor.status),
        };

        self.commit_or_fail(RequestClass::Asset, status, request, descriptor, sink)
            .await
    }

    /// Commits the descriptor, answering 500 instead when its file cannot be
    /// opened for streaming.
    async fn commit_or_fail<W>(
        &self,
        class: RequestClass,
        status: ResponseStatus,
        request: &Request,
        descriptor: ResponseDescriptor,
        sink: &mut W,
    ) -> Result<Outcome>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let head_only = request.method == Method::HEAD;

        match self.commit(descriptor, head_only, sink).await {
            Ok(summary) => Ok(outcome(class, status, summary)),
            Err(Error::NotFound { path } | Error::IsDirectory { path } | Error::PermissionDenied { path }) => {
                // Resolved a moment ago, gone or unreadable now. Nothing is on
                // the wire yet, so a 500 can still be sent.
                tracing::warn!(path = %path.display(), "cannot create read stream");
                let fallback = self.with_defaults(ResponseDescriptor::internal_error());
                let writer = ResponseWriter::new(sink);
                let summary = if head_only {
                    writer.send_head(fallback).await?
                } else {
                    writer.send(fallback).await?
                };
                Ok(outcome(class, ResponseStatus::CantCreateReadStream, summary))
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the descriptor. A 200 with a file body is streamed from disk;
    /// everything else is written verbatim. `head_only` sends the same head
    /// and no body.
    async fn commit<W>(&self, descriptor: ResponseDescriptor, head_only: bool, sink: &mut W) -> Result<SendSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let descriptor = self.with_defaults(descriptor);

        let path = match &descriptor.body {
            Body::File(path) if descriptor.status.as_u16() == 200 => path.clone(),
            _ if head_only => return ResponseWriter::new(sink).send_head(descriptor).await,
            _ => return ResponseWriter::new(sink).send(descriptor).await,
        };

        // Opened before the head goes out so a vanished file can still get a clean 500.
        let file = self.fs.open_read_stream(path).await?;

        let head = Head {
            status: descriptor.status,
            content_type: descriptor.content_type.as_deref(),
            headers: &descriptor.headers,
            content_length: Some(file.len()),
        };
        let mut body = ResponseWriter::new(sink).write_head(head).await?;
        if head_only {
            return body.skip_body().await;
        }
        body.stream(file).await?;
        body.finish().await
    }

    fn with_defaults(&self, mut descriptor: ResponseDescriptor) -> ResponseDescriptor {
        for (key, value) in &self.headers {
            let present = descriptor.headers.keys().any(|k| k.eq_ignore_ascii_case(key));
            if !present {
                descriptor.headers.insert(key.clone(), value.clone());
            }
        }
        descriptor
    }

    /// Processes an unbounded stream of requests concurrently, yielding one
    /// item per request as it finishes. A failed request yields an error item
    /// and does not disturb the others.
    pub fn serve<S, W>(self: Arc<Self>, requests: S) -> BoxStream<'static, Result<Served<W>>>
    where
        S: Stream<Item = RequestRecord<W>> + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        requests
            .flat_map_unordered(None, move |record| {
                let server = Arc::clone(&self);
                stream::once(async move { server.serve_one(record).await }).boxed()
            })
            .boxed()
    }

    async fn serve_one<W>(&self, record: RequestRecord<W>) -> Result<Served<W>>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let RequestRecord {
            request,
            body,
            mut response,
        } = record;

        let outcome = self.handle(&request, body, &mut response).await?;
        Ok(Served {
            request,
            outcome,
            response,
        })
    }
}

impl fmt::Debug for WwwServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WwwServer")
            .field("root", &self.root)
            .field("index", &self.index)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

fn outcome(class: RequestClass, status: ResponseStatus, summary: SendSummary) -> Outcome {
    Outcome {
        class,
        status,
        bytes_written: summary.bytes_written,
        close: summary.close,
    }
}
