//! Drive v3 REST client.
//!
//! `reqwest` is asynchronous while the filesystem is not, so the client owns
//! a Tokio runtime and blocks on every request (`runtime.block_on`). Each
//! request races the caller's cancellation token and deadline.

use std::future::Future;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;
use tracing::{debug, error, trace};
use url::Url;

use crate::config::Config;
use crate::context::OpContext;
use crate::error::RemoteError;
use crate::remote::{ListQuery, NewObject, ObjectPatch, RemoteObject, RemoteObjectClient};

/// Object fields requested on every call that returns objects.
pub const FILE_FIELDS: &str =
    "id,name,mimeType,size,createdTime,modifiedTime,trashed,appProperties,parents";

const PAGE_SIZE: &str = "1000";

/// One page of a `files.list` answer.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteObject>,
    next_page_token: Option<String>,
}

pub struct DriveClient {
    http: Client,
    runtime: Runtime,
    base_url: Url,
    access_token: Option<String>,
}

impl DriveClient {
    pub fn new(
        base_url: Url,
        access_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            runtime,
            base_url,
            access_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|err| RemoteError::InvalidUrl(format!("{}: {err}", config.api_base_url)))?;
        Self::new(base_url, config.access_token(), config.request_timeout())
    }

    /// `base_url` with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Runs `fut` to completion unless `ctx` is cancelled or runs out of
    /// time first.
    fn block_on<T, F>(&self, ctx: &OpContext, fut: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        ctx.check()?;
        let token = ctx.token().clone();
        let remaining = ctx.remaining();
        self.runtime.block_on(async move {
            let deadline = async {
                match remaining {
                    Some(left) => tokio::time::sleep(left).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(RemoteError::Cancelled),
                _ = deadline => Err(RemoteError::DeadlineExceeded),
                result = fut => result,
            }
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T, RemoteError> {
        let response = check_status(request.send().await?, what).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turns a non-success answer into an error. 404 becomes `NotFound(what)`.
async fn check_status(response: Response, what: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(what.to_string()));
    }
    if status.is_server_error() {
        error!(%status, what, body, "drive server error");
    } else {
        debug!(%status, what, body, "drive request rejected");
    }
    Err(RemoteError::Status { status, body })
}

/// Body of a `multipart/related` upload: JSON metadata, then the content.
pub fn multipart_related_body(boundary: &str, metadata: &[u8], content: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(metadata.len() + content.len() + 4 * boundary.len() + 128);
    body.put_slice(format!("--{boundary}\r\n").as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata);
    body.put_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.put_slice(content);
    body.put_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body.freeze()
}

impl RemoteObjectClient for DriveClient {
    fn get(&self, ctx: &OpContext, id: &str) -> Result<RemoteObject, RemoteError> {
        let url = self.endpoint(&["drive", "v3", "files", id])?;
        trace!(id, "files.get");
        let request = self.request(Method::GET, url).query(&[("fields", FILE_FIELDS)]);
        self.block_on(ctx, Self::send_json(request, id))
    }

    fn list(&self, ctx: &OpContext, query: &ListQuery) -> Result<Vec<RemoteObject>, RemoteError> {
        let url = self.endpoint(&["drive", "v3", "files"])?;
        let q = query.to_drive_query();
        let fields = format!("nextPageToken,files({FILE_FIELDS})");
        trace!(q, "files.list");

        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.request(Method::GET, url.clone()).query(&[
                ("q", q.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: FileList = self.block_on(ctx, Self::send_json(request, &query.parent_id))?;
            objects.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(objects)
    }

    fn create(
        &self,
        ctx: &OpContext,
        object: &NewObject,
        content: Option<Bytes>,
    ) -> Result<RemoteObject, RemoteError> {
        let metadata = serde_json::to_vec(object)?;
        let request = match content {
            None => {
                let url = self.endpoint(&["drive", "v3", "files"])?;
                self.request(Method::POST, url)
                    .query(&[("fields", FILE_FIELDS)])
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(metadata)
            }
            Some(content) => {
                let url = self.endpoint(&["upload", "drive", "v3", "files"])?;
                let boundary = format!("drivefs-{}", uuid::Uuid::new_v4().simple());
                let body = multipart_related_body(&boundary, &metadata, &content);
                self.request(Method::POST, url)
                    .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={boundary}"),
                    )
                    .body(body)
            }
        };
        trace!(name = %object.name, "files.create");
        self.block_on(ctx, Self::send_json(request, &object.name))
    }

    fn update(&self, ctx: &OpContext, id: &str, patch: &ObjectPatch) -> Result<RemoteObject, RemoteError> {
        let url = self.endpoint(&["drive", "v3", "files", id])?;
        trace!(id, "files.update");
        let request = self
            .request(Method::PATCH, url)
            .query(&[("fields", FILE_FIELDS)])
            .json(patch);
        self.block_on(ctx, Self::send_json(request, id))
    }

    fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&["drive", "v3", "files", id])?;
        trace!(id, "files.delete");
        let request = self.request(Method::DELETE, url);
        self.block_on(ctx, async move {
            check_status(request.send().await?, id).await?;
            Ok::<(), RemoteError>(())
        })
    }

    fn download(&self, ctx: &OpContext, id: &str) -> Result<Bytes, RemoteError> {
        let url = self.endpoint(&["drive", "v3", "files", id])?;
        trace!(id, "files.get media");
        let request = self.request(Method::GET, url).query(&[("alt", "media")]);
        self.block_on(ctx, async move {
            let response = check_status(request.send().await?, id).await?;
            Ok::<Bytes, RemoteError>(response.bytes().await?)
        })
    }
}
