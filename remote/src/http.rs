use std::collections::BTreeMap;

use alm_core::{
    CollectionAddr, ContainerHandle, EntityId, FieldValue, RemoteError, RemoteId, RemoteRecord,
    RemoteResult, RemoteStore, Schema, Timestamp,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const PAGE_LIMIT: usize = 100;

/// Remote store backed by the hosted workspace REST API.
///
/// Bearer-token auth, JSON bodies, cursor pagination on record listings.
/// All failures are mapped to `RemoteError` by status code so callers can
/// dispatch on the variant.
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_token: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(RemoteError::transport)?;

        let base_url = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(&self, response: reqwest::Response, path: &str) -> RemoteResult<reqwest::Response> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RemoteError::Auth("rejected API token".to_string()))
            }
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(path.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(RemoteError::RateLimited { retry_after_secs })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RemoteError::Transport(format!(
                    "unexpected status {status} on {path}: {body}"
                )))
            }
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> RemoteResult<T> {
        debug!(path = %path, "workspace API GET");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let response = self.dispatch(response, path).await?;
        response.json::<T>().await.map_err(RemoteError::malformed)
    }

    async fn send_json<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> RemoteResult<T> {
        debug!(path = %path, method = %method, "workspace API request");
        let response = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let response = self.dispatch(response, path).await?;
        response.json::<T>().await.map_err(RemoteError::malformed)
    }

    async fn delete_path(&self, path: &str) -> RemoteResult<()> {
        debug!(path = %path, "workspace API DELETE");
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(RemoteError::transport)?;
        self.dispatch(response, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list_all(&self, container: &RemoteId) -> RemoteResult<Vec<RemoteRecord>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let path = match &cursor {
                Some(c) => format!(
                    "/v1/containers/{}/records?limit={}&cursor={}",
                    container, PAGE_LIMIT, c
                ),
                None => format!("/v1/containers/{}/records?limit={}", container, PAGE_LIMIT),
            };
            let page: RecordPageDto = self.get(&path).await?;
            for dto in page.records {
                records.push(dto.into_record()?);
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        Ok(records)
    }

    async fn load(
        &self,
        container: &RemoteId,
        remote_id: &RemoteId,
    ) -> RemoteResult<RemoteRecord> {
        let path = format!("/v1/containers/{}/records/{}", container, remote_id);
        let dto: RecordDto = self.get(&path).await?;
        dto.into_record()
    }

    async fn create(
        &self,
        container: &RemoteId,
        record: RemoteRecord,
    ) -> RemoteResult<RemoteRecord> {
        let path = format!("/v1/containers/{}/records", container);
        let dto: RecordDto = self
            .send_json(reqwest::Method::POST, &path, &RecordWriteDto::from_record(&record))
            .await?;
        dto.into_record()
    }

    async fn update(
        &self,
        container: &RemoteId,
        record: &RemoteRecord,
    ) -> RemoteResult<RemoteRecord> {
        let path = format!("/v1/containers/{}/records/{}", container, record.remote_id);
        let dto: RecordDto = self
            .send_json(reqwest::Method::PATCH, &path, &RecordWriteDto::from_record(record))
            .await?;
        dto.into_record()
    }

    async fn delete(&self, container: &RemoteId, remote_id: &RemoteId) -> RemoteResult<()> {
        let path = format!("/v1/containers/{}/records/{}", container, remote_id);
        self.delete_path(&path).await
    }

    async fn drop_all(&self, container: &RemoteId) -> RemoteResult<()> {
        // The API has no bulk delete; walk the container.
        let records = self.list_all(container).await?;
        debug!(container = %container, count = records.len(), "dropping all remote records");
        for record in records {
            match self.delete(container, &record.remote_id).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn list_known_ref_ids(&self, container: &RemoteId) -> RemoteResult<Vec<EntityId>> {
        let path = format!("/v1/containers/{}/links", container);
        let page: LinkPageDto = self.get(&path).await?;
        Ok(page
            .links
            .into_iter()
            .filter_map(|l| l.ref_id.and_then(EntityId::new))
            .collect())
    }

    async fn list_known_remote_ids(&self, container: &RemoteId) -> RemoteResult<Vec<RemoteId>> {
        let path = format!("/v1/containers/{}/links", container);
        let page: LinkPageDto = self.get(&path).await?;
        Ok(page.links.into_iter().map(|l| RemoteId::new(l.record_id)).collect())
    }

    async fn find_container(
        &self,
        addr: &CollectionAddr,
    ) -> RemoteResult<Option<ContainerHandle>> {
        let path = format!(
            "/v1/containers?kind={}&parent={}",
            addr.kind, addr.parent_ref_id
        );
        let page: ContainerPageDto = self.get(&path).await?;
        Ok(page.containers.into_iter().next().map(ContainerDto::into_handle))
    }

    async fn create_container(
        &self,
        addr: &CollectionAddr,
        schema: &Schema,
    ) -> RemoteResult<ContainerHandle> {
        let body = ContainerWriteDto {
            kind: addr.kind.to_string(),
            parent_ref_id: addr.parent_ref_id.to_string(),
            title: addr.kind.container_title().to_string(),
            schema: schema.clone(),
        };
        let dto: ContainerDto = self
            .send_json(reqwest::Method::POST, "/v1/containers", &body)
            .await?;
        Ok(dto.into_handle())
    }

    async fn container_exists(&self, container: &RemoteId) -> RemoteResult<bool> {
        let path = format!("/v1/containers/{}", container);
        match self.get::<ContainerDto>(&path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn load_schema(&self, container: &RemoteId) -> RemoteResult<Schema> {
        let path = format!("/v1/containers/{}", container);
        let dto: ContainerDto = self.get(&path).await?;
        Ok(dto.schema)
    }

    async fn store_schema(&self, container: &RemoteId, schema: &Schema) -> RemoteResult<()> {
        let path = format!("/v1/containers/{}/schema", container);
        let _: ContainerDto = self
            .send_json(reqwest::Method::PUT, &path, schema)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RecordPageDto {
    records: Vec<RecordDto>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordDto {
    id: String,
    ref_id: Option<String>,
    last_edited_time: i64,
    fields: BTreeMap<String, FieldValue>,
}

impl RecordDto {
    fn into_record(self) -> RemoteResult<RemoteRecord> {
        let last_edited_time = Timestamp::from_millis(self.last_edited_time).ok_or_else(|| {
            RemoteError::Malformed(format!(
                "record {} carries unrepresentable edit time {}",
                self.id, self.last_edited_time
            ))
        })?;
        // A mangled ref id column reads as unassigned; the record will be
        // promoted rather than wedging the whole listing.
        let ref_id = match self.ref_id {
            None => None,
            Some(raw) => match EntityId::new(raw.clone()) {
                Some(id) if !id.is_unassigned() => Some(id),
                Some(_) => None,
                None => {
                    warn!(record = %self.id, ref_id = %raw, "ignoring malformed ref id on remote record");
                    None
                }
            },
        };
        Ok(RemoteRecord {
            remote_id: RemoteId::new(self.id),
            ref_id,
            last_edited_time,
            fields: self.fields,
        })
    }
}

#[derive(Debug, Serialize)]
struct RecordWriteDto {
    ref_id: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl RecordWriteDto {
    fn from_record(record: &RemoteRecord) -> Self {
        Self {
            ref_id: record.ref_id.as_ref().map(|id| id.to_string()),
            fields: record.fields.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LinkPageDto {
    links: Vec<LinkDto>,
}

#[derive(Debug, Deserialize)]
struct LinkDto {
    record_id: String,
    ref_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerPageDto {
    containers: Vec<ContainerDto>,
}

#[derive(Debug, Deserialize)]
struct ContainerDto {
    id: String,
    #[serde(default)]
    views: BTreeMap<String, String>,
    schema: Schema,
}

impl ContainerDto {
    fn into_handle(self) -> ContainerHandle {
        ContainerHandle {
            container_id: RemoteId::new(self.id),
            view_ids: self
                .views
                .into_iter()
                .map(|(name, id)| (name, RemoteId::new(id)))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ContainerWriteDto {
    kind: String,
    parent_ref_id: String,
    title: String,
    schema: Schema,
}
