//! OpenAI vector store mirror
//!
//! API Flow:
//! 1. Store lookup: GET /v1/vector_stores → find "{assistant name} - Library", else create it
//! 2. Cleanup: GET /v1/vector_stores/{id}/files → DELETE each old file (best-effort)
//! 3. Upload: POST /v1/files (multipart, purpose=assistants)
//! 4. Attach: POST /v1/vector_stores/{id}/files
use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::IndexReceipt,
    services::index::{SemanticIndex, CORPUS_FILE_NAME},
};
use reqwest::{multipart, Client as HttpClient, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VectorStore {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Clone)]
pub struct OpenAiIndex {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    store_name: String,
}

impl OpenAiIndex {
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| AppError::InvalidInput("OPENAI_API_KEY is not set".to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            api_url: config.openai_api_url.trim_end_matches('/').to_string(),
            store_name: store_name(&config.openai_assistant_name),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await.map_err(mirror_failed)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::IndexMirrorFailed(format!(
                "OpenAI returned status {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(mirror_failed)
    }

    /// Finds the library vector store by name or creates it
    async fn ensure_vector_store(&self) -> AppResult<String> {
        let stores: ListResponse<VectorStore> = self
            .send(self.request(Method::GET, "/v1/vector_stores"))
            .await?;

        if let Some(store) = stores
            .data
            .into_iter()
            .find(|s| s.name.as_deref() == Some(self.store_name.as_str()))
        {
            tracing::debug!(vector_store_id = %store.id, "Found existing vector store");
            self.cleanup_files(&store.id).await;
            return Ok(store.id);
        }

        let store: VectorStore = self
            .send(
                self.request(Method::POST, "/v1/vector_stores")
                    .json(&json!({ "name": self.store_name })),
            )
            .await?;

        tracing::info!(vector_store_id = %store.id, name = %self.store_name, "Created vector store");
        Ok(store.id)
    }

    /// Removes previously uploaded corpora; failures only leave stale files behind
    async fn cleanup_files(&self, store_id: &str) {
        let path = format!("/v1/vector_stores/{}/files", store_id);
        let files: ListResponse<FileObject> = match self.send(self.request(Method::GET, &path)).await
        {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list vector store files");
                return;
            }
        };

        for file in files.data {
            let path = format!("/v1/vector_stores/{}/files/{}", store_id, file.id);
            if let Err(e) = self
                .send::<serde_json::Value>(self.request(Method::DELETE, &path))
                .await
            {
                tracing::warn!(error = %e, file_id = %file.id, "Could not delete old corpus file");
            } else {
                tracing::debug!(file_id = %file.id, "Deleted old corpus file");
            }
        }
    }

    async fn upload_file(&self, document: Vec<u8>) -> AppResult<String> {
        let part = multipart::Part::bytes(document)
            .file_name(CORPUS_FILE_NAME)
            .mime_str("application/json")
            .map_err(mirror_failed)?;
        let form = multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let file: FileObject = self
            .send(self.request(Method::POST, "/v1/files").multipart(form))
            .await?;
        Ok(file.id)
    }
}

fn store_name(assistant_name: &str) -> String {
    format!("{} - Library", assistant_name)
}

fn mirror_failed(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::IndexMirrorFailed(format!("OpenAI request timed out: {}", e))
    } else {
        AppError::IndexMirrorFailed(format!("OpenAI request failed: {}", e))
    }
}

#[async_trait::async_trait]
impl SemanticIndex for OpenAiIndex {
    async fn upload_corpus(&self, document: Vec<u8>) -> AppResult<IndexReceipt> {
        let size = document.len();
        let vector_store_id = self.ensure_vector_store().await?;
        let file_id = self.upload_file(document).await?;

        let path = format!("/v1/vector_stores/{}/files", vector_store_id);
        let _: serde_json::Value = self
            .send(
                self.request(Method::POST, &path)
                    .json(&json!({ "file_id": file_id })),
            )
            .await?;

        tracing::info!(
            file_id = %file_id,
            vector_store_id = %vector_store_id,
            bytes = size,
            "Corpus uploaded to vector store"
        );

        Ok(IndexReceipt {
            file_id,
            vector_store_id,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
