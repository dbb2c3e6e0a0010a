use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::{
    qdrant::{value::Kind, SearchPoints, Value},
    Qdrant,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;

use super::llm::Embedder;

/// A retrieved document chunk with the metadata used for citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDocument {
    pub content: String,
    pub source: Option<String>,
    pub page: Option<String>,
}

impl SourceDocument {
    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or("파일")
    }

    pub fn page_label(&self) -> &str {
        self.page.as_deref().unwrap_or("?")
    }

    /// `"{source} p.{page}"`, as shown to users next to an answer.
    pub fn citation(&self) -> String {
        format!("{} p.{}", self.source_label(), self.page_label())
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, limit: u64) -> Result<Vec<SourceDocument>>;
}

pub struct QdrantRetriever {
    client: Qdrant,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl QdrantRetriever {
    /// Returns `None` when retrieval is disabled or no embedder is available.
    pub async fn new(
        config: &RetrievalConfig,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let Some(embedder) = embedder else {
            warn!("retrieval enabled but no embedding backend configured; retrieval disabled");
            return Ok(None);
        };

        let mut builder = Qdrant::from_url(&config.uri)
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .skip_compatibility_check();

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder.build().context("failed to create Qdrant client")?;

        match client.collection_exists(&config.collection).await {
            Ok(true) => {}
            Ok(false) => warn!(
                collection = %config.collection,
                "qdrant collection does not exist; searches will return errors until it is loaded"
            ),
            Err(err) => warn!(error = %err, "failed to check Qdrant collection"),
        }

        Ok(Some(Self {
            client,
            collection: config.collection.clone(),
            embedder,
        }))
    }
}

#[async_trait]
impl Retriever for QdrantRetriever {
    async fn retrieve(&self, query: &str, limit: u64) -> Result<Vec<SourceDocument>> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .context("failed to embed retrieval query")?;

        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector,
            limit,
            with_payload: Some(true.into()),
            ..Default::default()
        };

        let response = self
            .client
            .search_points(request)
            .await
            .context("failed to search Qdrant")?;

        let documents: Vec<SourceDocument> = response
            .result
            .into_iter()
            .filter_map(|point| document_from_payload(&point.payload))
            .collect();

        debug!(
            collection = %self.collection,
            hits = documents.len(),
            "qdrant search finished"
        );

        Ok(documents)
    }
}

fn document_from_payload(payload: &HashMap<String, Value>) -> Option<SourceDocument> {
    let content = ["page_content", "text"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(value_to_string))
        .filter(|text| !text.trim().is_empty())?;

    Some(SourceDocument {
        content,
        source: payload.get("source").and_then(value_to_string),
        page: payload.get("page").and_then(value_to_string),
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value.kind.as_ref()? {
        Kind::StringValue(text) => Some(text.clone()),
        Kind::IntegerValue(number) => Some(number.to_string()),
        Kind::DoubleValue(number) => Some(number.to_string()),
        Kind::BoolValue(flag) => Some(flag.to_string()),
        _ => None,
    }
}
