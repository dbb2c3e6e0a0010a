//! Test doubles for the generation and retrieval traits.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::util::{
    llm::{CompletionRequest, LlmBackend, TextGenerator},
    qdrant::{Retriever, SourceDocument},
};

/// Replays canned completions in order and records every request.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([Err("backend down".to_string())])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Concatenated message contents of the `index`-th request.
    pub fn prompt(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index]
            .messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn backend(&self) -> LlmBackend {
        LlmBackend::OpenAi
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

/// Always returns the same documents and records the queries it saw.
pub struct StaticRetriever {
    documents: Vec<SourceDocument>,
    pub queries: Mutex<Vec<(String, u64)>>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<SourceDocument>) -> Arc<Self> {
        Arc::new(Self {
            documents,
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str, limit: u64) -> Result<Vec<SourceDocument>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), limit));
        Ok(self
            .documents
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

pub fn document(content: &str, source: &str, page: &str) -> SourceDocument {
    SourceDocument {
        content: content.to_string(),
        source: Some(source.to_string()),
        page: Some(page.to_string()),
    }
}
