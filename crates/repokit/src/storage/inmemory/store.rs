//! In-memory document store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use repokit_core::entity::{Document, ID_FIELD};
use repokit_core::storage::{DocumentStore, StoreError, StoreResult, UpdateOptions};

use super::matcher::{apply_update, matches, sort_documents};
use super::pipeline;

type Documents = Arc<RwLock<Vec<Document>>>;

/// In-memory storage backend for testing and development.
///
/// Collections are `Vec<Document>`s in insertion order wrapped in
/// `Arc<RwLock<_>>`. Data is not persisted and will be lost when the last
/// handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<HashMap<String, Documents>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to a collection, creating it on first use. Handles
    /// to the same name share their documents.
    pub fn collection(&self, name: &str) -> InMemoryCollection {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let documents = collections.entry(name.to_string()).or_default().clone();
        InMemoryCollection {
            name: name.to_string(),
            documents,
        }
    }
}

/// One collection of an [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    name: String,
    documents: Documents,
}

impl InMemoryCollection {
    fn matching(documents: &[Document], filter: &Document) -> StoreResult<Vec<usize>> {
        let mut indexes = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if matches(document, filter)? {
                indexes.push(index);
            }
        }
        Ok(indexes)
    }

    fn first_match(documents: &[Document], filter: &Document) -> StoreResult<Option<usize>> {
        for (index, document) in documents.iter().enumerate() {
            if matches(document, filter)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl DocumentStore for InMemoryCollection {
    fn collection(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(Self::first_match(&documents, filter)?.map(|index| documents[index].clone()))
    }

    async fn find(
        &self,
        filter: &Document,
        sort: &Document,
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Document>> {
        let mut found: Vec<Document> = {
            let documents = self.documents.read().await;
            Self::matching(&documents, filter)?
                .into_iter()
                .map(|index| documents[index].clone())
                .collect()
        };
        sort_documents(&mut found, sort)?;

        let found = found.into_iter().skip(to_usize(skip));
        Ok(match limit {
            Some(limit) => found.take(to_usize(limit)).collect(),
            None => found.collect(),
        })
    }

    async fn count_documents(&self, filter: &Document) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        Ok(Self::matching(&documents, filter)?.len() as u64)
    }

    async fn insert_one(&self, document: Document) -> StoreResult<()> {
        let mut documents = self.documents.write().await;
        if let Some(id) = document.get(ID_FIELD).filter(|id| !id.is_null()) {
            if documents.iter().any(|existing| existing.get(ID_FIELD) == Some(id)) {
                return Err(StoreError::DuplicateKey {
                    collection: self.name.clone(),
                    id: match id {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                });
            }
        }
        documents.push(document);
        Ok(())
    }

    async fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> StoreResult<Option<Document>> {
        let mut documents = self.documents.write().await;
        let Some(index) = Self::first_match(&documents, filter)? else {
            return Ok(None);
        };

        let before = documents[index].clone();
        let mut after = before.clone();
        apply_update(&mut after, update)?;
        if after.get(ID_FIELD) != before.get(ID_FIELD) {
            return Err(StoreError::QueryFailed(
                "update must not change the document id".to_string(),
            ));
        }
        documents[index] = after.clone();

        Ok(Some(if options.return_after { after } else { before }))
    }

    async fn delete_one(&self, filter: &Document) -> StoreResult<bool> {
        let mut documents = self.documents.write().await;
        match Self::first_match(&documents, filter)? {
            Some(index) => {
                documents.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, filter: &Document) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let doomed = Self::matching(&documents, filter)?;
        let mut index = 0;
        documents.retain(|_| {
            let keep = doomed.binary_search(&index).is_err();
            index += 1;
            keep
        });
        Ok(doomed.len() as u64)
    }

    async fn aggregate(&self, stages: &[Document]) -> StoreResult<Vec<Document>> {
        let snapshot = self.documents.read().await.clone();
        pipeline::run(snapshot, stages)
    }
}
