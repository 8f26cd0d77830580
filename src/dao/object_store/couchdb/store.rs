use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};

use crate::{
    clock::now_ms,
    dao::{
        models::{ObjectEntity, StateEntity},
        object_store::ObjectStore,
        storage::{StorageError, StorageResult},
    },
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{AllDocsResponse, CouchStateDocument, END_SUFFIX, STATE_PREFIX, state_doc_id},
};

/// Object store persisting each state node as one CouchDB document.
#[derive(Clone)]
pub struct CouchObjectStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchObjectStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config.credentials.map(|credentials| {
            (
                Arc::<str>::from(credentials.username),
                Arc::<str>::from(credentials.password),
            )
        });

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Send {
                target: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Send {
                        target: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::Status {
                        target: database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::Status {
                target: database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::Send {
                target: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::Decode {
                        target: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::Status {
                target: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::Send {
                target: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::Status {
                target: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::Send {
                target: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::Status {
                target: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents(&self, prefix: &str) -> CouchResult<Vec<CouchStateDocument>> {
        const ALL_DOCS: &str = "_all_docs";
        let start = format!("{STATE_PREFIX}{prefix}");
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{start}\"")),
            ("endkey", format!("\"{start}{END_SUFFIX}\"")),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::Send {
                target: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::Status {
                target: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::Decode {
                target: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc.map(|doc| (row.id, doc)))
            .map(|(id, doc)| {
                from_value(doc).map_err(|source| CouchDaoError::Document { target: id, source })
            })
            .collect()
    }
}

impl ObjectStore for CouchObjectStore {
    fn create_if_missing(
        &self,
        path: String,
        object: ObjectEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = state_doc_id(&path);
            if store
                .get_document::<CouchStateDocument>(&doc_id)
                .await?
                .is_some()
            {
                return Ok(false);
            }
            let doc = CouchStateDocument::new(&path, object, now_ms());
            store.put_document(&doc_id, &doc).await?;
            Ok(true)
        })
    }

    fn write_value(
        &self,
        path: String,
        value: Value,
        ack: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = state_doc_id(&path);
            let Some(mut doc) = store.get_document::<CouchStateDocument>(&doc_id).await? else {
                return Err(StorageError::MissingObject { path });
            };
            doc.value = Some(value);
            doc.ack = ack;
            doc.ts = now_ms();
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn read_all(
        &self,
        prefix: String,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, StateEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store.list_documents(&prefix).await?;
            Ok(docs
                .into_iter()
                .map(|doc| (doc.path().to_owned(), StateEntity::from(doc)))
                .collect())
        })
    }

    fn delete(&self, path: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = state_doc_id(&path);
            let Some(doc) = store.get_document::<CouchStateDocument>(&doc_id).await? else {
                return Ok(());
            };
            match doc.rev {
                Some(rev) => store.delete_document(&doc_id, &rev).await.map_err(Into::into),
                None => Ok(()),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::Send {
                    target: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::Status {
                    target: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
