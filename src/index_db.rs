use std::path::Path;

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::CatalogEntry,
    error::{Error, Result},
    model::{Item, join_tags, split_tags},
};

const ITEMS: TableDefinition<u64, &[u8]> = TableDefinition::new("items");
const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");
const METADATA: TableDefinition<&str, &str> = TableDefinition::new("metadata");

const EMBEDDING_MODEL_KEY: &str = "embedding_model";
const DIMENSION_KEY: &str = "dimension";

/// Header size: 4 bytes embedding dimension.
const HEADER_SIZE: usize = 4;

/// Persistent storage behind the vector index.
///
/// Three tables:
/// - `items`: position → JSON-encoded item, with `test_type` flattened to a
///   comma-joined string
/// - `embeddings`: position → 4-byte LE dimension followed by the f32 values
/// - `metadata`: the embedding model id and dimension the store was built with
pub struct IndexDb {
    db: Database,
}

/// Item layout inside the `items` table.
#[derive(Debug, Serialize, Deserialize)]
struct StoredItem {
    url: String,
    name: String,
    description: String,
    duration: String,
    remote_support: bool,
    adaptive_support: bool,
    test_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keywords: Option<String>,
}

impl StoredItem {
    fn from_entry(entry: &CatalogEntry) -> Self {
        let item = &entry.item;
        Self {
            url: item.url.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            duration: item.duration.clone(),
            remote_support: item.remote_support,
            adaptive_support: item.adaptive_support,
            test_type: join_tags(&item.test_type),
            keywords: entry.keywords.clone(),
        }
    }

    fn into_item(self) -> Item {
        Item {
            url: self.url,
            name: self.name,
            description: self.description,
            duration: self.duration,
            remote_support: self.remote_support,
            adaptive_support: self.adaptive_support,
            test_type: split_tags(&self.test_type),
        }
    }
}

/// One row of the store, as loaded back at startup.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: u64,
    pub item: Item,
    pub embedding: Vec<f32>,
}

impl IndexDb {
    /// Open or create an index database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use assessrank::IndexDb;
    ///
    /// let db = IndexDb::open(&tmp.path().join("index.redb")).unwrap();
    /// assert!(db.is_empty().unwrap());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(ITEMS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.open_table(METADATA)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Number of stored items.
    pub fn len(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ITEMS)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Insert the whole catalog in a single transaction, but only if the
    /// store is still empty once the write lock is held.
    ///
    /// Returns `false` (and writes nothing) when the store was already
    /// populated.
    pub fn seed_if_empty(
        &self,
        embedding_model: &str,
        entries: &[(CatalogEntry, Vec<f32>)],
    ) -> Result<bool> {
        let dimension = match entries.first() {
            Some((_, embedding)) => embedding.len(),
            None => return Ok(false),
        };
        if let Some((entry, embedding)) =
            entries.iter().find(|(_, e)| e.len() != dimension)
        {
            return Err(Error::EmbeddingService(format!(
                "embedding for {} has dimension {}, expected {dimension}",
                entry.item.url,
                embedding.len()
            )));
        }

        let txn = self.db.begin_write()?;
        {
            let mut items = txn.open_table(ITEMS)?;
            if items.len()? > 0 {
                return Ok(false);
            }

            let mut embeddings = txn.open_table(EMBEDDINGS)?;
            for (id, (entry, embedding)) in entries.iter().enumerate() {
                let id = id as u64;
                let json = serde_json::to_vec(&StoredItem::from_entry(entry))?;
                items.insert(id, json.as_slice())?;

                let byte_len = HEADER_SIZE + std::mem::size_of_val(embedding.as_slice());
                let mut guard = embeddings.insert_reserve(id, byte_len)?;
                let dest = guard.as_mut();
                dest[..HEADER_SIZE]
                    .copy_from_slice(&(dimension as u32).to_le_bytes());
                dest[HEADER_SIZE..]
                    .copy_from_slice(bytemuck::cast_slice(embedding));
            }

            let mut metadata = txn.open_table(METADATA)?;
            metadata.insert(EMBEDDING_MODEL_KEY, embedding_model)?;
            metadata.insert(DIMENSION_KEY, dimension.to_string().as_str())?;
        }
        txn.commit()?;
        Ok(true)
    }

    /// Load every item with its embedding, ordered by position.
    ///
    /// Rows whose embedding is missing or truncated are skipped.
    pub fn load_all(&self) -> Result<Vec<StoredEntry>> {
        let txn = self.db.begin_read()?;
        let items = txn.open_table(ITEMS)?;
        let embeddings = txn.open_table(EMBEDDINGS)?;

        let mut result = Vec::new();
        for entry in items.iter()? {
            let (k, v) = entry?;
            let id = k.value();
            let stored: StoredItem = serde_json::from_slice(v.value())?;

            let Some(guard) = embeddings.get(id)? else {
                tracing::warn!(id, url = %stored.url, "item has no embedding");
                continue;
            };
            let Some(embedding) = decode_embedding(guard.value()) else {
                tracing::warn!(id, url = %stored.url, "corrupt embedding");
                continue;
            };

            result.push(StoredEntry {
                id,
                item: stored.into_item(),
                embedding,
            });
        }
        Ok(result)
    }

    /// The embedding model the store was seeded with, if seeded.
    pub fn embedding_model(&self) -> Result<Option<String>> {
        self.get_metadata(EMBEDDING_MODEL_KEY)
    }

    /// The embedding dimension the store was seeded with, if seeded.
    pub fn dimension(&self) -> Result<Option<usize>> {
        Ok(self
            .get_metadata(DIMENSION_KEY)?
            .and_then(|d| d.parse().ok()))
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(METADATA)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    let dimension =
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[HEADER_SIZE..];
    if body.len() != dimension * 4 {
        return None;
    }
    // Stored values carry no alignment guarantee; this copies into an
    // aligned buffer.
    Some(bytemuck::pod_collect_to_vec::<u8, f32>(body))
}

impl std::fmt::Debug for IndexDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDb").finish_non_exhaustive()
    }
}
