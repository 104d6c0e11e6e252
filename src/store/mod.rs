
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{KbError, Result};

/// A chunk ready for insertion: text, provenance, and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub domain: String,
    pub content: String,
    pub chunk_index: u32,
    pub created_at: String,
    pub vector: Vec<f32>,
}

/// Persistent per-domain nearest-neighbor store backed by LanceDB.
///
/// Each domain owns one table *generation* at a time; a JSON manifest maps
/// the domain name to its active table. Rebuilds populate a freshly named
/// table and repoint the manifest only on success, so concurrent readers
/// either see the old generation or the new one, never a half-built index.
pub struct VectorStore {
    connection: Connection,
    manifest_path: PathBuf,
    vector_dimension: usize,
}

impl VectorStore {
    /// Open (or create) the store under `db_path`.
    #[inline]
    pub async fn new(
        db_path: &Path,
        manifest_path: &Path,
        vector_dimension: usize,
    ) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            KbError::Store(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to connect to LanceDB: {e}")))?;

        info!("Vector store initialized at {}", db_path.display());
        Ok(Self {
            connection,
            manifest_path: manifest_path.to_path_buf(),
            vector_dimension,
        })
    }

    /// Replace a domain's index with a freshly built generation.
    ///
    /// The new table is fully populated before the manifest pointer moves;
    /// a failure mid-build drops the new table and leaves the previous
    /// generation untouched.
    #[inline]
    pub async fn rebuild(&self, domain: &str, records: Vec<ChunkRecord>) -> Result<()> {
        for record in &records {
            if record.vector.len() != self.vector_dimension {
                return Err(KbError::Store(format!(
                    "Vector dimension mismatch for chunk '{}': expected {}, got {}",
                    record.id,
                    self.vector_dimension,
                    record.vector.len()
                )));
            }
        }

        let new_table = generation_table_name(domain);
        info!(
            "Rebuilding domain '{}' into table '{}' ({} chunks)",
            domain,
            new_table,
            records.len()
        );

        let schema = self.create_schema();
        self.connection
            .create_empty_table(&new_table, schema.clone())
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to create table '{new_table}': {e}")))?;

        if !records.is_empty() {
            if let Err(e) = self.insert_records(&new_table, &records, schema).await {
                // Leave the old generation in place and clean up the partial one
                warn!(
                    "Rebuild of domain '{}' failed mid-insert, dropping partial table: {}",
                    domain, e
                );
                if let Err(drop_err) = self.connection.drop_table(&new_table).await {
                    warn!("Failed to drop partial table '{}': {}", new_table, drop_err);
                }
                return Err(e);
            }
        }

        let old_table = self.swap_manifest_pointer(domain, &new_table)?;

        if let Some(old_table) = old_table {
            debug!("Dropping previous generation '{}'", old_table);
            if let Err(e) = self.connection.drop_table(&old_table).await {
                // The pointer already moved; a stale table is harmless
                warn!("Failed to drop old table '{}': {}", old_table, e);
            }
        }

        info!(
            "Domain '{}' rebuilt successfully with {} chunks",
            domain,
            records.len()
        );
        Ok(())
    }

    /// Query a domain's index for the `k` nearest chunks, nearest first.
    ///
    /// A domain whose index was never built gets an empty generation
    /// auto-created and returns no results.
    #[inline]
    pub async fn query(
        &self,
        domain: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<String>> {
        debug!("Querying domain '{}' for top {} chunks", domain, k);

        let Some(table_name) = self.active_table(domain)? else {
            info!(
                "Domain '{}' has no index yet, creating an empty one",
                domain
            );
            let new_table = generation_table_name(domain);
            self.connection
                .create_empty_table(&new_table, self.create_schema())
                .execute()
                .await
                .map_err(|e| {
                    KbError::Store(format!("Failed to create table '{new_table}': {e}"))
                })?;
            self.swap_manifest_pointer(domain, &new_table)?;
            return Ok(Vec::new());
        };

        let table = self
            .connection
            .open_table(&table_name)
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to open table '{table_name}': {e}")))?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| KbError::Store(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to execute search: {e}")))?;

        let contents = self.collect_contents(results).await?;
        debug!(
            "Domain '{}' returned {} of {} requested chunks",
            domain,
            contents.len(),
            k
        );
        Ok(contents)
    }

    /// Number of chunks in a domain's active generation (0 if never built).
    #[inline]
    pub async fn count(&self, domain: &str) -> Result<usize> {
        let Some(table_name) = self.active_table(domain)? else {
            return Ok(0);
        };

        let table = self
            .connection
            .open_table(&table_name)
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to open table '{table_name}': {e}")))?;

        table
            .count_rows(None)
            .await
            .map_err(|e| KbError::Store(format!("Failed to count rows: {e}")))
    }

    async fn insert_records(
        &self,
        table_name: &str,
        records: &[ChunkRecord],
        schema: Arc<Schema>,
    ) -> Result<()> {
        let record_batch = self.create_record_batch(records, schema.clone())?;

        let table = self
            .connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to open table '{table_name}': {e}")))?;

        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| KbError::Store(format!("Failed to insert chunks: {e}")))?;

        Ok(())
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new("domain", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(
        &self,
        records: &[ChunkRecord],
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut domains = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.vector_dimension);

        for record in records {
            ids.push(record.id.as_str());
            domains.push(record.domain.as_str());
            contents.push(record.content.as_str());
            chunk_indices.push(record.chunk_index);
            created_ats.push(record.created_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| KbError::Store(format!("Failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(domains)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| KbError::Store(format!("Failed to create record batch: {e}")))
    }

    async fn collect_contents(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<String>> {
        let mut contents = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| KbError::Store(format!("Failed to read result stream: {e}")))?
        {
            let column = batch
                .column_by_name("content")
                .ok_or_else(|| KbError::Store("Missing content column".to_string()))?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| KbError::Store("Invalid content column type".to_string()))?;

            for row in 0..batch.num_rows() {
                contents.push(column.value(row).to_string());
            }
        }

        Ok(contents)
    }

    /// Active table for a domain per the manifest, if any.
    fn active_table(&self, domain: &str) -> Result<Option<String>> {
        Ok(self.read_manifest()?.get(domain).cloned())
    }

    /// Repoint the manifest for `domain` to `new_table`, returning the
    /// previous table name. This write is the atomic swap of a rebuild.
    fn swap_manifest_pointer(&self, domain: &str, new_table: &str) -> Result<Option<String>> {
        let mut manifest = self.read_manifest()?;
        let old = manifest.insert(domain.to_string(), new_table.to_string());
        self.write_manifest(&manifest)?;
        Ok(old)
    }

    fn read_manifest(&self) -> Result<HashMap<String, String>> {
        if !self.manifest_path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.manifest_path)
            .map_err(|e| KbError::Store(format!("Failed to read index manifest: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| KbError::Store(format!("Failed to parse index manifest: {e}")))
    }

    fn write_manifest(&self, manifest: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| KbError::Store(format!("Failed to create manifest directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(manifest)
            .map_err(|e| KbError::Store(format!("Failed to serialize index manifest: {e}")))?;

        std::fs::write(&self.manifest_path, content)
            .map_err(|e| KbError::Store(format!("Failed to write index manifest: {e}")))
    }
}

/// Generate a unique table name for a new index generation.
fn generation_table_name(domain: &str) -> String {
    let safe: String = domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", safe, Uuid::new_v4().simple())
}
