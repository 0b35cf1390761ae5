//! Parquet I/O for digraphs and clusterings
//!
//! # Format
//!
//! A digraph is stored as two Parquet files:
//! - `{path}_vertices.parquet`: (`vertex`, `out_degree`)
//! - `{path}_arcs.parquet`: (tail, head), grouped by tail in row order
//!
//! A clustering is stored as one file:
//! - `{path}_labels.parquet`: (`vertex`, label), label null when unassigned.
//!   The cluster count is kept in the schema metadata under `num_clusters`.

use super::Digraph;
use crate::clustering::{ClusterLabel, Clustering};
use anyhow::{bail, ensure, Context, Result};
use arrow::array::{Array, ArrayRef, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const NUM_CLUSTERS_KEY: &str = "num_clusters";

impl Digraph {
    /// Write digraph to Parquet files
    ///
    /// Creates `{path}_vertices.parquet` and `{path}_arcs.parquet`.
    ///
    /// # Errors
    ///
    /// Returns error for the null digraph, or if file I/O or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ensure!(!self.is_null(), "cannot persist the null digraph");
        let base_path = path.as_ref();

        self.write_vertices_parquet(base_path)?;
        self.write_arcs_parquet(base_path)?;

        Ok(())
    }

    /// Read digraph from Parquet files
    ///
    /// # Errors
    ///
    /// Returns error if files don't exist, columns have the wrong type, or
    /// the stored rows do not form a valid digraph
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref();

        let degrees = Self::read_vertices_parquet(base_path)?;
        let mut tail_ptr = Vec::with_capacity(degrees.len() + 1);
        tail_ptr.push(0_usize);
        for degree in &degrees {
            let prev = tail_ptr[tail_ptr.len() - 1];
            let degree = usize::try_from(*degree).context("Out-degree does not fit usize")?;
            tail_ptr.push(prev + degree);
        }

        let arcs = Self::read_arcs_parquet(base_path)?;
        ensure!(
            arcs.len() == tail_ptr[degrees.len()],
            "{} arcs stored but out-degrees sum to {}",
            arcs.len(),
            tail_ptr[degrees.len()]
        );

        let mut head = Vec::with_capacity(arcs.len());
        for (v, window) in tail_ptr.windows(2).enumerate() {
            for &(tail, h) in &arcs[window[0]..window[1]] {
                ensure!(
                    tail as usize == v,
                    "arc ({tail}, {h}) stored in the rows of vertex {v}"
                );
                head.push(h);
            }
        }

        Self::from_parts(degrees.len(), tail_ptr, head).context("Stored digraph is invalid")
    }

    fn write_vertices_parquet(&self, base_path: &Path) -> Result<()> {
        let vertices_path = format!("{}_vertices.parquet", base_path.display());

        let mut ids = Vec::with_capacity(self.vertices());
        let mut degrees = Vec::with_capacity(self.vertices());
        for (v, row) in self.rows() {
            ids.push(v);
            degrees.push(row.len() as u64);
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("vertex", DataType::UInt32, false),
            Field::new("out_degree", DataType::UInt64, false),
        ]));

        write_batch(
            &vertices_path,
            schema,
            vec![
                Arc::new(UInt32Array::from(ids)),
                Arc::new(UInt64Array::from(degrees)),
            ],
        )
    }

    fn write_arcs_parquet(&self, base_path: &Path) -> Result<()> {
        let arcs_path = format!("{}_arcs.parquet", base_path.display());

        let mut tails = Vec::with_capacity(self.num_arcs());
        for (v, row) in self.rows() {
            tails.extend(std::iter::repeat(v).take(row.len()));
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("tail", DataType::UInt32, false),
            Field::new("head", DataType::UInt32, false),
        ]));

        write_batch(
            &arcs_path,
            schema,
            vec![
                Arc::new(UInt32Array::from(tails)),
                Arc::new(UInt32Array::from(self.head().to_vec())),
            ],
        )
    }

    fn read_vertices_parquet(base_path: &Path) -> Result<Vec<u64>> {
        let vertices_path = format!("{}_vertices.parquet", base_path.display());
        let (_, batches) = read_batches(&vertices_path)?;

        let mut degrees = Vec::new();
        for batch in &batches {
            let ids = column::<UInt32Array>(batch, 0, "vertex")?;
            let out = column::<UInt64Array>(batch, 1, "out_degree")?;

            for i in 0..batch.num_rows() {
                ensure!(
                    ids.value(i) as usize == degrees.len(),
                    "vertex {} stored out of order",
                    ids.value(i)
                );
                degrees.push(out.value(i));
            }
        }

        Ok(degrees)
    }

    fn read_arcs_parquet(base_path: &Path) -> Result<Vec<(u32, u32)>> {
        let arcs_path = format!("{}_arcs.parquet", base_path.display());
        let (_, batches) = read_batches(&arcs_path)?;

        let mut arcs = Vec::new();
        for batch in &batches {
            let tails = column::<UInt32Array>(batch, 0, "tail")?;
            let heads = column::<UInt32Array>(batch, 1, "head")?;

            for i in 0..batch.num_rows() {
                arcs.push((tails.value(i), heads.value(i)));
            }
        }

        Ok(arcs)
    }
}

impl Clustering {
    /// Write clustering to `{path}_labels.parquet`
    ///
    /// # Errors
    ///
    /// Returns error if file I/O or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let labels_path = format!("{}_labels.parquet", path.as_ref().display());

        let ids = (0..self.vertices())
            .map(|v| u32::try_from(v).context("Vertex id does not fit u32"))
            .collect::<Result<Vec<_>>>()?;
        let labels: Vec<Option<u32>> = self.labels().iter().map(|l| l.map(|l| l.0)).collect();

        let metadata = HashMap::from([(
            NUM_CLUSTERS_KEY.to_string(),
            self.num_clusters().to_string(),
        )]);
        let schema = Arc::new(Schema::new_with_metadata(
            vec![
                Field::new("vertex", DataType::UInt32, false),
                Field::new("label", DataType::UInt32, true),
            ],
            metadata,
        ));

        write_batch(
            &labels_path,
            schema,
            vec![
                Arc::new(UInt32Array::from(ids)),
                Arc::new(UInt32Array::from(labels)),
            ],
        )
    }

    /// Read clustering from `{path}_labels.parquet`
    ///
    /// Files without a stored cluster count get one more than the largest label.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, columns have the wrong type,
    /// or the labels exceed the stored cluster count
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let labels_path = format!("{}_labels.parquet", path.as_ref().display());
        let (schema, batches) = read_batches(&labels_path)?;

        let mut labels = Vec::new();
        for batch in &batches {
            let ids = column::<UInt32Array>(batch, 0, "vertex")?;
            let values = column::<UInt32Array>(batch, 1, "label")?;

            for i in 0..batch.num_rows() {
                ensure!(
                    ids.value(i) as usize == labels.len(),
                    "vertex {} stored out of order",
                    ids.value(i)
                );
                let label = if values.is_null(i) {
                    None
                } else {
                    Some(ClusterLabel(values.value(i)))
                };
                labels.push(label);
            }
        }

        let num_clusters = match schema.metadata().get(NUM_CLUSTERS_KEY) {
            Some(stored) => stored
                .parse::<usize>()
                .with_context(|| format!("Invalid {NUM_CLUSTERS_KEY} metadata: {stored}"))?,
            None => labels
                .iter()
                .flatten()
                .map(|l| l.0 as usize + 1)
                .max()
                .unwrap_or(0),
        };

        Self::new(labels, num_clusters).context("Stored clustering is invalid")
    }
}

fn write_batch(path: &str, schema: SchemaRef, columns: Vec<ArrayRef>) -> Result<()> {
    let batch =
        RecordBatch::try_new(schema.clone(), columns).context("Failed to create RecordBatch")?;

    let file = File::create(path).with_context(|| format!("Failed to create {path}"))?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3)?,
        ))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn read_batches(path: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = File::open(path).with_context(|| format!("Failed to open {path}"))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {path}"))?;
    Ok((schema, batches))
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    index: usize,
    name: &str,
) -> Result<&'a T> {
    if index >= batch.num_columns() {
        bail!("Missing {name} column");
    }
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("Invalid {name} column type"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NodeId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_digraph_parquet_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_digraph");

        let dg = Digraph::from_arcs(4, &[(0, 1), (0, 2), (1, 2), (3, 0), (3, 3)]).unwrap();
        dg.write_parquet(&path).await.unwrap();

        let loaded = Digraph::read_parquet(&path).await.unwrap();

        assert!(loaded.is_valid());
        assert_eq!(loaded, dg);
        assert_eq!(loaded.out_neighbors(NodeId(0)).unwrap(), &[1, 2]);
        assert_eq!(loaded.out_neighbors(NodeId(2)).unwrap(), &[] as &[u32]);
    }

    #[tokio::test]
    async fn test_empty_digraph_parquet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty_digraph");

        let dg = Digraph::empty(0, 0).unwrap();
        dg.write_parquet(&path).await.unwrap();

        let loaded = Digraph::read_parquet(&path).await.unwrap();
        assert_eq!(loaded.vertices(), 0);
        assert_eq!(loaded.num_arcs(), 0);
        assert!(!loaded.is_null());
    }

    #[tokio::test]
    async fn test_null_digraph_not_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("null_digraph");

        assert!(Digraph::null().write_parquet(&path).await.is_err());
        assert!(!dir.path().join("null_digraph_vertices.parquet").exists());
    }

    #[tokio::test]
    async fn test_missing_files() {
        let dir = tempdir().unwrap();
        assert!(Digraph::read_parquet(dir.path().join("nothing")).await.is_err());
        assert!(Clustering::read_parquet(dir.path().join("nothing")).await.is_err());
    }

    #[tokio::test]
    async fn test_clustering_parquet_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_clustering");

        // Label 2 is unused; the stored count must survive anyway.
        let cl = Clustering::new(
            vec![
                Some(ClusterLabel(1)),
                None,
                Some(ClusterLabel(0)),
                Some(ClusterLabel(1)),
            ],
            3,
        )
        .unwrap();
        cl.write_parquet(&path).await.unwrap();

        let loaded = Clustering::read_parquet(&path).await.unwrap();
        assert_eq!(loaded, cl);
        assert_eq!(loaded.num_clusters(), 3);
        assert_eq!(loaded.label(NodeId(1)), None);
    }

    #[tokio::test]
    async fn test_clustering_without_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare");
        let labels_path = format!("{}_labels.parquet", path.display());

        let schema = Arc::new(Schema::new(vec![
            Field::new("vertex", DataType::UInt32, false),
            Field::new("label", DataType::UInt32, true),
        ]));
        write_batch(
            &labels_path,
            schema,
            vec![
                Arc::new(UInt32Array::from(vec![0, 1, 2])),
                Arc::new(UInt32Array::from(vec![Some(4), None, Some(1)])),
            ],
        )
        .unwrap();

        let loaded = Clustering::read_parquet(&path).await.unwrap();
        assert_eq!(loaded.num_clusters(), 5);
        assert_eq!(loaded.label(NodeId(0)), Some(ClusterLabel(4)));
    }
}
