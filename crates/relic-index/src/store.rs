//! Transactional index store over an ordered key/value engine.
//!
//! The store owns a transactional fjall keyspace with one partition per
//! index projection (`attributes`, `digests`, `links`). Write transactions
//! are serialized by the engine (single writer); read transactions observe a
//! stable snapshot and never block writers.
//!
//! The logical layout is hierarchical (`schema / key / value / digest`), but
//! fjall partitions are flat byte-ordered maps, so each path is encoded as a
//! composite key of length-prefixed segments and every "bucket" cursor is a
//! prefix scan over its encoded path.

use std::path::Path;

use fjall::{PartitionCreateOptions, ReadTransaction, TxKeyspace, TxPartitionHandle};

use relic_core::digest::Digest;
use relic_core::error::{Error, Result};

/// Handle to the on-disk discovery index.
///
/// Created once at startup and shared process-wide; all transaction
/// scoping happens through [`IndexStore::update`] and [`IndexStore::view`].
pub struct IndexStore {
    keyspace: TxKeyspace,
    attributes: TxPartitionHandle,
    digests: TxPartitionHandle,
    links: TxPartitionHandle,
}

impl IndexStore {
    /// Opens (or creates) the index at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the keyspace or a partition cannot
    /// be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let keyspace = fjall::Config::new(path)
            .open_transactional()
            .map_err(|e| Error::storage_with_source("failed to open index keyspace", e))?;
        let attributes = open_partition(&keyspace, "attributes")?;
        let digests = open_partition(&keyspace, "digests")?;
        let links = open_partition(&keyspace, "links")?;
        Ok(Self {
            keyspace,
            attributes,
            digests,
            links,
        })
    }

    /// Runs `f` inside a read-write transaction, committing iff `f`
    /// succeeds. Dropping the transaction on the error path rolls it back,
    /// so a failing update leaves no partial rows behind.
    ///
    /// Writers are serialized with respect to each other.
    ///
    /// # Errors
    ///
    /// Propagates the error from `f`, or [`Error::Storage`] when the commit
    /// fails.
    pub fn update<T>(&self, f: impl FnOnce(&mut IndexWriter<'_>) -> Result<T>) -> Result<T> {
        let mut writer = IndexWriter {
            tx: self.keyspace.write_tx(),
            store: self,
        };
        let out = f(&mut writer)?;
        writer
            .tx
            .commit()
            .map_err(|e| Error::storage_with_source("failed to commit index transaction", e))?;
        Ok(out)
    }

    /// Runs `f` against a read-only snapshot of the index.
    ///
    /// # Errors
    ///
    /// Propagates the error from `f`.
    pub fn view<T>(&self, f: impl FnOnce(&IndexSnapshot<'_>) -> Result<T>) -> Result<T> {
        let snapshot = IndexSnapshot {
            tx: self.keyspace.read_tx(),
            store: self,
        };
        f(&snapshot)
    }
}

fn open_partition(keyspace: &TxKeyspace, name: &str) -> Result<TxPartitionHandle> {
    keyspace
        .open_partition(name, PartitionCreateOptions::default())
        .map_err(|e| Error::storage_with_source(format!("failed to open partition {name:?}"), e))
}

/// Leaf rows carry no payload; existence of the key is the record.
const EMPTY: &[u8] = &[];

/// Write access to the three partitions within one transaction.
pub struct IndexWriter<'a> {
    tx: fjall::WriteTransaction<'a>,
    store: &'a IndexStore,
}

impl IndexWriter<'_> {
    /// Records that `digest` carries the attribute triple
    /// `(schema, key, value)`. `value` must already be in canonical form.
    pub fn put_attribute(&mut self, schema: &str, key: &str, value: &[u8], digest: &Digest) {
        let path = encode_path(&[schema.as_bytes(), key.as_bytes(), value, digest.as_ref()]);
        self.tx.insert(&self.store.attributes, path, EMPTY);
    }

    /// Stores the canonical descriptor for `digest`. Re-inserting identical
    /// descriptor bytes is a no-op, which keeps ingest idempotent.
    pub fn put_descriptor(&mut self, digest: &Digest, descriptor_json: &[u8]) {
        let path = encode_path(&[digest.as_ref(), descriptor_json]);
        self.tx.insert(&self.store.digests, path, EMPTY);
    }

    /// Records a link edge from `linker` to `target`, annotated by the link
    /// descriptor.
    pub fn put_link(&mut self, target: &Digest, linker: &Digest, descriptor_json: &[u8]) {
        let path = encode_path(&[target.as_ref(), linker.as_ref(), descriptor_json]);
        self.tx.insert(&self.store.links, path, EMPTY);
    }
}

/// Read access to the three partitions on one snapshot.
pub struct IndexSnapshot<'a> {
    tx: ReadTransaction,
    store: &'a IndexStore,
}

impl IndexSnapshot<'_> {
    /// Returns true when at least one triple is indexed under `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on an engine read failure.
    pub fn schema_exists(&self, schema: &str) -> Result<bool> {
        let prefix = encode_path(&[schema.as_bytes()]);
        match self.tx.prefix(&self.store.attributes, prefix).next() {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(Error::storage_with_source("failed to scan attributes", e)),
        }
    }

    /// Enumerates the digests recorded under `(schema, key, value)`, in
    /// key-sorted order. `value` must be in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on an engine read failure or a corrupt
    /// composite key.
    pub fn attribute_digests(&self, schema: &str, key: &str, value: &[u8]) -> Result<Vec<String>> {
        let prefix = encode_path(&[schema.as_bytes(), key.as_bytes(), value]);
        let mut digests = Vec::new();
        for entry in self.tx.prefix(&self.store.attributes, prefix) {
            let (path, _) =
                entry.map_err(|e| Error::storage_with_source("failed to scan attributes", e))?;
            let segments = split_path(&path, 4)?;
            digests.push(utf8_segment(segments[3])?);
        }
        Ok(digests)
    }

    /// Enumerates the canonical descriptor JSON documents stored for
    /// `digest`. Empty when the digest was never ingested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on an engine read failure or a corrupt
    /// composite key.
    pub fn descriptors(&self, digest: &Digest) -> Result<Vec<Vec<u8>>> {
        let prefix = encode_path(&[digest.as_ref()]);
        let mut documents = Vec::new();
        for entry in self.tx.prefix(&self.store.digests, prefix) {
            let (path, _) =
                entry.map_err(|e| Error::storage_with_source("failed to scan digests", e))?;
            let segments = split_path(&path, 2)?;
            documents.push(segments[1].to_vec());
        }
        Ok(documents)
    }

    /// Enumerates `(linker digest, link descriptor JSON)` rows for a link
    /// target. Empty when nothing links to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on an engine read failure or a corrupt
    /// composite key.
    pub fn links_for(&self, target: &Digest) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix = encode_path(&[target.as_ref()]);
        let mut edges = Vec::new();
        for entry in self.tx.prefix(&self.store.links, prefix) {
            let (path, _) =
                entry.map_err(|e| Error::storage_with_source("failed to scan links", e))?;
            let segments = split_path(&path, 3)?;
            edges.push((utf8_segment(segments[1])?, segments[2].to_vec()));
        }
        Ok(edges)
    }
}

/// Encodes a bucket path as a composite key: each segment is written as a
/// big-endian `u32` length followed by its bytes. A prefix of encoded
/// segments therefore scopes exactly the subtree beneath that path.
fn encode_path(segments: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(segments.iter().map(|s| 4 + s.len()).sum());
    for segment in segments {
        out.extend_from_slice(&(segment.len() as u32).to_be_bytes());
        out.extend_from_slice(segment);
    }
    out
}

/// Splits a composite key back into exactly `expected` segments.
fn split_path(path: &[u8], expected: usize) -> Result<Vec<&[u8]>> {
    let mut segments = Vec::with_capacity(expected);
    let mut offset = 0usize;
    while offset < path.len() {
        if offset + 4 > path.len() {
            return Err(Error::storage("corrupt index key: short segment length"));
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&path[offset..offset + 4]);
        let len = u32::from_be_bytes(len) as usize;
        offset += 4;
        if offset + len > path.len() {
            return Err(Error::storage("corrupt index key: short segment"));
        }
        segments.push(&path[offset..offset + len]);
        offset += len;
    }
    if segments.len() != expected {
        return Err(Error::storage(format!(
            "corrupt index key: expected {expected} segments, found {}",
            segments.len()
        )));
    }
    Ok(segments)
}

fn utf8_segment(segment: &[u8]) -> Result<String> {
    String::from_utf8(segment.to_vec())
        .map_err(|_| Error::storage("corrupt index key: non-UTF-8 segment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_digest(seed: &str) -> Digest {
        Digest::from_bytes(seed.as_bytes())
    }

    #[test]
    fn path_codec_round_trips() {
        let encoded = encode_path(&[b"schema", b"key", b"\"red\"", b"sha256:feed"]);
        let segments = split_path(&encoded, 4).expect("well-formed path");
        assert_eq!(segments, vec![&b"schema"[..], b"key", b"\"red\"", b"sha256:feed"]);
    }

    #[test]
    fn path_codec_rejects_truncation() {
        let mut encoded = encode_path(&[b"schema", b"key"]);
        encoded.truncate(encoded.len() - 1);
        assert!(split_path(&encoded, 2).is_err());
    }

    #[test]
    fn path_codec_rejects_wrong_arity() {
        let encoded = encode_path(&[b"schema", b"key"]);
        assert!(split_path(&encoded, 3).is_err());
    }

    #[test]
    fn prefix_scoping_does_not_leak_siblings() {
        // "ab" must not be treated as a prefix of "abc" once encoded.
        let short = encode_path(&[b"ab"]);
        let long = encode_path(&[b"abc"]);
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn open_creates_index_and_update_commits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open index");
        let digest = test_digest("manifest");

        store
            .update(|tx| {
                tx.put_attribute("s1", "color", b"\"red\"", &digest);
                Ok(())
            })
            .expect("update commits");

        let digests = store
            .view(|snap| snap.attribute_digests("s1", "color", b"\"red\""))
            .expect("view");
        assert_eq!(digests, vec![digest.as_str().to_string()]);
    }

    #[test]
    fn failed_update_rolls_back_all_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open index");
        let digest = test_digest("manifest");

        let result: Result<()> = store.update(|tx| {
            tx.put_attribute("s1", "color", b"\"red\"", &digest);
            tx.put_descriptor(&digest, b"{}");
            tx.put_link(&test_digest("target"), &digest, b"{}");
            Err(Error::storage("simulated failure"))
        });
        assert!(result.is_err());

        store
            .view(|snap| {
                assert!(!snap.schema_exists("s1")?);
                assert!(snap.descriptors(&digest)?.is_empty());
                assert!(snap.links_for(&test_digest("target"))?.is_empty());
                Ok(())
            })
            .expect("view");
    }

    #[test]
    fn reinserting_identical_rows_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open index");
        let digest = test_digest("manifest");

        for _ in 0..2 {
            store
                .update(|tx| {
                    tx.put_descriptor(&digest, b"{\"size\":1}");
                    Ok(())
                })
                .expect("update");
        }

        let documents = store.view(|snap| snap.descriptors(&digest)).expect("view");
        assert_eq!(documents.len(), 1);
    }
}
