// SPDX-License-Identifier: Apache-2.0
//! [`FsKv`]: a `KV` whose values live as individual files under a
//! hex-sharded directory tree.

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use kv_core::{KeyError, KeyStream, KvError, KvResult, KV};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::layout::{decode_entry, is_shard_dir, shard_and_tail, DEFAULT_SHARD_DIGITS};

/// A `KV` backed by individual files under `root`, hex-sharded into
/// `shard_digits`-deep subdirectories.
pub struct FsKv {
    root: PathBuf,
    shard_digits: usize,
    temp_counter: AtomicU64,
}

impl FsKv {
    /// Open (creating if necessary) a filesystem keyspace rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self::with_shard_digits(root, DEFAULT_SHARD_DIGITS)
    }

    /// As [`new`](Self::new), with an explicit shard-digit count.
    pub fn with_shard_digits(root: PathBuf, shard_digits: usize) -> Self {
        Self {
            root,
            shard_digits,
            temp_counter: AtomicU64::new(0),
        }
    }

    fn path_for(&self, key: &[u8]) -> PathBuf {
        let (shard, tail) = shard_and_tail(key, self.shard_digits);
        self.root.join(shard).join(tail)
    }

    fn temp_path_for(&self, final_path: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = final_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("blob");
        final_path.with_file_name(format!(".{file_name}.tmp.{}.{n}", std::process::id()))
    }

    async fn read_all_keys(&self) -> KvResult<BTreeSet<Vec<u8>>> {
        let mut keys = BTreeSet::new();
        let mut shard_dirs = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(keys),
            Err(err) => return Err(KvError::Io(err)),
        };
        while let Some(shard_entry) = shard_dirs.next_entry().await.map_err(KvError::Io)? {
            let Ok(shard_name) = shard_entry.file_name().into_string() else {
                continue;
            };
            if !is_shard_dir(&shard_name, self.shard_digits) {
                continue;
            }
            let mut files = match tokio::fs::read_dir(shard_entry.path()).await {
                Ok(rd) => rd,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(KvError::Io(err)),
            };
            while let Some(file_entry) = files.next_entry().await.map_err(KvError::Io)? {
                let Ok(tail_name) = file_entry.file_name().into_string() else {
                    continue;
                };
                if tail_name.starts_with('.') {
                    continue;
                }
                if let Some(key) = decode_entry(&shard_name, &tail_name) {
                    keys.insert(key);
                }
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl KV for FsKv {
    #[instrument(skip(self))]
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(KeyError::not_found(key.to_vec()).into())
            }
            Err(err) => Err(KvError::Io(err)),
        }
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        let mut present = HashSet::new();
        for key in keys {
            let path = self.path_for(key);
            match tokio::fs::metadata(&path).await {
                Ok(_) => {
                    present.insert(key.clone());
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(KvError::Io(err)),
            }
        }
        Ok(present)
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()> {
        let path = self.path_for(key);
        if !replace {
            match tokio::fs::metadata(&path).await {
                Ok(_) => return Err(KeyError::exists(key.to_vec()).into()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(KvError::Io(err)),
            }
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(KvError::Io)?;
        }

        let temp_path = self.temp_path_for(&path);
        let result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.flush().await?;
            set_owner_only_permissions(&temp_path).await?;
            tokio::fs::rename(&temp_path, &path).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result.map_err(KvError::Io)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(KeyError::not_found(key.to_vec()).into())
            }
            Err(err) => Err(KvError::Io(err)),
        }
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        let keys = self.read_all_keys().await?;
        let start = start.to_vec();
        let ordered: Vec<_> = keys.into_iter().filter(|k| k.as_slice() >= start.as_slice()).collect();
        Ok(Box::pin(futures::stream::iter(ordered.into_iter().map(Ok))))
    }

    async fn len(&self) -> KvResult<u64> {
        Ok(self.read_all_keys().await?.len() as u64)
    }
}

#[cfg(unix)]
async fn set_owner_only_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn set_owner_only_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn tmp_root() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        kv.put(b"fruit", b"apple", false).await.unwrap();
        assert_eq!(kv.get(b"fruit").await.unwrap(), b"apple");
    }

    #[tokio::test]
    async fn non_replacing_put_on_existing_key_fails() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        kv.put(b"fruit", b"apple", false).await.unwrap();
        let err = kv.put(b"fruit", b"pear", false).await.unwrap_err();
        assert!(err.is_exists());
        kv.put(b"fruit", b"pear", true).await.unwrap();
        assert_eq!(kv.get(b"fruit").await.unwrap(), b"pear");
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        kv.put(b"fruit", b"apple", false).await.unwrap();
        kv.delete(b"fruit").await.unwrap();
        assert!(kv.get(b"fruit").await.unwrap_err().is_not_found());
        assert!(kv.delete(b"fruit").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn written_file_is_owner_only_on_unix() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let dir = tmp_root();
            let kv = FsKv::new(dir.path().to_path_buf());
            kv.put(b"k", b"v", false).await.unwrap();
            let (shard, tail) = shard_and_tail(b"k", DEFAULT_SHARD_DIGITS);
            let meta = tokio::fs::metadata(dir.path().join(shard).join(tail))
                .await
                .unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn list_is_ordered_and_filtered_by_start() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        for (k, v) in [
            ("animal", "cat"),
            ("beverage", "pina colada"),
            ("fruit", "pear"),
            ("nut", "hazelnut"),
        ] {
            kv.put(k.as_bytes(), v.as_bytes(), false).await.unwrap();
        }
        let all: Vec<Vec<u8>> = kv.list(b"a").await.unwrap().map(|r| r.unwrap()).collect().await;
        assert_eq!(
            all,
            vec![b"animal".to_vec(), b"beverage".to_vec(), b"fruit".to_vec(), b"nut".to_vec()]
        );

        let from_animated: Vec<Vec<u8>> = kv
            .list(b"animated")
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(
            from_animated,
            vec![b"beverage".to_vec(), b"fruit".to_vec(), b"nut".to_vec()]
        );

        let from_nutty: Vec<Vec<u8>> = kv
            .list(b"nutty")
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert!(from_nutty.is_empty());
    }

    #[tokio::test]
    async fn has_reports_present_subset() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        kv.put(b"a", b"1", false).await.unwrap();
        let present = kv.has(&[b"a".to_vec(), b"b".to_vec()]).await.unwrap();
        assert!(present.contains(b"a".as_slice()));
        assert!(!present.contains(b"b".as_slice()));
    }

    #[tokio::test]
    async fn len_tracks_mutations() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        assert_eq!(kv.len().await.unwrap(), 0);
        kv.put(b"a", b"1", false).await.unwrap();
        kv.put(b"b", b"2", false).await.unwrap();
        assert_eq!(kv.len().await.unwrap(), 2);
        kv.delete(b"a").await.unwrap();
        assert_eq!(kv.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn short_keys_round_trip_through_padded_shards() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        kv.put(b"", b"empty key value", false).await.unwrap();
        assert_eq!(kv.get(b"").await.unwrap(), b"empty key value");
        kv.put(&[0xab], b"one byte key", false).await.unwrap();
        assert_eq!(kv.get(&[0xab]).await.unwrap(), b"one byte key");
    }

    #[tokio::test]
    async fn list_and_len_see_keys_in_padded_shards() {
        let dir = tmp_root();
        let kv = FsKv::new(dir.path().to_path_buf());
        kv.put(b"", b"empty", false).await.unwrap();
        kv.put(&[0xab], b"one byte", false).await.unwrap();
        kv.put(b"fruit", b"apple", false).await.unwrap();

        assert_eq!(kv.len().await.unwrap(), 3);

        let mut stream = kv.list(b"").await.unwrap();
        let mut keys = Vec::new();
        while let Some(item) = stream.next().await {
            keys.push(item.unwrap());
        }
        keys.sort();
        assert_eq!(keys, vec![b"".to_vec(), vec![0xab], b"fruit".to_vec()]);
    }
}
