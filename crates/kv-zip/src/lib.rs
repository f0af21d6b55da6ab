// SPDX-License-Identifier: Apache-2.0
//! Read-only `KV` backed by an in-memory index over an already-opened ZIP
//! archive.
//!
//! [`ZipKv`] expects archive entries named `<prefix><shard>/<tail>`,
//! matching [`kv_fs`]'s hex-shard layout. The entry index is built once at
//! construction and kept sorted by decoded key, so [`ZipKv::get`] is a
//! binary search and [`ZipKv::list`] is a slice scan; no further parsing of
//! archive metadata happens per operation.

#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]
#![allow(clippy::unreadable_literal, clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions, clippy::use_self)]
#![allow(clippy::doc_markdown, clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::similar_names, clippy::multiple_crate_versions)]

use std::collections::HashSet;
use std::io::{Read, Seek};
use std::sync::Mutex;

use async_trait::async_trait;
use kv_core::{KeyError, KeyStream, KvError, KvResult, KV};
use zip::ZipArchive;

struct Entry {
    key: Vec<u8>,
    archive_name: String,
}

fn longest_common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut prefix_len = first.len();
    for name in &names[1..] {
        let shared = first
            .bytes()
            .zip(name.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        prefix_len = prefix_len.min(shared);
        if prefix_len == 0 {
            break;
        }
    }
    first[..prefix_len].to_string()
}

/// A read-only `KV` over a ZIP archive's entries.
pub struct ZipKv<R> {
    archive: Mutex<ZipArchive<R>>,
    entries: Vec<Entry>,
}

impl<R: Read + Seek> ZipKv<R> {
    /// Index `archive`'s entries as keys, stripping `prefix` from each entry
    /// name. If `prefix` is `None`, the longest common prefix of all entry
    /// names is used.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Io`] wrapping a [`zip::result::ZipError`] if the
    /// archive's central directory cannot be walked.
    pub fn new(mut archive: ZipArchive<R>, prefix: Option<String>) -> KvResult<Self> {
        let raw_names: Vec<String> = (0..archive.len())
            .map(|i| {
                archive
                    .by_index(i)
                    .map(|f| f.name().to_string())
                    .map_err(|e| KvError::Io(std::io::Error::other(e)))
            })
            .collect::<Result<_, _>>()?;

        let prefix = prefix.unwrap_or_else(|| longest_common_prefix(&raw_names));

        let mut entries: Vec<Entry> = raw_names
            .into_iter()
            .filter_map(|name| {
                let rest = name.strip_prefix(&prefix)?;
                let (shard, tail) = rest.split_once('/')?;
                let key = kv_fs::decode_entry(shard, tail)?;
                Some(Entry {
                    key,
                    archive_name: name,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(Self {
            archive: Mutex::new(archive),
            entries,
        })
    }

    fn find(&self, key: &[u8]) -> Option<&Entry> {
        let idx = self
            .entries
            .binary_search_by(|entry| entry.key.as_slice().cmp(key))
            .ok()?;
        self.entries.get(idx)
    }
}

#[async_trait]
impl<R: Read + Seek + Send + 'static> KV for ZipKv<R> {
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        let entry = self
            .find(key)
            .ok_or_else(|| KeyError::not_found(key.to_vec()))?;
        let mut archive = self
            .archive
            .lock()
            .map_err(|_| KvError::Io(std::io::Error::other("zip archive lock poisoned")))?;
        let mut file = archive
            .by_name(&entry.archive_name)
            .map_err(|e| KvError::Io(std::io::Error::other(e)))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(KvError::Io)?;
        Ok(buf)
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        Ok(keys
            .iter()
            .filter(|k| self.find(k).is_some())
            .cloned()
            .collect())
    }

    async fn put(&self, _key: &[u8], _data: &[u8], _replace: bool) -> KvResult<()> {
        Err(KvError::ReadOnly)
    }

    async fn delete(&self, _key: &[u8]) -> KvResult<()> {
        Err(KvError::ReadOnly)
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        let start = start.to_vec();
        let keys: Vec<Vec<u8>> = self
            .entries
            .iter()
            .map(|e| e.key.clone())
            .filter(|k| k.as_slice() >= start.as_slice())
            .collect();
        Ok(Box::pin(futures::stream::iter(keys.into_iter().map(Ok))))
    }

    async fn len(&self) -> KvResult<u64> {
        Ok(self.entries.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::{Cursor, Write as _};
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn build_archive(prefix: &str, entries: &[(&[u8], &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut named: Vec<_> = entries
            .iter()
            .map(|(k, v)| {
                let (shard, tail) = kv_fs::shard_and_tail(k, kv_fs::DEFAULT_SHARD_DIGITS);
                (format!("{prefix}{shard}/{tail}"), *v)
            })
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in named {
            writer.start_file(name, options).unwrap();
            writer.write_all(value).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(cursor).unwrap()
    }

    #[tokio::test]
    async fn get_locates_entries_with_explicit_prefix() {
        let archive = build_archive(
            "blobs/",
            &[(b"fruit".as_slice(), b"apple".as_slice()), (b"nut", b"hazelnut")],
        );
        let kv = ZipKv::new(archive, Some("blobs/".to_string())).unwrap();
        assert_eq!(kv.get(b"fruit").await.unwrap(), b"apple");
        assert_eq!(kv.get(b"nut").await.unwrap(), b"hazelnut");
    }

    #[tokio::test]
    async fn prefix_is_auto_detected_when_not_configured() {
        let archive = build_archive("archive/v1/", &[(b"a".as_slice(), b"1".as_slice())]);
        let kv = ZipKv::new(archive, None).unwrap();
        assert_eq!(kv.get(b"a").await.unwrap(), b"1");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let archive = build_archive("p/", &[(b"a".as_slice(), b"1".as_slice())]);
        let kv = ZipKv::new(archive, Some("p/".to_string())).unwrap();
        assert!(kv.get(b"missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn writes_always_fail_read_only() {
        let archive = build_archive("p/", &[(b"a".as_slice(), b"1".as_slice())]);
        let kv = ZipKv::new(archive, Some("p/".to_string())).unwrap();
        assert!(matches!(
            kv.put(b"a", b"2", true).await.unwrap_err(),
            KvError::ReadOnly
        ));
        assert!(matches!(kv.delete(b"a").await.unwrap_err(), KvError::ReadOnly));
    }

    #[tokio::test]
    async fn list_is_ordered_and_filtered_by_start() {
        let archive = build_archive(
            "p/",
            &[
                (b"animal".as_slice(), b"cat".as_slice()),
                (b"beverage", b"pina colada"),
                (b"fruit", b"pear"),
                (b"nut", b"hazelnut"),
            ],
        );
        let kv = ZipKv::new(archive, Some("p/".to_string())).unwrap();
        let all: Vec<Vec<u8>> = kv.list(b"a").await.unwrap().map(|r| r.unwrap()).collect().await;
        assert_eq!(
            all,
            vec![b"animal".to_vec(), b"beverage".to_vec(), b"fruit".to_vec(), b"nut".to_vec()]
        );
    }
}
