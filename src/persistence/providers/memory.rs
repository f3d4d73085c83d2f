use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::persistence::{Database, DbError, Versioned, segments};

/// In-process JSON tree with the same path and ETag semantics as the
/// Realtime Database.
#[derive(Debug, Default)]
pub struct MemoryDb {
    root: RwLock<Value>,
    push_counter: AtomicU64,
}

impl MemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
        segments(path).try_fold(root, |node, seg| node.get(seg))
    }

    fn read(&self, path: &str) -> Value {
        let root = self.root.read().unwrap();
        Self::lookup(&root, path).cloned().unwrap_or(Value::Null)
    }

    fn write(root: &mut Value, path: &str, value: Value) {
        let segs: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = segs.split_last() else {
            *root = value;
            return;
        };

        let mut node = root;
        for seg in parents {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return;
            };
            node = map.entry((*seg).to_string()).or_insert(Value::Null);
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if value.is_null() {
            map.remove(*last);
        } else {
            map.insert((*last).to_string(), value);
        }
    }

    fn etag_of(value: &Value) -> String {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        STANDARD.encode(Sha256::digest(bytes))
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get(&self, path: &str) -> Result<Value, DbError> {
        Ok(self.read(path))
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, DbError> {
        let value = self.read(path);
        let etag = Self::etag_of(&value);
        Ok(Versioned { value, etag })
    }

    async fn set_if_match(&self, path: &str, value: &Value, etag: &str) -> Result<(), DbError> {
        let mut root = self.root.write().unwrap();

        let current = Self::lookup(&root, path).cloned().unwrap_or(Value::Null);
        if Self::etag_of(&current) != etag {
            return Err(DbError::Conflict(path.to_string()));
        }

        Self::write(&mut root, path, value.clone());
        Ok(())
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, DbError> {
        let n = self.push_counter.fetch_add(1, Ordering::SeqCst);
        let key = format!("-m{n:019}");
        let mut root = self.root.write().unwrap();
        Self::write(&mut root, &format!("{path}/{key}"), value.clone());
        Ok(key)
    }
}
