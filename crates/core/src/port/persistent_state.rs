// PersistentState Port (bucketed key-value store)

use crate::error::StateResult;
use async_trait::async_trait;

/// Callback invoked by for_each for every (key, value) pair
///
/// Returning an error stops the iteration; the error is propagated by for_each.
pub type ForEachFn<'a> = dyn FnMut(&[u8], &[u8]) -> StateResult<()> + Send + 'a;

/// Bucketed key-value store
///
/// Implementations:
/// - SqliteState: SQLite-backed store
/// - InstrumentedPersistentState: logs every call to an inner store
#[async_trait]
pub trait PersistentState: Send + Sync {
    /// Release the underlying storage
    async fn close(&self) -> StateResult<()>;

    /// Copy every entry of every bucket into `dest`
    async fn copy_to(&self, dest: &dyn PersistentState) -> StateResult<()>;

    /// Whole contents as `{bucket: {key: value}}`
    async fn data(&self) -> StateResult<serde_json::Value>;

    /// Delete a key. Missing buckets and keys are not an error.
    async fn delete(&self, bucket: &[u8], key: &[u8]) -> StateResult<()>;

    /// Delete a bucket and all its keys. Missing buckets are not an error.
    async fn delete_bucket(&self, bucket: &[u8]) -> StateResult<()>;

    /// Visit every pair of `bucket` in ascending key order
    ///
    /// # Errors
    /// The first error returned by `f`, after which no further pair is visited
    async fn for_each(&self, bucket: &[u8], f: &mut ForEachFn<'_>) -> StateResult<()>;

    /// Value of `key`, `None` if the bucket or key does not exist
    async fn get(&self, bucket: &[u8], key: &[u8]) -> StateResult<Option<Vec<u8>>>;

    /// Set `key` to `value`, creating the bucket if needed
    async fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> StateResult<()>;
}

/// Renders `{bucket: {key: value}}` as JSON (lossy UTF-8)
pub fn buckets_to_json<'a, I>(entries: I) -> serde_json::Value
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8], &'a [u8])>,
{
    let mut buckets = serde_json::Map::new();
    for (bucket, key, value) in entries {
        let bucket_entry = buckets
            .entry(String::from_utf8_lossy(bucket).into_owned())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let serde_json::Value::Object(keys) = bucket_entry {
            keys.insert(
                String::from_utf8_lossy(key).into_owned(),
                serde_json::Value::String(String::from_utf8_lossy(value).into_owned()),
            );
        }
    }
    serde_json::Value::Object(buckets)
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    type Buckets = BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>;

    /// In-memory PersistentState
    #[derive(Default, Clone)]
    pub struct MemoryState {
        buckets: Arc<Mutex<Buckets>>,
        closed: Arc<Mutex<bool>>,
    }

    impl MemoryState {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }
        fn snapshot(&self) -> Buckets {
            self.buckets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PersistentState for MemoryState {
        async fn close(&self) -> StateResult<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }

        async fn copy_to(&self, dest: &dyn PersistentState) -> StateResult<()> {
            for (bucket, keys) in self.snapshot() {
                for (key, value) in keys {
                    dest.set(&bucket, &key, &value).await?;
                }
            }
            Ok(())
        }

        async fn data(&self) -> StateResult<serde_json::Value> {
            let buckets = self.snapshot();
            Ok(buckets_to_json(buckets.iter().flat_map(|(bucket, keys)| {
                keys.iter()
                    .map(move |(k, v)| (bucket.as_slice(), k.as_slice(), v.as_slice()))
            })))
        }

        async fn delete(&self, bucket: &[u8], key: &[u8]) -> StateResult<()> {
            if let Some(keys) = self.buckets.lock().unwrap().get_mut(bucket) {
                keys.remove(key);
            }
            Ok(())
        }

        async fn delete_bucket(&self, bucket: &[u8]) -> StateResult<()> {
            self.buckets.lock().unwrap().remove(bucket);
            Ok(())
        }

        async fn for_each(&self, bucket: &[u8], f: &mut ForEachFn<'_>) -> StateResult<()> {
            // Iterate over a copy so callbacks may write to the store
            let keys = self.buckets.lock().unwrap().get(bucket).cloned();
            for (key, value) in keys.unwrap_or_default() {
                f(&key, &value)?;
            }
            Ok(())
        }

        async fn get(&self, bucket: &[u8], key: &[u8]) -> StateResult<Option<Vec<u8>>> {
            Ok(self
                .buckets
                .lock()
                .unwrap()
                .get(bucket)
                .and_then(|keys| keys.get(key))
                .cloned())
        }

        async fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> StateResult<()> {
            self.buckets
                .lock()
                .unwrap()
                .entry(bucket.to_vec())
                .or_default()
                .insert(key.to_vec(), value.to_vec());
            Ok(())
        }
    }

}
