// InstrumentedPersistentState: logs every call to an inner PersistentState

use crate::error::StateResult;
use crate::logging::{info_or_error, Attr, Value};
use crate::port::{ForEachFn, Logger, PersistentState};
use async_trait::async_trait;
use std::sync::Arc;

/// Decorator that forwards every call to `state` unchanged and emits one
/// record per call to `logger`
///
/// `for_each` also emits one record per visited pair.
pub struct InstrumentedPersistentState {
    state: Arc<dyn PersistentState>,
    logger: Arc<dyn Logger>,
}

impl InstrumentedPersistentState {
    pub fn new(state: Arc<dyn PersistentState>, logger: Arc<dyn Logger>) -> Self {
        Self { state, logger }
    }
}

#[async_trait]
impl PersistentState for InstrumentedPersistentState {
    async fn close(&self) -> StateResult<()> {
        let result = self.state.close().await;
        info_or_error(self.logger.as_ref(), "Close", result.as_ref().err(), vec![]);
        result
    }

    async fn copy_to(&self, dest: &dyn PersistentState) -> StateResult<()> {
        let result = self.state.copy_to(dest).await;
        info_or_error(self.logger.as_ref(), "CopyTo", result.as_ref().err(), vec![]);
        result
    }

    async fn data(&self) -> StateResult<serde_json::Value> {
        let result = self.state.data().await;
        let data = match &result {
            Ok(data) => Attr::json("data", data.clone()),
            Err(_) => Attr::new("data", Value::Null),
        };
        info_or_error(self.logger.as_ref(), "Data", result.as_ref().err(), vec![data]);
        result
    }

    async fn delete(&self, bucket: &[u8], key: &[u8]) -> StateResult<()> {
        let result = self.state.delete(bucket, key).await;
        info_or_error(
            self.logger.as_ref(),
            "Delete",
            result.as_ref().err(),
            vec![Attr::bytes("bucket", bucket), Attr::bytes("key", key)],
        );
        result
    }

    async fn delete_bucket(&self, bucket: &[u8]) -> StateResult<()> {
        let result = self.state.delete_bucket(bucket).await;
        info_or_error(
            self.logger.as_ref(),
            "DeleteBucket",
            result.as_ref().err(),
            vec![Attr::bytes("bucket", bucket)],
        );
        result
    }

    async fn for_each(&self, bucket: &[u8], f: &mut ForEachFn<'_>) -> StateResult<()> {
        let logger = self.logger.as_ref();
        let mut logged = |key: &[u8], value: &[u8]| {
            let result = f(key, value);
            info_or_error(
                logger,
                "ForEach",
                result.as_ref().err(),
                vec![
                    Attr::bytes("bucket", bucket),
                    Attr::bytes("key", key),
                    Attr::bytes("value", value),
                ],
            );
            result
        };
        let result = self.state.for_each(bucket, &mut logged).await;
        info_or_error(
            logger,
            "ForEach",
            result.as_ref().err(),
            vec![Attr::bytes("bucket", bucket)],
        );
        result
    }

    async fn get(&self, bucket: &[u8], key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        let result = self.state.get(bucket, key).await;
        let value = result.as_ref().ok().and_then(|v| v.as_deref());
        info_or_error(
            self.logger.as_ref(),
            "Get",
            result.as_ref().err(),
            vec![
                Attr::bytes("bucket", bucket),
                Attr::bytes("key", key),
                Attr::opt_bytes("value", value),
            ],
        );
        result
    }

    async fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> StateResult<()> {
        let result = self.state.set(bucket, key, value).await;
        info_or_error(
            self.logger.as_ref(),
            "Set",
            result.as_ref().err(),
            vec![
                Attr::bytes("bucket", bucket),
                Attr::bytes("key", key),
                Attr::bytes("value", value),
            ],
        );
        result
    }
}
