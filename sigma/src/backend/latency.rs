use std::{future::Future, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use tokio::time::{Instant, sleep_until};

use crate::{
    backend::{Backend, BackendProfile, StoredRecord},
    errors::StorageError,
    record::RecordWrite,
    token::{TokenIssuer, VersionToken},
    trace,
};

/// Wraps a backend so that no call completes before `latency` has elapsed
/// since the call was made, to stand in for a network-bound store in tests.
///
/// The delay is a timer awaited after the inner call returns; no lock is
/// held meanwhile, so concurrent calls overlap freely.
#[derive(Debug)]
pub struct Delayed<B> {
    inner: B,
    latency: Duration,
    mock_calls_only: bool,
    issuer: TokenIssuer,
}

impl<B: Backend> Delayed<B> {
    pub fn new(inner: B, latency: Duration) -> Self {
        Self {
            inner,
            latency,
            mock_calls_only: false,
            issuer: TokenIssuer::new(),
        }
    }

    /// Only simulate the calls: the inner backend is never touched, reads
    /// find nothing and writes succeed with a fresh token.
    pub fn mock_calls_only(mut self, mock_calls_only: bool) -> Self {
        self.mock_calls_only = mock_calls_only;
        self
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn delayed<T>(&self, op: &'static str, call: impl Future<Output = T>) -> T {
        let deadline = Instant::now() + self.latency;
        let output = call.await;

        trace!(op, latency = ?self.latency, "delaying backend call");
        sleep_until(deadline).await;

        output
    }
}

impl<B: Backend> Backend for Delayed<B> {
    fn profile(&self) -> &BackendProfile {
        self.inner.profile()
    }

    fn get_record<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StorageError>> {
        self.delayed("get", async move {
            if self.mock_calls_only {
                return Ok(None);
            }
            self.inner.get_record(key).await
        })
        .boxed()
    }

    fn put_record<'a>(
        &'a self,
        key: &'a str,
        write: RecordWrite,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<VersionToken, StorageError>> {
        self.delayed("put", async move {
            if self.mock_calls_only {
                return Ok(self.issuer.issue());
            }
            self.inner.put_record(key, write, expected).await
        })
        .boxed()
    }

    fn delete_record<'a>(
        &'a self,
        key: &'a str,
        expected: &'a VersionToken,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        self.delayed("delete", async move {
            if self.mock_calls_only {
                return Ok(());
            }
            self.inner.delete_record(key, expected).await
        })
        .boxed()
    }
}
