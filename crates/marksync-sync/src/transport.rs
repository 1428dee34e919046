//! Transport abstraction for the sync round trip.
//!
//! The transport carries one [`SyncRequest`] to the server and brings back
//! its [`SyncResponse`]. Timeouts and credential handling belong here, not
//! in the engine.

use std::sync::Arc;

use async_trait::async_trait;

use marksync_core::{SyncRequest, SyncResponse};

use crate::error::Result;

/// Transport trait for the sync exchange.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and wait for the server's answer.
    async fn exchange(&self, request: &SyncRequest) -> Result<SyncResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn exchange(&self, request: &SyncRequest) -> Result<SyncResponse> {
        (**self).exchange(request).await
    }
}

/// A scripted in-memory transport for testing.
///
/// Responses are served in the order they were pushed; once the script runs
/// out, an empty response with `currentVersion = 0` is returned. Every
/// request is captured. [`pause`](memory::MockTransport::pause) holds
/// exchanges open until [`resume`](memory::MockTransport::resume), which
/// lets tests act while a round trip is in flight.
pub mod memory {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::watch;

    use crate::error::SyncError;

    /// In-memory transport implementation.
    pub struct MockTransport {
        script: Mutex<VecDeque<Result<SyncResponse>>>,
        requests: Mutex<Vec<SyncRequest>>,
        calls: watch::Sender<usize>,
        paused: watch::Sender<bool>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                calls: watch::Sender::new(0),
                paused: watch::Sender::new(false),
            }
        }

        /// Queue a successful response.
        pub fn push_response(&self, response: SyncResponse) {
            self.push(Ok(response));
        }

        /// Queue a failure.
        pub fn push_error(&self, error: SyncError) {
            self.push(Err(error));
        }

        fn push(&self, outcome: Result<SyncResponse>) {
            if let Ok(mut script) = self.script.lock() {
                script.push_back(outcome);
            }
        }

        /// Hold subsequent exchanges open until [`resume`](Self::resume).
        pub fn pause(&self) {
            self.paused.send_replace(true);
        }

        /// Release held exchanges.
        pub fn resume(&self) {
            self.paused.send_replace(false);
        }

        /// Number of exchanges started so far.
        pub fn calls(&self) -> usize {
            *self.calls.borrow()
        }

        /// Every request received so far.
        pub fn requests(&self) -> Vec<SyncRequest> {
            self.requests
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default()
        }

        /// The most recent request.
        pub fn last_request(&self) -> Option<SyncRequest> {
            self.requests().pop()
        }

        /// Wait until at least `n` exchanges have started.
        pub async fn wait_for_requests(&self, n: usize) {
            let mut calls = self.calls.subscribe();
            let _ = calls.wait_for(|c| *c >= n).await;
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn exchange(&self, request: &SyncRequest) -> Result<SyncResponse> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            self.calls.send_modify(|c| *c += 1);

            let mut paused = self.paused.subscribe();
            let _ = paused.wait_for(|p| !*p).await;

            let next = self
                .script
                .lock()
                .map_err(|_| SyncError::Transport("mock script poisoned".into()))?
                .pop_front();
            next.unwrap_or_else(|| Ok(SyncResponse::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MockTransport;
    use super::*;
    use crate::error::SyncError;
    use marksync_core::SyncVersion;

    fn request(version: u64) -> SyncRequest {
        SyncRequest {
            last_sync_version: SyncVersion(version),
            changes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_serves_script_in_order() {
        let transport = MockTransport::new();
        transport.push_response(SyncResponse::new(Vec::new(), 10));
        transport.push_error(SyncError::Transport("down".into()));

        let first = transport.exchange(&request(1)).await.unwrap();
        assert_eq!(first.current_version, SyncVersion(10));
        assert!(transport.exchange(&request(2)).await.is_err());
        // Script exhausted.
        let third = transport.exchange(&request(3)).await.unwrap();
        assert!(third.current_version.is_never_synced());

        assert_eq!(transport.calls(), 3);
        assert_eq!(
            transport.last_request().unwrap().last_sync_version,
            SyncVersion(3)
        );
    }

    #[tokio::test]
    async fn test_mock_pause_holds_exchange() {
        let transport = Arc::new(MockTransport::new());
        transport.pause();

        let handle = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.exchange(&request(1)).await })
        };

        transport.wait_for_requests(1).await;
        assert!(!handle.is_finished());

        transport.resume();
        assert!(handle.await.unwrap().is_ok());
    }
}
