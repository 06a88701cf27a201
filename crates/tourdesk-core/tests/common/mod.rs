//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tourdesk_core::{EncodedBody, Transport, TransportError};

static TRACING: Once = Once::new();

/// Install a test subscriber once; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn envelope(payload: Value, message: &str) -> Bytes {
    Bytes::from(json!({ "payload": payload, "message": message }).to_string())
}

type Reply = Result<Bytes, TransportError>;

/// In-memory transport that counts calls and replays scripted responses.
///
/// Unscripted GETs answer `["v<n>"]` where `n` is the zero-based call number.
#[derive(Default)]
pub struct FakeTransport {
    gets: AtomicUsize,
    get_replies: Mutex<VecDeque<Reply>>,
    holds: Mutex<VecDeque<oneshot::Receiver<()>>>,
    posts: Mutex<Vec<(String, EncodedBody)>>,
    post_replies: Mutex<VecDeque<Reply>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn push_get(&self, reply: Reply) {
        self.get_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_post(&self, reply: Reply) {
        self.post_replies.lock().unwrap().push_back(reply);
    }

    /// The next GET waits until the returned sender fires (or is dropped).
    pub fn hold_next_get(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds.lock().unwrap().push_back(rx);
        tx
    }

    pub fn posts(&self) -> Vec<(String, EncodedBody)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, _path: &str) -> Result<Bytes, TransportError> {
        let n = self.gets.fetch_add(1, Ordering::SeqCst);
        let hold = self.holds.lock().unwrap().pop_front();
        let reply = self.get_replies.lock().unwrap().pop_front();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        reply.unwrap_or_else(|| Ok(envelope(json!([format!("v{n}")]), "ok")))
    }

    async fn post(&self, path: &str, body: EncodedBody) -> Result<Bytes, TransportError> {
        self.posts.lock().unwrap().push((path.to_string(), body));
        let reply = self.post_replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Ok(envelope(json!({}), "Created")))
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
