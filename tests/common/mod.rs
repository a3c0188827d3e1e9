//! Common test utilities for driving lookups in a controlled order
#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::FutureExt;
use playlist_seeder::ResolvedArtist;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub type Outcome = Result<Option<ResolvedArtist>, String>;

/// Lookups that block until the test releases them, one gate per name
#[derive(Default)]
pub struct Gates {
    pending: Mutex<HashMap<String, oneshot::Receiver<Outcome>>>,
    pub invoked: AtomicUsize,
    pub settled: AtomicUsize,
}

impl Gates {
    pub fn new(names: &[&str]) -> (Arc<Self>, HashMap<String, oneshot::Sender<Outcome>>) {
        let gates = Self::default();
        let mut senders = HashMap::new();
        {
            let mut pending = gates.pending.lock().unwrap();
            for name in names {
                let (tx, rx) = oneshot::channel();
                pending.insert((*name).to_string(), rx);
                senders.insert((*name).to_string(), tx);
            }
        }
        (Arc::new(gates), senders)
    }

    pub async fn lookup(&self, name: String) -> Outcome {
        let gate = self.pending.lock().unwrap().remove(&name);
        let outcome = match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| Err("gate dropped".to_string())),
            None => Err(format!("no gate for {name}")),
        };
        self.settled.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    /// A lookup function suitable for `start_batch`/`resolve_all`
    pub fn lookup_fn(self: &Arc<Self>) -> impl Fn(String) -> BoxFuture<'static, Outcome> {
        let gates = Arc::clone(self);
        move |name| {
            gates.invoked.fetch_add(1, Ordering::SeqCst);
            let gates = Arc::clone(&gates);
            async move { gates.lookup(name).await }.boxed()
        }
    }

    pub fn settled(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }

    /// Poll until `count` lookups have returned
    pub async fn wait_settled(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.settled() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("lookups did not settle in time");
    }
}

pub fn release(
    senders: &mut HashMap<String, oneshot::Sender<Outcome>>,
    name: &str,
    outcome: Outcome,
) {
    let sender = senders.remove(name).expect("no gate for name");
    sender.send(outcome).expect("lookup is no longer waiting");
}

pub fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}
