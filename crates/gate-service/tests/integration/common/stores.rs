//! Parameter stores with scripted failure behavior.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gate_bus::{ParameterStore, StoreError, StoreResult};
use parking_lot::Mutex;

/// One scripted store response.
#[derive(Debug, Clone)]
pub enum Step {
    Value(&'static str),
    Absent,
    Fail,
}

/// Store that replays `steps` in order, then repeats the last one.
pub struct ScriptedStore {
    steps: Mutex<VecDeque<Step>>,
    reads: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParameterStore for ScriptedStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };
        match step.unwrap_or(Step::Absent) {
            Step::Value(v) => Ok(Some(v.to_string())),
            Step::Absent => Ok(None),
            Step::Fail => Err(StoreError::ReadFailed {
                key: key.to_string(),
                reason: "connection reset".to_string(),
            }),
        }
    }
}

/// Store whose reads never complete.
pub struct HangingStore;

#[async_trait]
impl ParameterStore for HangingStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        std::future::pending().await
    }
}
