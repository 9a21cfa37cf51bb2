//! Test doubles shared across modules.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::brain::{ChatRequest, OracleClient, ProviderError, ProviderType};

/// Replays canned replies in order; errors once the script runs out.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn chat(&self, _request: ChatRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::NotAvailable("script exhausted".to_string())))
    }
}
