use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::LiveError;

/// Result of one strategy attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// Strategy produced a value; the chain stops here
    Found(T),
    /// Strategy does not apply to this input
    Skip,
    /// Strategy applied but failed; the chain moves on
    Failed(String),
    /// Strategy found a definitive answer that must not be overridden
    Abort(LiveError),
}

/// One way of turning an input string into a value
#[async_trait::async_trait]
pub trait Strategy<T: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, input: &str) -> Attempt<T>;
}

/// Why a chain produced nothing
#[derive(Debug)]
pub enum ChainError {
    /// Every strategy skipped or failed; failures are `(strategy, reason)`
    Exhausted(Vec<(&'static str, String)>),
    Aborted(LiveError),
}

impl ChainError {
    /// Joined failure reasons, for error messages
    pub fn summary(&self) -> String {
        match self {
            ChainError::Exhausted(failures) if failures.is_empty() => {
                "no strategy applied".to_string()
            }
            ChainError::Exhausted(failures) => failures
                .iter()
                .map(|(name, reason)| format!("{}: {}", name, reason))
                .collect::<Vec<_>>()
                .join("; "),
            ChainError::Aborted(e) => e.to_string(),
        }
    }
}

/// Ordered list of strategies, first success wins
///
/// Results from different strategies are never merged.
pub struct FallbackChain<T: Send> {
    strategies: Vec<Arc<dyn Strategy<T>>>,
}

impl<T: Send> FallbackChain<T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn with(mut self, strategy: impl Strategy<T> + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the strategies in order; returns the value and the winning strategy's name
    pub async fn run(&self, input: &str) -> Result<(T, &'static str), ChainError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match strategy.attempt(input).await {
                Attempt::Found(value) => {
                    debug!("{} resolved {:?}", strategy.name(), input);
                    return Ok((value, strategy.name()));
                }
                Attempt::Skip => continue,
                Attempt::Failed(reason) => {
                    warn!("{} failed for {:?}: {}", strategy.name(), input, reason);
                    failures.push((strategy.name(), reason));
                }
                Attempt::Abort(error) => return Err(ChainError::Aborted(error)),
            }
        }

        Err(ChainError::Exhausted(failures))
    }
}

impl<T: Send> Default for FallbackChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
