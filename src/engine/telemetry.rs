//! Analytic handler hooks. All methods default to no-ops so hosts attach
//! only what they care about.

pub trait AnalyticHandlers: Send + Sync {
    fn on_chain_start(&self, _agentflow_id: &str, _input: &str) {}
    fn on_chain_end(&self, _agentflow_id: &str, _output: &str) {}
    fn on_chain_error(&self, _agentflow_id: &str, _error: &str) {}
}

/// Handler that records nothing.
pub struct NoopAnalyticHandlers;

impl AnalyticHandlers for NoopAnalyticHandlers {}
