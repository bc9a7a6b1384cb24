use std::collections::HashMap;
use std::sync::Arc;

use super::NodeRunner;

/// Registry of node implementations by logical name.
#[derive(Default)]
pub struct NodeRunnerRegistry {
    runners: HashMap<String, Arc<dyn NodeRunner>>,
}

impl NodeRunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, runner: Arc<dyn NodeRunner>) {
        self.runners.insert(name.to_string(), runner);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NodeRunner>> {
        self.runners.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.runners.contains_key(name)
    }
}
