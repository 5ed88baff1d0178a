use std::collections::HashSet;

use async_trait::async_trait;

use aurora_config::DirectoryConfig;
use aurora_foundation::{DestinationDirectory, DispatchResult};

/// Destinations listed in configuration, in order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct StaticDestinationDirectory {
    destinations: Vec<String>,
}

impl StaticDestinationDirectory {
    pub fn new<I, S>(destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let destinations = destinations
            .into_iter()
            .map(Into::into)
            .filter(|d: &String| !d.is_empty() && seen.insert(d.clone()))
            .collect();
        Self { destinations }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(config.known_destinations.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

#[async_trait]
impl DestinationDirectory for StaticDestinationDirectory {
    async fn list_known_destinations(&self) -> DispatchResult<Vec<String>> {
        Ok(self.destinations.clone())
    }
}
