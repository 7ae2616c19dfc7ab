use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    ExploreTables,
    ExploreViews,
    SqlPlayground,
    Insights,
    Overview,
}

impl Destination {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ExploreTables => "Explore Tables",
            Self::ExploreViews => "Explore Views",
            Self::SqlPlayground => "SQL Playground",
            Self::Insights => "Insights",
            Self::Overview => "Overview",
        }
    }

    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            Self::ExploreTables => "Tables",
            Self::ExploreViews => "Database Views",
            Self::SqlPlayground => "Write and Run Custom SQL Queries",
            Self::Insights => "Analytics & Insights",
            Self::Overview => "Key Metrics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("no destinations configured")]
    NoDestinations,
    #[error("`{}` is not offered by this dashboard", .0.label())]
    Unavailable(Destination),
    #[error("no destination at position {0}")]
    OutOfRange(usize),
}

/// Which destination is active. Starts on the first one listed and never
/// terminates; page state lives with the caller and is rebuilt on every
/// transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    destinations: Vec<Destination>,
    active: usize,
}

impl Shell {
    pub fn new(destinations: Vec<Destination>) -> Result<Self, ShellError> {
        if destinations.is_empty() {
            return Err(ShellError::NoDestinations);
        }
        Ok(Self {
            destinations,
            active: 0,
        })
    }

    #[must_use]
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    #[must_use]
    pub fn active(&self) -> Destination {
        self.destinations[self.active]
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn select(&mut self, destination: Destination) -> Result<Destination, ShellError> {
        let index = self
            .destinations
            .iter()
            .position(|candidate| *candidate == destination)
            .ok_or(ShellError::Unavailable(destination))?;
        self.active = index;
        Ok(destination)
    }

    pub fn select_index(&mut self, index: usize) -> Result<Destination, ShellError> {
        if index >= self.destinations.len() {
            return Err(ShellError::OutOfRange(index));
        }
        self.active = index;
        Ok(self.active())
    }

    pub fn next(&mut self) -> Destination {
        self.active = (self.active + 1) % self.destinations.len();
        self.active()
    }

    pub fn previous(&mut self) -> Destination {
        self.active = self
            .active
            .checked_sub(1)
            .unwrap_or(self.destinations.len() - 1);
        self.active()
    }
}
