//! Route table and the dirty-file navigation blocker.

use std::sync::{Mutex, MutexGuard};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::alerts::{messages, AlertController};
use crate::sync::OperationClass;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub pathname: String,
    /// Query string without the leading `?`.
    #[serde(default)]
    pub search: String,
}

impl Location {
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            search: String::new(),
        }
    }

    /// Value of query parameter `key`, percent-decoded.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let url = Url::parse(&format!("{}{}", ROUTE_BASE, self)).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.search.is_empty() {
            write!(f, "{}", self.pathname)
        } else {
            write!(f, "{}?{}", self.pathname, self.search)
        }
    }
}

const ROUTE_BASE: &str = "http://sandbox.local";

fn with_query(pathname: &str, params: &[(&str, &str)]) -> Location {
    let search = Url::parse_with_params(ROUTE_BASE, params)
        .ok()
        .and_then(|url| url.query().map(str::to_string))
        .unwrap_or_default();
    Location {
        pathname: pathname.to_string(),
        search,
    }
}

pub mod routes {
    use super::{with_query, Location};

    pub fn home() -> Location {
        Location::new("/")
    }

    /// `/import?url=<url>[&branch=<branch>]`.
    pub fn import(url: &str, branch: Option<&str>) -> Location {
        match branch {
            Some(branch) => with_query("/import", &[("url", url), ("branch", branch)]),
            None => with_query("/import", &[("url", url)]),
        }
    }

    /// `/<workspace id>/file/<relative path>`.
    pub fn workspace_with_file_path(workspace_id: &str, file_relative_path: &str) -> Location {
        Location::new(format!(
            "/{}/file/{}",
            workspace_id,
            file_relative_path.trim_start_matches('/')
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Navigated(Location),
    /// Held back by the blocker; see [`Navigator::last_blocked_location`].
    Blocked,
}

#[derive(Debug)]
struct NavigatorState {
    current: Location,
    blocking: bool,
    last_blocked: Option<Location>,
}

/// Tracks the current location and intercepts navigation while a file is dirty.
pub struct Navigator {
    state: Mutex<NavigatorState>,
    alerts: Option<AlertController>,
}

impl Navigator {
    pub fn new(start: Location) -> Self {
        Self {
            state: Mutex::new(NavigatorState {
                current: start,
                blocking: false,
                last_blocked: None,
            }),
            alerts: None,
        }
    }

    /// Shows an "unsaved changes" alert whenever navigation is blocked.
    pub fn with_alerts(mut self, alerts: AlertController) -> Self {
        self.alerts = Some(alerts);
        self
    }

    fn lock(&self) -> MutexGuard<'_, NavigatorState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn current(&self) -> Location {
        self.lock().current.clone()
    }

    pub fn is_blocking(&self) -> bool {
        self.lock().blocking
    }

    pub fn last_blocked_location(&self) -> Option<Location> {
        self.lock().last_blocked.clone()
    }

    /// Arms the blocker, e.g. when the open file becomes dirty.
    pub fn block(&self) {
        self.lock().blocking = true;
    }

    pub fn replace(&self, location: Location) -> NavigationDecision {
        let blocked = {
            let mut state = self.lock();
            if state.blocking {
                state.last_blocked = Some(location.clone());
                true
            } else {
                state.current = location.clone();
                false
            }
        };

        if blocked {
            log::debug!("Navigation to {} blocked by unsaved changes", location);
            if let Some(alerts) = &self.alerts {
                alerts.show(messages::unsaved_changes());
            }
            NavigationDecision::Blocked
        } else {
            NavigationDecision::Navigated(location)
        }
    }

    /// Disarms the blocker and resumes the last blocked navigation, if any.
    pub fn unblock(&self) -> Option<Location> {
        let resumed = {
            let mut state = self.lock();
            state.blocking = false;
            let resumed = state.last_blocked.take();
            if let Some(location) = &resumed {
                state.current = location.clone();
            }
            resumed
        };
        if let Some(alerts) = &self.alerts {
            alerts.close(OperationClass::Navigation);
        }
        resumed
    }

    /// Drops a pending blocked navigation and stays put, blocker still armed.
    pub fn cancel_blocked(&self) {
        self.lock().last_blocked = None;
        if let Some(alerts) = &self.alerts {
            alerts.close(OperationClass::Navigation);
        }
    }

    /// Navigates regardless of the blocker, which stays as it was.
    pub fn replace_bypassing(&self, location: Location) -> Location {
        self.lock().current = location.clone();
        location
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(routes::home())
    }
}
