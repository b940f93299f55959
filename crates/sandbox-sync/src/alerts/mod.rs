//! User-facing notifications, at most one visible per [`OperationClass`].
//!
//! [`AlertController::show`] replaces whatever alert the class currently
//! shows; subscribers receive a `Closed` event for the replaced alert before
//! the `Shown` event for the new one. Alerts with an auto-close duration are
//! closed by a tokio timer, unless they were replaced first.

pub mod messages;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::sync::{OperationClass, RecoveryAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertVariant {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub class: OperationClass,
    pub variant: AlertVariant,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Offered actions, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<RecoveryAction>,
    /// `None` keeps the alert until it is closed or replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_close_ms: Option<u64>,
}

impl Alert {
    pub fn new(class: OperationClass, variant: AlertVariant, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            class,
            variant,
            title: title.into(),
            body: None,
            actions: Vec::new(),
            auto_close_ms: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_action(mut self, action: RecoveryAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn auto_close(mut self, after: Duration) -> Self {
        self.auto_close_ms = Some(after.as_millis() as u64);
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.auto_close_ms.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlertEvent {
    Shown(Alert),
    Closed { class: OperationClass, id: String },
}

#[derive(Clone)]
pub struct AlertController {
    visible: Arc<Mutex<HashMap<OperationClass, Alert>>>,
    sender: broadcast::Sender<AlertEvent>,
}

impl AlertController {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            visible: Arc::new(Mutex::new(HashMap::new())),
            sender,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationClass, Alert>> {
        // A panic while holding the map cannot leave it inconsistent.
        self.visible
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn send(&self, event: AlertEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }

    /// Shows `alert`, closing the one its class currently shows. Returns the alert id.
    pub fn show(&self, alert: Alert) -> String {
        let id = alert.id.clone();
        let class = alert.class;
        let auto_close = alert.auto_close_ms.map(Duration::from_millis);

        let replaced = self.lock().insert(class, alert.clone());
        if let Some(previous) = replaced {
            self.send(AlertEvent::Closed {
                class,
                id: previous.id,
            });
        }
        log::debug!("Alert [{}] {}", class, alert.title);
        self.send(AlertEvent::Shown(alert));

        if let Some(after) = auto_close {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let controller = self.clone();
                    let alert_id = id.clone();
                    handle.spawn(async move {
                        tokio::time::sleep(after).await;
                        controller.close_if(class, &alert_id);
                    });
                }
                Err(_) => log::debug!("No runtime; alert {} stays until closed", id),
            }
        }

        id
    }

    /// Closes the alert shown for `class`, if any.
    pub fn close(&self, class: OperationClass) -> bool {
        let removed = self.lock().remove(&class);
        match removed {
            Some(alert) => {
                self.send(AlertEvent::Closed {
                    class,
                    id: alert.id,
                });
                true
            }
            None => false,
        }
    }

    /// Closes the alert for `class` only if it is still `id`.
    pub fn close_if(&self, class: OperationClass, id: &str) -> bool {
        let removed = {
            let mut visible = self.lock();
            match visible.get(&class) {
                Some(alert) if alert.id == id => visible.remove(&class),
                _ => None,
            }
        };
        match removed {
            Some(alert) => {
                self.send(AlertEvent::Closed {
                    class,
                    id: alert.id,
                });
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) {
        let drained: Vec<Alert> = self.lock().drain().map(|(_, alert)| alert).collect();
        for alert in drained {
            self.send(AlertEvent::Closed {
                class: alert.class,
                id: alert.id,
            });
        }
    }

    pub fn current(&self, class: OperationClass) -> Option<Alert> {
        self.lock().get(&class).cloned()
    }

    /// Visible alerts, ordered by class.
    pub fn visible(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.lock().values().cloned().collect();
        alerts.sort_by_key(|a| a.class);
        alerts
    }
}

impl Default for AlertController {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://github.com/o/r.git";

    #[test]
    fn test_one_alert_per_class() {
        let alerts = AlertController::default();
        alerts.show(messages::pushing(URL));
        alerts.show(messages::pushing(URL));

        let visible = alerts.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].class, OperationClass::Push);
    }

    #[test]
    fn test_classes_are_independent() {
        let alerts = AlertController::default();
        alerts.show(messages::pushing(URL));
        alerts.show(messages::pulling(URL));
        assert_eq!(alerts.visible().len(), 2);

        assert!(alerts.close(OperationClass::Push));
        assert!(!alerts.close(OperationClass::Push));
        assert_eq!(alerts.visible().len(), 1);
    }

    #[test]
    fn test_replacement_emits_close_before_show() {
        let alerts = AlertController::default();
        let mut rx = alerts.subscribe();

        let first = alerts.show(messages::pushing(URL));
        let second = alerts.show(messages::pushing(URL));

        assert!(matches!(rx.try_recv().unwrap(), AlertEvent::Shown(a) if a.id == first));
        assert!(matches!(rx.try_recv().unwrap(), AlertEvent::Closed { id, .. } if id == first));
        assert!(matches!(rx.try_recv().unwrap(), AlertEvent::Shown(a) if a.id == second));
    }

    #[test]
    fn test_close_if_ignores_replaced_alert() {
        let alerts = AlertController::default();
        let first = alerts.show(messages::pulling(URL));
        let second = alerts.show(messages::pulling(URL));

        assert!(!alerts.close_if(OperationClass::Pull, &first));
        assert!(alerts.close_if(OperationClass::Pull, &second));
        assert!(alerts.current(OperationClass::Pull).is_none());
    }

    #[test]
    fn test_close_all() {
        let alerts = AlertController::default();
        alerts.show(messages::pushing(URL));
        alerts.show(messages::gist_loading());
        alerts.close_all();
        assert!(alerts.visible().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_alert_auto_closes() {
        let alerts = AlertController::default();
        alerts.show(messages::push_success(URL, Duration::from_secs(4)));
        assert!(alerts.current(OperationClass::Push).is_some());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(alerts.current(OperationClass::Push).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_does_not_close_replacement() {
        let alerts = AlertController::default();
        alerts.show(messages::push_success(URL, Duration::from_secs(4)));
        tokio::time::sleep(Duration::from_secs(2)).await;
        let persistent = alerts.show(messages::pushing(URL));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            alerts.current(OperationClass::Push).map(|a| a.id),
            Some(persistent)
        );
    }
}
