//! The frozen result of a startup run.

use std::sync::{Arc, PoisonError, RwLock};

use xuad_types::{AppIdentity, ConfigSnapshot, Strategy};

/// Everything scheduling needs once startup has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdSession {
    pub snapshot: ConfigSnapshot,
    /// Parsed strategy; always `None` when ads are off.
    pub strategy: Option<Strategy>,
    pub device_id: String,
    pub identity: AppIdentity,
}

impl AdSession {
    #[must_use]
    pub const fn ads_enabled(&self) -> bool {
        self.snapshot.ads_enabled()
    }

    /// The strategy to schedule against, if ads are on and one parsed.
    #[must_use]
    pub fn active_strategy(&self) -> Option<&Strategy> {
        if self.ads_enabled() {
            self.strategy.as_ref()
        } else {
            None
        }
    }
}

/// Shared slot holding the most recently published session.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<Arc<AdSession>>>>,
}

impl SessionSlot {
    #[must_use]
    pub fn current(&self) -> Option<Arc<AdSession>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish(&self, session: Arc<AdSession>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }
}

#[cfg(test)]
mod tests {
    use xuad_types::AdEnabled;

    use super::*;

    fn session(enabled: AdEnabled) -> AdSession {
        AdSession {
            snapshot: ConfigSnapshot {
                ad_enabled: enabled,
                ..ConfigSnapshot::default()
            },
            strategy: Some(Strategy::default()),
            device_id: "device".to_string(),
            identity: AppIdentity::default(),
        }
    }

    #[test]
    fn strategy_hidden_when_ads_off() {
        assert!(session(AdEnabled::Value(0)).active_strategy().is_none());
        assert!(session(AdEnabled::Unset).active_strategy().is_none());
        assert!(session(AdEnabled::Value(1)).active_strategy().is_some());
    }

    #[test]
    fn slot_replaces_published_session() {
        let slot = SessionSlot::default();
        assert!(slot.current().is_none());

        slot.publish(Arc::new(session(AdEnabled::Value(0))));
        slot.publish(Arc::new(session(AdEnabled::Value(1))));
        assert!(slot.current().unwrap().ads_enabled());
    }
}
