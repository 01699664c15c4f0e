use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle state of an [`MqttClient`](crate::MqttClient).
///
/// ```text
/// Uninitialized → Initialized → Connected ⇄ Disconnected → Destroyed
/// ```
///
/// A failed connect leaves the state unchanged. A session the engine loses
/// or restores on its own (broker drop, reconnect, takeover) moves the state
/// between `Connected` and `Disconnected` as well. `init()` after `destroy()`
/// starts over at `Initialized`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientState {
    #[default]
    Uninitialized,
    Initialized,
    Connected,
    Disconnected,
    Destroyed,
}

impl ClientState {
    /// True while a handle exists.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Initialized | Self::Connected | Self::Disconnected
        )
    }
}

#[derive(Debug, Default)]
struct Inner {
    // Bumped on every init/destroy so that handlers captured for an earlier
    // handle cannot move the state of a later one.
    epoch: u64,
    state: ClientState,
}

/// State shared between the adapter and the connect-result wrappers it hands
/// to the engine.
#[derive(Debug, Clone, Default)]
pub(crate) struct Lifecycle(Arc<Mutex<Inner>>);

impl Lifecycle {
    pub fn state(&self) -> ClientState {
        self.lock().state
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn begin(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.state = ClientState::Initialized;
    }

    pub fn end(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.state = ClientState::Destroyed;
    }

    /// Move to `to` if `epoch` is still current and a handle is live.
    pub fn transition(&self, epoch: u64, to: ClientState) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch || !inner.state.is_live() {
            return false;
        }
        inner.state = to;
        true
    }

    /// Follow a session change reported by the engine itself.
    ///
    /// Only flips between `Connected` and `Disconnected`; a handle that was
    /// never connected, or was disconnected by the caller and not
    /// reconnected, is left alone.
    pub fn session_changed(&self, epoch: u64, connected: bool) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.state = match (inner.state, connected) {
            (ClientState::Connected, false) => ClientState::Disconnected,
            (ClientState::Disconnected, true) => ClientState::Connected,
            (state, _) => state,
        };
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_full_cycle() {
        // ---
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.state(), ClientState::Uninitialized);

        lifecycle.begin();
        let epoch = lifecycle.epoch();
        assert!(lifecycle.transition(epoch, ClientState::Connected));
        assert!(lifecycle.transition(epoch, ClientState::Disconnected));
        assert!(lifecycle.transition(epoch, ClientState::Connected));

        lifecycle.end();
        assert_eq!(lifecycle.state(), ClientState::Destroyed);
    }

    #[test]
    fn test_stale_epoch_is_ignored() {
        // ---
        let lifecycle = Lifecycle::default();
        lifecycle.begin();
        let stale = lifecycle.epoch();

        lifecycle.end();
        lifecycle.begin();

        assert!(!lifecycle.transition(stale, ClientState::Connected));
        assert_eq!(lifecycle.state(), ClientState::Initialized);
    }

    #[test]
    fn test_session_changes_follow_engine() {
        // ---
        let lifecycle = Lifecycle::default();
        lifecycle.begin();
        let epoch = lifecycle.epoch();

        // Never connected: engine reports are ignored.
        lifecycle.session_changed(epoch, true);
        assert_eq!(lifecycle.state(), ClientState::Initialized);

        lifecycle.transition(epoch, ClientState::Connected);
        lifecycle.session_changed(epoch, false);
        assert_eq!(lifecycle.state(), ClientState::Disconnected);

        lifecycle.session_changed(epoch, true);
        assert_eq!(lifecycle.state(), ClientState::Connected);

        lifecycle.end();
        lifecycle.session_changed(epoch, false);
        assert_eq!(lifecycle.state(), ClientState::Destroyed);
    }

    #[test]
    fn test_no_transition_without_handle() {
        // ---
        let lifecycle = Lifecycle::default();
        let epoch = lifecycle.epoch();
        assert!(!lifecycle.transition(epoch, ClientState::Connected));
        assert_eq!(lifecycle.state(), ClientState::Uninitialized);
    }
}
