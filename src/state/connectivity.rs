use tokio::sync::watch;

/// Online/offline flag for the store connection.
///
/// Starts offline; the storage supervisor flips it once a backend is installed.
pub struct Connectivity {
    online: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new() -> Self {
        let (online, _rx) = watch::channel(false);
        Self { online }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Record a new value; returns `true` when it differs from the previous one.
    pub fn set_online(&self, value: bool) -> bool {
        self.online.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Subscribe to online/offline transitions.
    pub fn watcher(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}
