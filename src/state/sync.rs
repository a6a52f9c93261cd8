use tokio::sync::watch;

/// Process-wide "a write is in flight" flag.
pub struct SyncFlag {
    syncing: watch::Sender<bool>,
}

impl SyncFlag {
    pub fn new() -> Self {
        let (syncing, _rx) = watch::channel(false);
        Self { syncing }
    }

    pub fn is_syncing(&self) -> bool {
        *self.syncing.borrow()
    }

    /// Raise the flag. Returns `None` when another write already holds it.
    pub fn try_begin(&self) -> Option<SyncGuard<'_>> {
        let acquired = self.syncing.send_if_modified(|current| {
            if *current {
                false
            } else {
                *current = true;
                true
            }
        });
        acquired.then_some(SyncGuard { flag: self })
    }

    pub fn watcher(&self) -> watch::Receiver<bool> {
        self.syncing.subscribe()
    }
}

impl Default for SyncFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowers the flag when dropped, whatever the outcome of the write.
pub struct SyncGuard<'a> {
    flag: &'a SyncFlag,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.syncing.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_writer_is_turned_away() {
        let flag = SyncFlag::new();
        let guard = flag.try_begin().expect("first writer");
        assert!(flag.is_syncing());
        assert!(flag.try_begin().is_none());
        drop(guard);
        assert!(!flag.is_syncing());
        assert!(flag.try_begin().is_some());
    }

    #[test]
    fn flag_is_released_on_early_return() {
        fn failing_write(flag: &SyncFlag) -> Result<(), &'static str> {
            let _guard = flag.try_begin().ok_or("busy")?;
            Err("store rejected write")
        }

        let flag = SyncFlag::new();
        assert!(failing_write(&flag).is_err());
        assert!(!flag.is_syncing());
    }
}
