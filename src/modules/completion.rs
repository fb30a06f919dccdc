/// Decides when the load pass is complete.
///
/// `total` starts at the number of registered modules and shrinks by one per
/// skipped module; the pass is complete once the number of processed enabled
/// modules reaches it. Fires at most once.
#[derive(Debug)]
pub(super) struct Completion {
    total: usize,
    initialised: usize,
    fired: bool,
}

impl Completion {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            initialised: 0,
            fired: false,
        }
    }

    /// A disabled module was passed over. Returns `true` if this completes
    /// the pass.
    pub fn skip(&mut self) -> bool {
        self.total = self.total.saturating_sub(1);
        self.check()
    }

    /// An enabled module was processed (whatever its hook returned).
    pub fn loaded(&mut self) -> bool {
        self.initialised += 1;
        self.check()
    }

    /// End of the pass; completes an empty one.
    pub fn finish(&mut self) -> bool {
        self.check()
    }

    fn check(&mut self) -> bool {
        if self.fired || self.initialised < self.total {
            return false;
        }
        self.fired = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_last_enabled_module() {
        let mut c = Completion::new(2);
        assert!(!c.loaded());
        assert!(c.loaded());
        assert!(!c.finish());
    }

    #[test]
    fn fires_when_trailing_modules_are_skipped() {
        let mut c = Completion::new(3);
        assert!(!c.loaded());
        assert!(!c.skip());
        assert!(c.skip());
    }

    #[test]
    fn fires_when_everything_is_skipped() {
        let mut c = Completion::new(2);
        assert!(!c.skip());
        assert!(c.skip());
    }

    #[test]
    fn empty_pass_fires_on_finish() {
        let mut c = Completion::new(0);
        assert!(c.finish());
        assert!(!c.finish());
    }
}
