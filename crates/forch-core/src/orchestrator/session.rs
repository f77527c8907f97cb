use crate::monitor::{ChangedFiles, Subscription};
use crate::types::Feature;

/// One active attempt at a feature. Exists from handoff until completion,
/// terminal failure, or reset.
#[derive(Debug)]
pub struct ExecutionSession {
    pub feature: Feature,
    pub status_message: String,
    changed_files: ChangedFiles,
    subscription: Option<Subscription>,
}

impl ExecutionSession {
    pub fn new(feature: Feature) -> Self {
        Self {
            feature,
            status_message: String::new(),
            changed_files: ChangedFiles::new(),
            subscription: None,
        }
    }

    pub fn changed_files(&self) -> &ChangedFiles {
        &self.changed_files
    }

    pub fn changed_file_count(&self) -> usize {
        self.changed_files.count()
    }

    /// Replaces (and releases) any previous subscription.
    pub fn attach(&mut self, subscription: Subscription) {
        self.stop_monitoring();
        self.subscription = Some(subscription);
    }

    pub fn stop_monitoring(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.unsubscribe();
        }
    }
}

impl Drop for ExecutionSession {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
