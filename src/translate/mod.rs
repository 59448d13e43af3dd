pub mod instant_actions;
pub mod order;
pub mod uplink;

/// Monotonic `{prefix}_{counter}` task id generator, scoped to a single translation call
/// per spec.md's translator-purity design note.
pub(crate) struct TaskIdCounter {
    prefix: String,
    next: u32,
}

impl TaskIdCounter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}_{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}
