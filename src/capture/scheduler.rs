//! Cancellable timers and animation-frame callbacks
//!
//! Nothing runs on its own: the host advances the clock and delivers frames,
//! and due tasks are handed back to the session to execute.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Debounce window for a buffered value elapsed
    CommitPending { selector: String },
    /// Structural watcher batch is ready
    FlushStructure,
    /// Re-check a released drag after layout settles
    RefineDrop { gesture: u64, frames_remaining: u8 },
}

#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    timers: Vec<(TaskId, u64, Task)>,
    frame_requests: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once the clock reaches `due_ms`
    pub fn schedule(&mut self, due_ms: u64, task: Task) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.timers.push((id, due_ms, task));
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|(t, _, _)| *t != id);
        self.timers.len() != before
    }

    /// Remove and return every task due at `now_ms`, earliest first
    pub fn take_due(&mut self, now_ms: u64) -> Vec<Task> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|(_, at, _)| *at <= now_ms);
        self.timers = pending;
        due.sort_by_key(|(id, at, _)| (*at, *id));
        due.into_iter().map(|(_, _, task)| task).collect()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|(_, at, _)| *at).min()
    }

    pub fn request_frame(&mut self, task: Task) {
        self.frame_requests.push(task);
    }

    /// Tasks requested before this frame; requests made while running them
    /// wait for the next one
    pub fn take_frame(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.frame_requests)
    }

    pub fn has_frame_requests(&self) -> bool {
        !self.frame_requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
        self.frame_requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(selector: &str) -> Task {
        Task::CommitPending {
            selector: selector.to_string(),
        }
    }

    #[test]
    fn test_due_tasks_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(300, commit("#b"));
        scheduler.schedule(100, commit("#a"));
        scheduler.schedule(900, Task::FlushStructure);

        assert!(scheduler.take_due(50).is_empty());
        assert_eq!(scheduler.take_due(300), vec![commit("#a"), commit("#b")]);
        assert_eq!(scheduler.next_due(), Some(900));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(100, commit("#a"));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.take_due(1000).is_empty());
    }

    #[test]
    fn test_frames_are_taken_one_batch_at_a_time() {
        let mut scheduler = Scheduler::new();
        scheduler.request_frame(Task::RefineDrop {
            gesture: 1,
            frames_remaining: 2,
        });
        let first = scheduler.take_frame();
        assert_eq!(first.len(), 1);
        assert!(!scheduler.has_frame_requests());
        assert!(scheduler.take_frame().is_empty());
    }
}
