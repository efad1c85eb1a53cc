use crate::clock::Tick;

/// Playback commands whose decision happens on one tick and whose execution
/// happens on a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Start playback for the first time (session start).
    Start,
    /// Resume after a drift-correction pause+seek.
    Resume,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduledAction {
    pub target_tick: Tick,
    pub action: PlaybackAction,
}

/// Pending playback actions keyed by target tick, drained once per tick.
/// An action fires exactly once, on the first tick where `now` has reached
/// its target.
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: Vec<ScheduledAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target_tick: Tick, action: PlaybackAction) {
        self.pending.push(ScheduledAction {
            target_tick,
            action,
        });
    }

    pub fn contains(&self, action: PlaybackAction) -> bool {
        self.pending.iter().any(|p| p.action == action)
    }

    pub fn drain_due(&mut self, now: Tick) -> Vec<ScheduledAction> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if now >= self.pending[i].target_tick {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_when_due() {
        let mut queue = ActionQueue::new();
        queue.push(100, PlaybackAction::Start);

        assert!(queue.drain_due(99).is_empty());
        let due = queue.drain_due(100);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].action, PlaybackAction::Start);
        // already fired, nothing on later ticks
        assert!(queue.drain_due(1_000).is_empty());
    }

    #[test]
    fn test_past_target_fires_immediately() {
        let mut queue = ActionQueue::new();
        queue.push(-50, PlaybackAction::Resume);
        assert_eq!(queue.drain_due(0).len(), 1);
    }

    #[test]
    fn test_multiple_pending() {
        let mut queue = ActionQueue::new();
        queue.push(10, PlaybackAction::Start);
        queue.push(20, PlaybackAction::Resume);

        assert!(queue.contains(PlaybackAction::Resume));
        assert_eq!(queue.drain_due(15).len(), 1);
        assert!(queue.contains(PlaybackAction::Resume));
        assert_eq!(queue.drain_due(25).len(), 1);
        assert!(queue.is_empty());
    }
}
