// Position-triggered actions for end-trimmed items

/// What a trigger does when playback reaches it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Tell the shell the item is about to be skipped
    WarnSkip,
    /// Advance to the given playlist index
    SkipTo(usize),
}

#[derive(Debug, Clone, Copy)]
struct Trigger {
    index: usize,
    position_ms: u64,
    action: TriggerAction,
}

/// One-shot triggers keyed by playlist index and position
#[derive(Debug, Default)]
pub struct SkipTriggers {
    pending: Vec<Trigger>,
}

impl SkipTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the end trim of item `index`, replacing any earlier schedule for it.
    ///
    /// Nothing is scheduled unless `end_offset_ms > 0` and the duration is
    /// longer than the offset. The warning goes `warning_ms` ahead of the skip,
    /// and is dropped when that would fall before the start of the item.
    pub fn arm(&mut self, index: usize, duration_ms: u64, end_offset_ms: u64, warning_ms: u64) -> bool {
        self.cancel(index);
        if end_offset_ms == 0 || duration_ms <= end_offset_ms {
            return false;
        }
        let skip_at = duration_ms - end_offset_ms;
        if let Some(warn_at) = skip_at.checked_sub(warning_ms) {
            self.pending.push(Trigger {
                index,
                position_ms: warn_at,
                action: TriggerAction::WarnSkip,
            });
        }
        self.pending.push(Trigger {
            index,
            position_ms: skip_at,
            action: TriggerAction::SkipTo(index + 1),
        });
        log::debug!("Armed skip of item {} at {} ms", index, skip_at);
        true
    }

    /// Remove and return, in position order, every trigger of `index` at or before `position_ms`
    pub fn poll(&mut self, index: usize, position_ms: u64) -> Vec<TriggerAction> {
        let mut due: Vec<Trigger> = Vec::new();
        self.pending.retain(|trigger| {
            if trigger.index == index && trigger.position_ms <= position_ms {
                due.push(*trigger);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|trigger| trigger.position_ms);
        due.into_iter().map(|trigger| trigger.action).collect()
    }

    pub fn cancel(&mut self, index: usize) {
        self.pending.retain(|trigger| trigger.index != index);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_armed(&self, index: usize) -> bool {
        self.pending.iter().any(|trigger| trigger.index == index)
    }
}
