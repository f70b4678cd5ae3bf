/// Controller state machine.
///
/// ```text
/// idle ──start──▶ running ──stop──▶ idle
///                  │   ▲
///                  └───┘ update_delay
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JammerState {
    Idle,
    Running { delay_ms: u32 },
}

impl JammerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// The active delay, if running.
    pub fn delay_ms(&self) -> Option<u32> {
        match self {
            Self::Running { delay_ms } => Some(*delay_ms),
            Self::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_reports_delay() {
        let state = JammerState::Running { delay_ms: 200 };
        assert!(state.is_running());
        assert!(!state.is_idle());
        assert_eq!(state.delay_ms(), Some(200));
        assert_eq!(JammerState::Idle.delay_ms(), None);
    }
}
