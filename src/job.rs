use crate::models::splunk::DispatchState;

/// What the poll loop should do after observing a dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Succeed,
    Fail(DispatchState),
}

/// The only place a `DispatchState` is interpreted.
pub fn decide(state: DispatchState) -> Decision {
    match state {
        DispatchState::Done => Decision::Succeed,
        DispatchState::Queued
        | DispatchState::Parsing
        | DispatchState::Running
        | DispatchState::Finalizing
        | DispatchState::Paused => Decision::Continue,
        DispatchState::CancelledInternal
        | DispatchState::CancelledByUser
        | DispatchState::RejectedInput
        | DispatchState::Quit
        | DispatchState::Failed => Decision::Fail(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_is_the_only_success() {
        let successes: Vec<_> = DispatchState::ALL
            .into_iter()
            .filter(|s| decide(*s) == Decision::Succeed)
            .collect();
        assert_eq!(successes, vec![DispatchState::Done]);
    }

    #[test]
    fn in_flight_states_continue() {
        for state in [
            DispatchState::Queued,
            DispatchState::Parsing,
            DispatchState::Running,
            DispatchState::Finalizing,
            DispatchState::Paused,
        ] {
            assert_eq!(decide(state), Decision::Continue, "{state}");
        }
    }

    #[test]
    fn terminal_failures_carry_their_state() {
        for state in [
            DispatchState::CancelledInternal,
            DispatchState::CancelledByUser,
            DispatchState::RejectedInput,
            DispatchState::Quit,
            DispatchState::Failed,
        ] {
            assert_eq!(decide(state), Decision::Fail(state));
        }
    }
}
