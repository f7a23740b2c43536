// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! State and stop-reason vocabulary shared by executor and controller.

use strum_macros::Display;

/// States of a [`TriggeredCyclicExec`]'s cycle machine.
///
/// Transitions happen exclusively on the executor thread, one per wake-up attempt.
/// See [`TriggeredCyclicExec`] for the transition table.
///
/// [`TriggeredCyclicExec`]: super::TriggeredCyclicExec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ExecState {
    /// Not sampling. The only state in which a start may be requested.
    Stopped,
    /// Start accepted; burning the configured number of start-delay cycles.
    Starting,
    /// Waiting for the PLL-locked predicate to report a reliable trigger.
    WaitLock,
    /// Sampling on every trigger.
    Running,
}

/// Why an executor episode ended (or `None` for state changes that are not stops).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StopReason {
    /// Not a stop: the state change entered a non-stopped state.
    None,
    /// A stop was requested via [`request_stop_sampling`].
    ///
    /// [`request_stop_sampling`]: super::TriggeredCyclicExec::request_stop_sampling
    RequestStop,
    /// The trigger did not fire within the configured timeout.
    TriggerTimeout,
    /// The PLL-locked predicate reported loss of lock while running.
    PllLossOfLock,
    /// The [`CyclicHandler::sample`] callback returned `false`.
    ///
    /// [`CyclicHandler::sample`]: super::CyclicHandler::sample
    SampleReturnedFalse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kebab_case_words() {
        assert_eq!(ExecState::WaitLock.to_string(), "wait-lock");
        assert_eq!(StopReason::PllLossOfLock.to_string(), "pll-loss-of-lock");
        assert_eq!(StopReason::SampleReturnedFalse.to_string(), "sample-returned-false");
    }
}
