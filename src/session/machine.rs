use statig::prelude::*;

use super::engine::{LinkApplyStatus, LinkCommand, LinkPhase, LinkSnapshot};

#[derive(Clone, Copy, Debug)]
pub(super) struct LinkMachine {
    pub(super) snapshot: LinkSnapshot,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DispatchContext {
    pub(super) status: LinkApplyStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: LinkApplyStatus::Unchanged,
        }
    }
}

impl LinkMachine {
    pub(super) fn new() -> Self {
        Self {
            snapshot: LinkSnapshot::default(),
        }
    }

    fn enter(&mut self, context: &mut DispatchContext, phase: LinkPhase) {
        self.snapshot.phase = phase;
        context.status = LinkApplyStatus::Applied;
    }
}

#[state_machine(initial = "State::detached()")]
impl LinkMachine {
    #[state]
    fn detached(&mut self, context: &mut DispatchContext, event: &LinkCommand) -> Outcome<State> {
        match event {
            LinkCommand::Connect => {
                self.enter(context, LinkPhase::Connected);
                Transition(State::connected())
            }
            LinkCommand::Unmount | LinkCommand::Disconnect => {
                context.status = LinkApplyStatus::Unchanged;
                Handled
            }
            LinkCommand::Mount => {
                context.status = LinkApplyStatus::InvalidTransition;
                Handled
            }
        }
    }

    #[state]
    fn connected(&mut self, context: &mut DispatchContext, event: &LinkCommand) -> Outcome<State> {
        match event {
            LinkCommand::Mount => {
                self.snapshot.mounts = self.snapshot.mounts.wrapping_add(1);
                self.enter(context, LinkPhase::Mounted);
                Transition(State::mounted())
            }
            LinkCommand::Disconnect => {
                self.enter(context, LinkPhase::Detached);
                Transition(State::detached())
            }
            LinkCommand::Connect | LinkCommand::Unmount => {
                context.status = LinkApplyStatus::Unchanged;
                Handled
            }
        }
    }

    #[state]
    fn mounted(&mut self, context: &mut DispatchContext, event: &LinkCommand) -> Outcome<State> {
        match event {
            LinkCommand::Unmount => {
                self.enter(context, LinkPhase::Connected);
                Transition(State::connected())
            }
            // Dropping the transport under a mounted volume still leaves nothing mounted.
            LinkCommand::Disconnect => {
                self.enter(context, LinkPhase::Detached);
                Transition(State::detached())
            }
            LinkCommand::Connect | LinkCommand::Mount => {
                context.status = LinkApplyStatus::Unchanged;
                Handled
            }
        }
    }
}
