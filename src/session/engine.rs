use statig::blocking::IntoStateMachineExt as _;

use super::machine::{DispatchContext, LinkMachine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkPhase {
    #[default]
    Detached,
    Connected,
    Mounted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkCommand {
    Connect,
    Mount,
    Unmount,
    Disconnect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkApplyStatus {
    Applied,
    Unchanged,
    InvalidTransition,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub phase: LinkPhase,
    pub mounts: u32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct LinkApplyResult {
    pub(crate) before: LinkSnapshot,
    pub(crate) after: LinkSnapshot,
    pub(crate) status: LinkApplyStatus,
}

impl LinkApplyResult {
    pub(crate) fn changed(self) -> bool {
        matches!(self.status, LinkApplyStatus::Applied)
    }
}

pub(crate) struct LinkEngine {
    machine: statig::blocking::StateMachine<LinkMachine>,
}

impl LinkEngine {
    pub(crate) fn new() -> Self {
        Self {
            machine: LinkMachine::new().state_machine(),
        }
    }

    pub(crate) fn snapshot(&self) -> LinkSnapshot {
        self.machine.inner().snapshot
    }

    pub(crate) fn apply(&mut self, command: LinkCommand) -> LinkApplyResult {
        let before = self.snapshot();
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&command, &mut context);
        let after = self.snapshot();
        if matches!(context.status, LinkApplyStatus::InvalidTransition) {
            log::warn!(
                "sdsession: invalid_transition phase={} command={}",
                link_phase_label(before.phase),
                link_command_label(command)
            );
        }
        LinkApplyResult {
            before,
            after,
            status: context.status,
        }
    }
}

pub(crate) fn link_phase_label(phase: LinkPhase) -> &'static str {
    match phase {
        LinkPhase::Detached => "detached",
        LinkPhase::Connected => "connected",
        LinkPhase::Mounted => "mounted",
    }
}

fn link_command_label(command: LinkCommand) -> &'static str {
    match command {
        LinkCommand::Connect => "connect",
        LinkCommand::Mount => "mount",
        LinkCommand::Unmount => "unmount",
        LinkCommand::Disconnect => "disconnect",
    }
}
