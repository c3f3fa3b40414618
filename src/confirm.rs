use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel, signal::Signal};

/// Operator confirmation awaited before a destructive campaign touches the card.
#[allow(async_fn_in_trait)]
pub trait ConfirmGate {
    async fn confirm(&mut self) -> bool;
}

/// The console task pushes the operator's answer into the channel.
impl<M: RawMutex, const N: usize> ConfirmGate for &Channel<M, bool, N> {
    async fn confirm(&mut self) -> bool {
        self.receive().await
    }
}

/// A button task signals `true`; `false` declines.
impl<M: RawMutex> ConfirmGate for &Signal<M, bool> {
    async fn confirm(&mut self) -> bool {
        self.wait().await
    }
}

impl ConfirmGate for bool {
    async fn confirm(&mut self) -> bool {
        *self
    }
}
