//! Latest-value command channel from the tick loop to the motor worker.
//!
//! Backed by [`tokio::sync::watch`]: publishing never blocks and a slow
//! receiver only ever sees the newest command. Older commands are
//! overwritten, never queued.

use tokio::sync::watch;

use crate::drive::mixer::WheelCommand;

/// Creates a connected sender/receiver pair holding [`WheelCommand::STOP`].
#[must_use]
pub fn command_channel() -> (MotorCommandSender, MotorCommandReceiver) {
    let (tx, rx) = watch::channel(WheelCommand::STOP);
    (MotorCommandSender { tx }, MotorCommandReceiver { rx })
}

/// Publishing half, owned by the tick loop.
#[derive(Debug)]
pub struct MotorCommandSender {
    tx: watch::Sender<WheelCommand>,
}

impl MotorCommandSender {
    /// Replaces the pending command. Succeeds even if the worker has exited.
    pub fn publish(&self, command: WheelCommand) {
        self.tx.send_replace(command);
    }

    /// Most recently published command
    #[must_use]
    pub fn latest(&self) -> WheelCommand {
        *self.tx.borrow()
    }
}

/// Receiving half, owned by the motor worker.
#[derive(Debug)]
pub struct MotorCommandReceiver {
    rx: watch::Receiver<WheelCommand>,
}

impl MotorCommandReceiver {
    /// Waits for a command newer than the last one read.
    ///
    /// Returns `false` once the sender is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Reads the newest command and marks it seen.
    pub fn latest(&mut self) -> WheelCommand {
        *self.rx.borrow_and_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_stopped() {
        let (sender, mut receiver) = command_channel();
        assert_eq!(sender.latest(), WheelCommand::STOP);
        assert_eq!(receiver.latest(), WheelCommand::STOP);
    }

    #[tokio::test]
    async fn test_only_latest_command_is_seen() {
        let (sender, mut receiver) = command_channel();

        sender.publish(WheelCommand::new(0.1, 0.1));
        sender.publish(WheelCommand::new(0.2, 0.2));
        sender.publish(WheelCommand::new(0.3, -0.3));

        assert!(receiver.changed().await);
        assert_eq!(receiver.latest(), WheelCommand::new(0.3, -0.3));
    }

    #[tokio::test]
    async fn test_changed_false_after_sender_dropped() {
        let (sender, mut receiver) = command_channel();
        drop(sender);
        assert!(!receiver.changed().await);
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped_does_not_panic() {
        let (sender, receiver) = command_channel();
        drop(receiver);
        sender.publish(WheelCommand::new(0.5, 0.5));
        assert_eq!(sender.latest(), WheelCommand::new(0.5, 0.5));
    }
}
