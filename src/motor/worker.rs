//! # Motor Worker
//!
//! Background task that turns the latest published [`WheelCommand`] into
//! motor writes.
//!
//! ## Loop
//!
//! ```text
//! wait for: new command | keepalive tick | sender dropped
//!   for each closed link: reopen if the reconnect interval has elapsed
//!   any link still closed -> command = STOP
//!   for each open link (left, then right):
//!     duty = latch.gate(command).side(link)
//!     write duty; on failure engage LinkFault
//! sender dropped -> engage Shutdown, write zero to every link, exit
//! ```
//!
//! The latch is consulted right before every individual write, so a stop
//! engaged mid-cycle zeroes whichever link has not been written yet.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::channel::{command_channel, MotorCommandReceiver, MotorCommandSender};
use super::MotorLink;
use crate::config::MotorsConfig;
use crate::drive::mixer::{Side, WheelCommand};
use crate::drive::safety::{SafetyLatch, StopReason};

/// Health of the motor links as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Last write cycle reached every link
    Healthy,
    /// At least one link failed or is closed
    Faulted,
}

/// Worker cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTiming {
    /// Resend period when no new command arrives
    pub keepalive: Duration,
    /// Minimum gap between reopen attempts on a closed link
    pub reconnect_interval: Duration,
}

impl WorkerTiming {
    #[must_use]
    pub fn from_config(config: &MotorsConfig) -> Self {
        Self {
            keepalive: Duration::from_millis(config.keepalive_ms),
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
        }
    }
}

/// Tick-loop side of a running worker.
#[derive(Debug)]
pub struct MotorWorkerHandle {
    sender: MotorCommandSender,
    state: watch::Receiver<LinkState>,
    join: JoinHandle<()>,
}

impl MotorWorkerHandle {
    /// Publishes the newest command. Never blocks.
    pub fn publish(&self, command: WheelCommand) {
        self.sender.publish(command);
    }

    #[must_use]
    pub fn link_state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Closes the channel and waits for the worker to zero both motors.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.join.await {
            warn!("Motor worker ended abnormally: {}", e);
        }
    }
}

pub struct MotorWorker {
    links: Vec<(Side, Box<dyn MotorLink>)>,
    commands: MotorCommandReceiver,
    latch: SafetyLatch,
    timing: WorkerTiming,
    state: watch::Sender<LinkState>,
    next_reconnect: Instant,
}

impl MotorWorker {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(
        left: Box<dyn MotorLink>,
        right: Box<dyn MotorLink>,
        latch: SafetyLatch,
        timing: WorkerTiming,
    ) -> MotorWorkerHandle {
        let (sender, commands) = command_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Healthy);

        let worker = Self {
            links: vec![(Side::Left, left), (Side::Right, right)],
            commands,
            latch,
            timing,
            state: state_tx,
            next_reconnect: Instant::now(),
        };

        info!(
            "Motor worker started ({:?} keepalive, {:?} reconnect interval)",
            timing.keepalive, timing.reconnect_interval
        );

        MotorWorkerHandle {
            sender,
            state: state_rx,
            join: tokio::spawn(worker.run()),
        }
    }

    async fn run(mut self) {
        let mut keepalive = interval(self.timing.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = self.commands.changed() => {
                    if !changed {
                        break;
                    }
                }

                _ = keepalive.tick() => {}
            }

            let command = self.commands.latest();
            self.write_cycle(command).await;
        }

        self.stop_all().await;
    }

    async fn write_cycle(&mut self, command: WheelCommand) {
        let now = Instant::now();
        let reconnect_due = now >= self.next_reconnect;
        let mut healthy = true;
        let mut attempted_reconnect = false;

        for (_, link) in self.links.iter_mut() {
            if link.is_connected() {
                continue;
            }
            if !reconnect_due {
                healthy = false;
                continue;
            }
            attempted_reconnect = true;
            if let Err(e) = link.reconnect().await {
                debug!("{}", e);
                healthy = false;
            }
        }

        // One wheel alone spins the robot in place: drive only with both links up.
        let command = if healthy { command } else { WheelCommand::STOP };

        for (side, link) in self.links.iter_mut() {
            if !link.is_connected() {
                continue;
            }
            let duty = self.latch.gate(command).side(*side);
            if let Err(e) = link.set_duty(duty).await {
                warn!("{}", e);
                self.latch.engage(StopReason::LinkFault);
                self.next_reconnect = Instant::now() + self.timing.reconnect_interval;
                healthy = false;
            }
        }

        if attempted_reconnect && !healthy {
            self.next_reconnect = now + self.timing.reconnect_interval;
        }

        self.set_state(if healthy {
            LinkState::Healthy
        } else {
            LinkState::Faulted
        });
    }

    fn set_state(&self, new_state: LinkState) {
        self.state.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            match new_state {
                LinkState::Healthy => info!("Motor links restored"),
                LinkState::Faulted => warn!("Motor links faulted, motors stopped"),
            }
            *state = new_state;
            true
        });
    }

    async fn stop_all(&mut self) {
        self.latch.engage(StopReason::Shutdown);

        for (side, link) in self.links.iter_mut() {
            if !link.is_connected() {
                if let Err(e) = link.reconnect().await {
                    warn!("Cannot stop {} motor: {}", side.name(), e);
                    continue;
                }
            }

            match link.set_duty(0.0).await {
                Ok(()) => info!("{} motor stopped", side.name()),
                Err(e) => warn!("Cannot stop {} motor: {}", side.name(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::safety::LatchState;
    use crate::motor::mocks::{LinkProbe, RecordingLink};
    use tokio::time::sleep;

    const TIMING: WorkerTiming = WorkerTiming {
        keepalive: Duration::from_millis(50),
        reconnect_interval: Duration::from_millis(200),
    };

    fn spawn_worker(latch: &SafetyLatch) -> (MotorWorkerHandle, LinkProbe, LinkProbe) {
        let (left, left_probe) = RecordingLink::new("left");
        let (right, right_probe) = RecordingLink::new("right");
        let handle = MotorWorker::spawn(Box::new(left), Box::new(right), latch.clone(), TIMING);
        (handle, left_probe, right_probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_latest_command_to_each_side() {
        let latch = SafetyLatch::new();
        let (handle, left, right) = spawn_worker(&latch);

        handle.publish(WheelCommand::new(0.5, -0.25));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(left.last_write(), Some(0.5));
        assert_eq!(right.last_write(), Some(-0.25));
        assert_eq!(handle.link_state(), LinkState::Healthy);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_repeats_last_command() {
        let latch = SafetyLatch::new();
        let (handle, left, _right) = spawn_worker(&latch);

        handle.publish(WheelCommand::new(0.3, 0.3));
        sleep(Duration::from_millis(500)).await;

        let repeats = left.writes().iter().filter(|&&duty| duty == 0.3).count();
        assert!(repeats >= 5, "expected keepalive resends, got {:?}", left.writes());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_latch_never_forwards_motion() {
        let latch = SafetyLatch::stopped(StopReason::Button);
        let (handle, left, right) = spawn_worker(&latch);

        for i in 1..=5 {
            handle.publish(WheelCommand::new(0.1 * i as f32, 0.1 * i as f32));
            sleep(Duration::from_millis(30)).await;
        }

        assert!(!left.writes().is_empty());
        assert!(left.writes().iter().all(|&duty| duty == 0.0));
        assert!(right.writes().iter().all(|&duty| duty == 0.0));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_latches_link_fault() {
        let latch = SafetyLatch::new();
        let (handle, left, right) = spawn_worker(&latch);
        sleep(Duration::from_millis(10)).await;
        left.set_fail_writes(true);

        handle.publish(WheelCommand::new(0.6, 0.6));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(latch.state(), LatchState::Stopped(StopReason::LinkFault));
        assert_eq!(handle.link_state(), LinkState::Faulted);
        // Left failed first, so the right write in the same cycle is already gated
        assert!(right.writes().iter().all(|&duty| duty == 0.0));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_recovers_but_latch_stays_stopped() {
        let latch = SafetyLatch::new();
        let (handle, left, _right) = spawn_worker(&latch);
        sleep(Duration::from_millis(10)).await;

        left.set_fail_writes(true);
        handle.publish(WheelCommand::new(0.4, 0.4));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.link_state(), LinkState::Faulted);

        left.set_fail_writes(false);
        sleep(Duration::from_millis(400)).await;

        assert!(left.reconnects() >= 1);
        assert_eq!(handle.link_state(), LinkState::Healthy);
        assert_eq!(latch.state(), LatchState::Stopped(StopReason::LinkFault));
        assert_eq!(left.last_write(), Some(0.0));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_with_link_down_keeps_other_motor_stopped() {
        let latch = SafetyLatch::new();
        let (handle, left, right) = spawn_worker(&latch);
        sleep(Duration::from_millis(10)).await;

        left.set_fail_writes(true);
        left.set_fail_reconnects(true);
        handle.publish(WheelCommand::new(0.6, 0.6));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(latch.state(), LatchState::Stopped(StopReason::LinkFault));

        assert!(latch.release());
        handle.publish(WheelCommand::new(0.6, 0.7));
        sleep(Duration::from_millis(300)).await;

        assert_eq!(latch.state(), LatchState::Running);
        assert_eq!(handle.link_state(), LinkState::Faulted);
        assert_eq!(right.last_write(), Some(0.0));
        assert!(right.writes().iter().all(|&duty| duty == 0.0), "{:?}", right.writes());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_attempts_are_rate_limited() {
        let latch = SafetyLatch::new();
        let (handle, left, _right) = spawn_worker(&latch);
        sleep(Duration::from_millis(10)).await;

        left.set_connected(false);
        left.set_fail_reconnects(true);
        sleep(Duration::from_millis(1000)).await;

        // 1000ms at a 200ms interval allows at most 6 attempts
        let attempts = left.reconnects();
        assert!((1..=6).contains(&attempts), "got {} attempts", attempts);
        assert_eq!(handle.link_state(), LinkState::Faulted);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_zeroes_both_motors() {
        let latch = SafetyLatch::new();
        let (handle, left, right) = spawn_worker(&latch);

        handle.publish(WheelCommand::new(0.7, 0.7));
        sleep(Duration::from_millis(10)).await;
        handle.shutdown().await;

        assert_eq!(left.last_write(), Some(0.0));
        assert_eq!(right.last_write(), Some(0.0));
        assert_eq!(latch.state(), LatchState::Stopped(StopReason::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reopens_closed_link_to_stop_it() {
        let latch = SafetyLatch::new();
        let (handle, left, _right) = spawn_worker(&latch);
        sleep(Duration::from_millis(10)).await;

        left.set_connected(false);
        handle.shutdown().await;

        assert!(left.reconnects() >= 1);
        assert_eq!(left.last_write(), Some(0.0));
    }

    #[test]
    fn test_timing_from_config() {
        let timing = WorkerTiming::from_config(&MotorsConfig::default());
        assert_eq!(timing.keepalive, Duration::from_millis(50));
        assert_eq!(timing.reconnect_interval, Duration::from_millis(1000));
    }
}
