use super::brightness_controller::ControllerPort;
use crate::armaf::Handle;
use std::time::Duration;
use tokio::{
    select,
    time::{self, MissedTickBehavior},
};

/// Polls the controller every `interval` until the returned [Handle] is shut
/// down or the controller stops answering.
pub fn spawn(port: ControllerPort, interval: Duration) -> Handle {
    log::debug!("Polling brightness every {:?}", interval);
    let (handle, mut handle_child) = Handle::new();
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                _ = handle_child.should_terminate() => break,
                _ = ticker.tick() => {
                    match port.poll().await {
                        Ok(outcome) => log::trace!("Poll finished: {:?}", outcome),
                        Err(e) => {
                            log::error!("Brightness controller unreachable, stopping poller: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        // The controller can only shut down once our port is gone
        drop(port);
        log::debug!("Poller stopped");
        drop(handle_child);
    });
    handle
}
