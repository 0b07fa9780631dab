use super::{
    brightness_controller::{BrightnessController, ControllerOptions, ControllerPort},
    indicator_adapter::{Indicator, IndicatorAdapter},
    poller,
};
use crate::{
    armaf::Handle,
    config::{Config, PollStrategy},
    external::backlight::BacklightTool,
};

/// Everything a brightness indicator needs while it's enabled.
///
/// Created when the host enables the indicator and torn down with
/// [disable](Self::disable). The host owns it, there is no global instance.
pub struct BrightnessSession {
    port: ControllerPort,
    poller: Option<Handle>,
    adapter: IndicatorAdapter,
}

impl BrightnessSession {
    pub async fn enable<T: BacklightTool, I: Indicator>(
        tool: T,
        config: &Config,
        mut indicator: I,
    ) -> BrightnessSession {
        let port = BrightnessController::new(tool, ControllerOptions::from(config))
            .spawn()
            .await;
        indicator.show_level(port.level());
        let adapter = IndicatorAdapter::new(port.subscribe(), indicator);
        let poller = match config.sync.poll {
            PollStrategy::Interval => {
                Some(poller::spawn(port.clone(), config.sync.poll_interval()))
            }
            PollStrategy::AfterSet | PollStrategy::Manual => None,
        };
        log::info!("Brightness session enabled, polling {:?}", config.sync.poll);
        BrightnessSession {
            port,
            poller,
            adapter,
        }
    }

    /// The controller, for slider changes and manual polls.
    pub fn port(&self) -> &ControllerPort {
        &self.port
    }

    /// Stops polling and the indicator updates, then waits for the controller
    /// to finish its last write and stop.
    pub async fn disable(self) {
        drop(self.adapter);
        if let Some(poller) = self.poller {
            poller.await_shutdown().await;
        }
        self.port.await_shutdown().await;
        log::info!("Brightness session disabled");
    }
}
