use crate::level::BrightnessLevel;
use tokio::select;
use tokio::sync::{oneshot, watch};

/// The part of the host UI showing the brightness, typically a slider.
pub trait Indicator: Send + 'static {
    /// Moves the slider to `level`. Must not be reported back as a user change.
    fn show_level(&mut self, level: BrightnessLevel);
}

/// Drives an [Indicator] from the controller's change notifications.
///
/// Every value published on the [watch] channel is handed to
/// [Indicator::show_level] until the adapter is dropped.
pub struct IndicatorAdapter(oneshot::Sender<()>);

impl IndicatorAdapter {
    pub fn new<I: Indicator>(
        mut updates: watch::Receiver<BrightnessLevel>,
        mut indicator: I,
    ) -> IndicatorAdapter {
        let (drop_sender, mut drop_receiver) = oneshot::channel();

        tokio::spawn(async move {
            loop {
                select! {
                    Err(_) = &mut drop_receiver => return,
                    Ok(()) = updates.changed() => {
                        let level = *updates.borrow_and_update();
                        indicator.show_level(level);
                    }
                }
            }
        });

        IndicatorAdapter(drop_sender)
    }
}
