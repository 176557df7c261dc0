use super::AttendanceClient;
use crate::channel::{Connector, InboundMessage, ReconnectPolicy, INBOUND_NAMES};
use crate::events::AppEvent;
use crate::presenter::Surface;
use tracing::{debug, info, warn};

impl<S: Surface> AttendanceClient<S> {
    /// Wire inbound messages to the event bus and start the channel
    pub fn start<C: Connector>(&mut self, connector: C) {
        info!(
            "Starting rollcam client (camera: {}, service: {})",
            self.media.device_name(),
            connector.address()
        );

        self.register_channel_handlers();
        self.spawn_status_forwarder();
        self.channel
            .start(connector, ReconnectPolicy::from(&self.config.channel));

        self.presenter.status(self.channel.status());
        self.render_controls();
    }

    fn register_channel_handlers(&self) {
        for name in INBOUND_NAMES {
            let bus = self.event_bus.clone();
            self.channel.on(name, move |envelope| {
                match InboundMessage::from_envelope(envelope) {
                    Ok(Some(message)) => {
                        let event = AppEvent::Inbound {
                            correlation: envelope.correlation_id,
                            message,
                        };
                        if let Err(e) = bus.publish(event) {
                            debug!("Inbound '{}' not delivered: {}", envelope.event, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{}", e),
                }
            });
        }
        debug!("Registered {} inbound handlers", INBOUND_NAMES.len());
    }

    /// Turn channel status transitions into events
    fn spawn_status_forwarder(&self) {
        let mut status = self.channel.subscribe_status();
        let bus = self.event_bus.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = *status.borrow_and_update();
                        if bus.publish(AppEvent::ConnectionChanged(current)).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Status forwarder stopped");
        });
    }
}
