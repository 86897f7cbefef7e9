// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use crossbeam_channel::{Receiver, Sender, unbounded};
use fluxion_dedup_types::{Notification, NotificationLevel};
use tracing::{error, info, trace, warn};

/// Fire-and-forget sink for user facing messages. Must never block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let subject = notification.entity_id.as_deref().unwrap_or("-");
        match notification.level {
            NotificationLevel::Info => info!("🔔 [NOTIFY] {} ({})", notification.message, subject),
            NotificationLevel::Success => {
                info!("✅ [NOTIFY] {} ({})", notification.message, subject);
            }
            NotificationLevel::Warning => {
                warn!("⚠️ [NOTIFY] {} ({})", notification.message, subject);
            }
            NotificationLevel::Error => {
                error!("❌ [NOTIFY] {} ({})", notification.message, subject);
            }
        }
    }
}

/// Forwards notifications over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.try_send(notification).is_err() {
            trace!("[NOTIFY] Receiver gone, notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers_in_order() {
        let (notifier, rx) = ChannelNotifier::new();
        notifier.notify(Notification::info("one"));
        notifier.notify(Notification::error("two").about("sensor.a"));

        assert_eq!(rx.try_recv().unwrap().message, "one");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, NotificationLevel::Error);
        assert_eq!(second.entity_id.as_deref(), Some("sensor.a"));
    }

    #[test]
    fn test_dropped_receiver_does_not_panic() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Notification::warning("nobody listens"));
        TracingNotifier.notify(Notification::success("logged"));
    }
}
