use alloc::vec::Vec;

use crate::enums::AlertDescription;
use crate::error::{Error, PeerMisbehaved};
use crate::log::{debug, warn};

/// Connection state shared by both handshake roles: which side we are, and
/// the alerts the handshake decided to send.
///
/// The record layer is not part of this crate, so alerts are queued here for
/// the embedding state machine to transmit.
#[derive(Debug)]
pub struct CommonState {
    /// Which side of the connection this is.
    pub side: Side,
    has_sent_fatal_alert: bool,
    sendable_alerts: Vec<AlertDescription>,
}

impl CommonState {
    /// A fresh state with nothing sent.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            has_sent_fatal_alert: false,
            sendable_alerts: Vec::new(),
        }
    }

    /// Queue a fatal alert, and return `err` for the caller to propagate.
    ///
    /// Only the first fatal alert of a connection is queued.
    pub(crate) fn send_fatal_alert(
        &mut self,
        desc: AlertDescription,
        err: impl Into<Error>,
    ) -> Error {
        if !self.has_sent_fatal_alert {
            warn!("Sending fatal alert {:?}", desc);
            self.has_sent_fatal_alert = true;
            self.sendable_alerts.push(desc);
        } else {
            debug!("Not sending {:?}: a fatal alert was already sent", desc);
        }
        err.into()
    }

    /// Queue the alert `why` maps to, and return it as an error.
    pub(crate) fn misbehaved(&mut self, why: PeerMisbehaved) -> Error {
        self.send_fatal_alert(AlertDescription::from(&why), why)
    }

    /// True once a fatal alert has been queued.
    pub fn has_sent_fatal_alert(&self) -> bool {
        self.has_sent_fatal_alert
    }

    /// The most recently queued alert, if any.
    pub fn last_alert(&self) -> Option<AlertDescription> {
        self.sendable_alerts.last().copied()
    }

    /// Drain the alerts queued for transmission.
    pub fn take_alerts(&mut self) -> Vec<AlertDescription> {
        core::mem::take(&mut self.sendable_alerts)
    }
}

/// Side of the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// A client initiates the connection.
    Client,
    /// A server waits for a client to connect.
    Server,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_fatal_alert_is_queued() {
        let mut common = CommonState::new(Side::Server);
        let err = common.send_fatal_alert(
            AlertDescription::IllegalParameter,
            PeerMisbehaved::InvalidEchExtension,
        );
        assert_eq!(
            err,
            Error::PeerMisbehaved(PeerMisbehaved::InvalidEchExtension)
        );
        common.send_fatal_alert(AlertDescription::DecodeError, Error::DecryptError);

        assert!(common.has_sent_fatal_alert());
        assert_eq!(common.last_alert(), Some(AlertDescription::IllegalParameter));
        assert_eq!(
            common.take_alerts(),
            vec![AlertDescription::IllegalParameter]
        );
        assert_eq!(common.last_alert(), None);
    }

    #[test]
    fn misbehaved_uses_default_mapping() {
        let mut common = CommonState::new(Side::Client);
        common.misbehaved(PeerMisbehaved::UnsolicitedEchRetryConfigs);
        assert_eq!(
            common.last_alert(),
            Some(AlertDescription::UnsupportedExtension)
        );
    }
}
