//! Subscription registry: maps a `(transfer kind, port)` pair to the receiver
//! that handles completed transfers on it.
//!
//! The registry and the engine sessions are kept in step: a key is present in
//! the registry only if the engine accepted the matching subscription, and
//! removing a key closes the engine session with it.
use heapless::LinearMap;

use crate::core::{PortId, TransferKind};
use crate::error::SubscribeError;
use crate::infra::heap::MemoryResource;
use crate::protocol::node::transfer::ReceivedTransfer;
use crate::protocol::transport::traits::transfer_engine::{SubscriptionParams, TransferEngine};

/// Application handler of completed transfers.
///
/// Called from the pump with the payload still borrowed from the node heap;
/// copy out whatever must outlive the call.
pub trait TransferReceiver {
    fn on_transfer_received(&self, transfer: &ReceivedTransfer<'_>);
}

impl<F> TransferReceiver for F
where
    F: Fn(&ReceivedTransfer<'_>),
{
    fn on_transfer_received(&self, transfer: &ReceivedTransfer<'_>) {
        self(transfer)
    }
}

/// Dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionKey {
    pub kind: TransferKind,
    pub port_id: PortId,
}

impl SubscriptionKey {
    pub const fn new(kind: TransferKind, port_id: PortId) -> Self {
        Self { kind, port_id }
    }

    pub const fn message(subject: PortId) -> Self {
        Self::new(TransferKind::Message, subject)
    }

    pub const fn request(service: PortId) -> Self {
        Self::new(TransferKind::Request, service)
    }

    pub const fn response(service: PortId) -> Self {
        Self::new(TransferKind::Response, service)
    }
}

/// At most `N` subscriptions, one receiver per key.
pub struct SubscriptionRegistry<'a, const N: usize> {
    entries: LinearMap<SubscriptionKey, &'a dyn TransferReceiver, N>,
}

impl<'a, const N: usize> SubscriptionRegistry<'a, N> {
    pub const fn new() -> Self {
        Self {
            entries: LinearMap::new(),
        }
    }

    /// Register `receiver` for `key`, replacing any previous receiver.
    ///
    /// The engine session is opened (or refreshed with `params`) first; if the
    /// engine refuses, the registry is left untouched. Returns the receiver that
    /// was replaced, if any.
    pub fn subscribe<E: TransferEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        key: SubscriptionKey,
        params: &SubscriptionParams,
        receiver: &'a dyn TransferReceiver,
    ) -> Result<Option<&'a dyn TransferReceiver>, SubscribeError> {
        if !key.port_id.fits(key.kind) {
            return Err(SubscribeError::InvalidPort {
                port: key.port_id.0,
            });
        }
        if !self.entries.contains_key(&key) && self.entries.len() == N {
            return Err(SubscribeError::RegistryFull);
        }
        engine.subscribe(key.kind, key.port_id, params)?;
        let replaced = self
            .entries
            .insert(key, receiver)
            .map_err(|_| SubscribeError::RegistryFull)?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Subscribed {} {} (replaced: {})",
            key.kind,
            key.port_id,
            replaced.is_some()
        );
        Ok(replaced)
    }

    /// Remove `key` and close its engine session. Unknown keys are a no-op.
    pub fn unsubscribe<E: TransferEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        heap: &mut dyn MemoryResource,
        key: SubscriptionKey,
    ) -> bool {
        if self.entries.remove(&key).is_none() {
            return false;
        }
        engine.unsubscribe(heap, key.kind, key.port_id);

        #[cfg(feature = "defmt")]
        defmt::info!("Unsubscribed {} {}", key.kind, key.port_id);
        true
    }

    /// Hand `transfer` to its receiver. `false` when nobody subscribed.
    pub fn dispatch(&self, transfer: &ReceivedTransfer<'_>) -> bool {
        let metadata = transfer.metadata();
        match self
            .entries
            .get(&SubscriptionKey::new(metadata.kind, metadata.port_id))
        {
            Some(receiver) => {
                receiver.on_transfer_received(transfer);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for SubscriptionRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}
