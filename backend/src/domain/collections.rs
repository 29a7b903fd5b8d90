//! The fixed set of collections owned by the delivery-tracking store.
//!
//! Collection names are part of the external contract: operational tooling and
//! the domain's own services address them by these exact strings.

use std::fmt;

/// A collection provisioned by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Customer and courier accounts, unique by `email`.
    Users,
    /// Delivery requests referencing a customer and optionally a courier.
    Deliveries,
    /// Courier location pings attached to a delivery.
    TrackingEvents,
    /// User-facing notifications.
    Notifications,
}

impl Collection {
    /// Every collection, in provisioning order.
    pub const ALL: [Self; 4] = [
        Self::Users,
        Self::Deliveries,
        Self::TrackingEvents,
        Self::Notifications,
    ];

    /// Return the store-level collection name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use delivery_store::domain::Collection;
    ///
    /// assert_eq!(Collection::TrackingEvents.name(), "tracking_events");
    /// ```
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Deliveries => "deliveries",
            Self::TrackingEvents => "tracking_events",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
