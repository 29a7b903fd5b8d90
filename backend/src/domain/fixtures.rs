//! Stored entity shapes and the deterministic seed fixture payloads.
//!
//! Entities serialise with camelCase field names and native store
//! date-times. Optional references serialise as explicit `null`, so a
//! delivery without a courier still carries a `courierId` field.

use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Email identifying the seeded customer.
pub const CUSTOMER_EMAIL: &str = "customer@example.com";
/// Email identifying the seeded courier.
pub const COURIER_EMAIL: &str = "courier@example.com";
/// Marker identifying the seeded delivery.
pub const DELIVERY_MARKER: &str = "seed_delivery_1";
/// Marker identifying the first seeded tracking event.
pub const TRACKING_MARKER_1: &str = "seed_tracking_1";
/// Marker identifying the second seeded tracking event.
pub const TRACKING_MARKER_2: &str = "seed_tracking_2";
/// Marker identifying the seeded notification.
pub const NOTIFICATION_MARKER: &str = "seed_notification_1";

/// Field holding a fixture's seed marker.
pub const SEED_MARKER_FIELD: &str = "seedMarker";
/// Field holding a user's email.
pub const EMAIL_FIELD: &str = "email";

/// bcrypt hash of `password`, shared by both seeded accounts.
pub const SEED_PASSWORD_HASH: &str =
    "$2b$10$7EqJtq98hPqEX7fNZaFWoOhi5BWX4Z3FzvN6ZsKHu5JgT2ZL5H1zu";

/// Gap between the two seeded tracking events.
pub const TRACKING_INTERVAL_SECS: i64 = 60;

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Requests deliveries.
    Customer,
    /// Carries deliveries.
    Courier,
}

/// Lifecycle state of a delivery.
///
/// Seeding only writes [`DeliveryStatus::Requested`]; the other states are
/// set by external actors and must still read back cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Awaiting a courier.
    Requested,
    /// A courier accepted the job.
    Accepted,
    /// The package left the pickup address.
    PickedUp,
    /// On the way to the dropoff address.
    InTransit,
    /// Handed over at the dropoff address.
    Delivered,
    /// Abandoned before completion.
    Cancelled,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store identifier; absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Globally unique login email.
    pub email: String,
    /// Password hash.
    pub password_hash: String,
    /// Account role.
    pub role: UserRole,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Creation time.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Street line.
    pub line1: String,
    /// City.
    pub city: String,
    /// State or region code.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Country code.
    pub country: String,
}

/// What is being carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetails {
    /// Free-text description.
    pub description: String,
    /// Weight in kilograms.
    pub weight_kg: f64,
    /// Whether the package needs careful handling.
    pub fragile: bool,
}

/// A delivery request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    /// Store identifier; absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Stable fixture marker.
    pub seed_marker: String,
    /// Requesting customer.
    pub customer_id: ObjectId,
    /// Assigned courier, `null` until a courier accepts.
    pub courier_id: Option<ObjectId>,
    /// Collection address.
    pub pickup_address: Address,
    /// Destination address.
    pub dropoff_address: Address,
    /// Package being carried.
    pub package_details: PackageDetails,
    /// Quoted price.
    pub price: f64,
    /// Lifecycle state.
    pub status: DeliveryStatus,
    /// Creation time.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// A courier position report for a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    /// Store identifier; absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Stable fixture marker.
    pub seed_marker: String,
    /// Tracked delivery.
    pub delivery_id: ObjectId,
    /// Reported position.
    pub location: GeoPoint,
    /// Heading in degrees.
    pub heading: f64,
    /// Speed in metres per second.
    pub speed: f64,
    /// Report time.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A message shown to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Store identifier; absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Stable fixture marker.
    pub seed_marker: String,
    /// Recipient.
    pub user_id: ObjectId,
    /// Notification category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Whether the recipient has read it.
    pub read: bool,
    /// Creation time.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

fn san_francisco(line1: &str) -> Address {
    Address {
        line1: line1.to_owned(),
        city: "San Francisco".to_owned(),
        state: "CA".to_owned(),
        postal_code: "94105".to_owned(),
        country: "US".to_owned(),
    }
}

/// The seeded customer account.
#[must_use]
pub fn customer(now: DateTime<Utc>) -> User {
    User {
        id: None,
        email: CUSTOMER_EMAIL.to_owned(),
        password_hash: SEED_PASSWORD_HASH.to_owned(),
        role: UserRole::Customer,
        name: "Casey Customer".to_owned(),
        phone: "+1-555-0100".to_owned(),
        created_at: now,
    }
}

/// The seeded courier account.
#[must_use]
pub fn courier(now: DateTime<Utc>) -> User {
    User {
        id: None,
        email: COURIER_EMAIL.to_owned(),
        password_hash: SEED_PASSWORD_HASH.to_owned(),
        role: UserRole::Courier,
        name: "Riley Courier".to_owned(),
        phone: "+1-555-0101".to_owned(),
        created_at: now,
    }
}

/// The seeded delivery, requested by `customer_id` and not yet assigned.
#[must_use]
pub fn delivery(customer_id: ObjectId, now: DateTime<Utc>) -> Delivery {
    Delivery {
        id: None,
        seed_marker: DELIVERY_MARKER.to_owned(),
        customer_id,
        courier_id: None,
        pickup_address: san_francisco("1 Market St"),
        dropoff_address: san_francisco("500 Howard St"),
        package_details: PackageDetails {
            description: "Documents".to_owned(),
            weight_kg: 1.5,
            fragile: false,
        },
        price: 12.5,
        status: DeliveryStatus::Requested,
        created_at: now,
        updated_at: now,
    }
}

/// First tracking event: stationary at the pickup address.
#[must_use]
pub fn first_tracking_event(delivery_id: ObjectId, now: DateTime<Utc>) -> TrackingEvent {
    TrackingEvent {
        id: None,
        seed_marker: TRACKING_MARKER_1.to_owned(),
        delivery_id,
        location: GeoPoint {
            lat: 37.7936,
            lng: -122.3958,
        },
        heading: 90.0,
        speed: 0.0,
        created_at: now,
    }
}

/// Second tracking event, [`TRACKING_INTERVAL_SECS`] after the first.
#[must_use]
pub fn second_tracking_event(delivery_id: ObjectId, now: DateTime<Utc>) -> TrackingEvent {
    TrackingEvent {
        id: None,
        seed_marker: TRACKING_MARKER_2.to_owned(),
        delivery_id,
        location: GeoPoint {
            lat: 37.7890,
            lng: -122.3969,
        },
        heading: 180.0,
        speed: 8.5,
        created_at: now + Duration::seconds(TRACKING_INTERVAL_SECS),
    }
}

/// Notification telling the customer their delivery was requested.
#[must_use]
pub fn delivery_requested_notification(user_id: ObjectId, now: DateTime<Utc>) -> Notification {
    Notification {
        id: None,
        seed_marker: NOTIFICATION_MARKER.to_owned(),
        user_id,
        kind: "delivery_requested".to_owned(),
        title: "Delivery requested".to_owned(),
        message: "Your delivery from 1 Market St has been requested.".to_owned(),
        read: false,
        created_at: now,
    }
}
