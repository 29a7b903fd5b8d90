//! Index definitions and the required index catalogue.
//!
//! Index names are a compatibility surface: anything that inspects index
//! presence keys off them, so they must never be renamed or silently redefined.

use std::fmt;

use bson::{Bson, Document};

use super::Collection;

/// Unique index on `users.email`.
pub const USERS_EMAIL_UNIQUE: &str = "users_email_unique";
/// Index on `deliveries.customerId`.
pub const DELIVERIES_CUSTOMER_ID: &str = "deliveries_customerId";
/// Index on `deliveries.courierId`.
pub const DELIVERIES_COURIER_ID: &str = "deliveries_courierId";
/// Index on `deliveries.status`.
pub const DELIVERIES_STATUS: &str = "deliveries_status";
/// Descending index on `deliveries.createdAt`.
pub const DELIVERIES_CREATED_AT_DESC: &str = "deliveries_createdAt_desc";
/// Compound index on `tracking_events.deliveryId` then `createdAt` descending.
pub const TRACKING_DELIVERY_ID_CREATED_AT_DESC: &str = "tracking_deliveryId_createdAt_desc";
/// Compound index on `notifications.userId` then `read`.
pub const NOTIFICATIONS_USER_ID_READ: &str = "notifications_userId_read";

/// Direction of a single index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    /// Ascending order (`1`).
    Ascending,
    /// Descending order (`-1`).
    Descending,
    /// A non-ordered key type such as `text` or `2dsphere`.
    Special(String),
}

impl KeyDirection {
    /// Interpret a key value as reported by the store.
    ///
    /// Numeric directions compare by value regardless of their BSON width, so
    /// `1`, `1_i64` and `1.0` are all ascending.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bson::Bson;
    /// use delivery_store::domain::KeyDirection;
    ///
    /// assert_eq!(KeyDirection::from_bson(&Bson::Double(-1.0)), KeyDirection::Descending);
    /// assert_eq!(KeyDirection::from_bson(&Bson::Int64(1)), KeyDirection::Ascending);
    /// ```
    #[must_use]
    pub fn from_bson(value: &Bson) -> Self {
        let sign = match value {
            Bson::Int32(v) => i64::from(*v).signum(),
            Bson::Int64(v) => v.signum(),
            Bson::Double(v) if *v > 0.0 => 1,
            Bson::Double(v) if *v < 0.0 => -1,
            Bson::String(kind) => return Self::Special(kind.clone()),
            _ => 0,
        };
        match sign {
            1 => Self::Ascending,
            -1 => Self::Descending,
            _ => Self::Special(value.to_string()),
        }
    }

    /// Return the store representation of this direction.
    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Ascending => Bson::Int32(1),
            Self::Descending => Bson::Int32(-1),
            Self::Special(kind) => Bson::String(kind.clone()),
        }
    }
}

impl fmt::Display for KeyDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("1"),
            Self::Descending => f.write_str("-1"),
            Self::Special(kind) => write!(f, "{kind:?}"),
        }
    }
}

/// One field of an index key pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    /// Document field name.
    pub field: String,
    /// Sort direction for the field.
    pub direction: KeyDirection,
}

impl IndexKey {
    /// Ascending key on `field`.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: KeyDirection::Ascending,
        }
    }

    /// Descending key on `field`.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: KeyDirection::Descending,
        }
    }
}

/// Store document for an ordered key list, as used for index key patterns and
/// sort specifications.
#[must_use]
pub fn key_pattern(keys: &[IndexKey]) -> Document {
    let mut pattern = Document::new();
    for key in keys {
        pattern.insert(key.field.clone(), key.direction.to_bson());
    }
    pattern
}

/// A named index: ordered key pattern plus the options that change which
/// documents it covers or how it compares them.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// Index name as registered with the store.
    pub name: String,
    /// Ordered key pattern.
    pub keys: Vec<IndexKey>,
    /// Whether the store rejects duplicate key combinations.
    pub unique: bool,
    /// Whether documents lacking every keyed field are left out.
    pub sparse: bool,
    /// Filter restricting the index to matching documents.
    pub partial_filter: Option<Document>,
    /// String comparison rules, in the store's collation document form.
    pub collation: Option<Document>,
}

impl IndexDefinition {
    /// Start a non-unique index definition with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            unique: false,
            sparse: false,
            partial_filter: None,
            collation: None,
        }
    }

    /// Append a key to the pattern.
    #[must_use]
    pub fn key(mut self, key: IndexKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Mark the index as unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the index as sparse.
    #[must_use]
    pub const fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Restrict the index to documents matching `filter`.
    #[must_use]
    pub fn partial_filter(mut self, filter: Document) -> Self {
        self.partial_filter = Some(filter);
        self
    }

    /// Compare string keys under `collation`.
    #[must_use]
    pub fn collation(mut self, collation: Document) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Key pattern as a store document, preserving field order.
    #[must_use]
    pub fn key_document(&self) -> Document {
        key_pattern(&self.keys)
    }

    /// True when `other` has the same key pattern and options.
    ///
    /// Names are not compared; callers look indexes up by name first. A
    /// sparse, partial or collated index is a different index from its plain
    /// counterpart even when the keys agree.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.keys == other.keys
            && self.unique == other.unique
            && self.sparse == other.sparse
            && self.partial_filter == other.partial_filter
            && self.collation == other.collation
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (position, key) in self.keys.iter().enumerate() {
            if position > 0 {
                f.write_str(",")?;
            }
            write!(f, " {}: {}", key.field, key.direction)?;
        }
        f.write_str(" }")?;
        if self.unique {
            f.write_str(" unique")?;
        }
        if self.sparse {
            f.write_str(" sparse")?;
        }
        if let Some(filter) = &self.partial_filter {
            write!(f, " partial {filter}")?;
        }
        if let Some(collation) = &self.collation {
            write!(f, " collation {collation}")?;
        }
        Ok(())
    }
}

/// Indexes every collection must carry, exactly as named here.
///
/// # Examples
///
/// ```rust
/// use delivery_store::domain::{Collection, required_indexes};
///
/// let users = required_indexes(Collection::Users);
/// assert_eq!(users.len(), 1);
/// assert!(users[0].unique);
/// ```
#[must_use]
pub fn required_indexes(collection: Collection) -> Vec<IndexDefinition> {
    match collection {
        Collection::Users => vec![
            IndexDefinition::named(USERS_EMAIL_UNIQUE)
                .key(IndexKey::ascending("email"))
                .unique(),
        ],
        Collection::Deliveries => vec![
            IndexDefinition::named(DELIVERIES_CUSTOMER_ID).key(IndexKey::ascending("customerId")),
            IndexDefinition::named(DELIVERIES_COURIER_ID).key(IndexKey::ascending("courierId")),
            IndexDefinition::named(DELIVERIES_STATUS).key(IndexKey::ascending("status")),
            IndexDefinition::named(DELIVERIES_CREATED_AT_DESC)
                .key(IndexKey::descending("createdAt")),
        ],
        Collection::TrackingEvents => vec![
            IndexDefinition::named(TRACKING_DELIVERY_ID_CREATED_AT_DESC)
                .key(IndexKey::ascending("deliveryId"))
                .key(IndexKey::descending("createdAt")),
        ],
        Collection::Notifications => vec![
            IndexDefinition::named(NOTIFICATIONS_USER_ID_READ)
                .key(IndexKey::ascending("userId"))
                .key(IndexKey::ascending("read")),
        ],
    }
}
