//! Command-line surface for the `provision-store` binary.
//!
//! The only input is the store connection target: a MongoDB URI given as
//! the positional argument, or `MONGODB_URI` when the argument is omitted.
//! The database is the URI's path component, or `delivery` when the URI
//! names none.

use std::fmt;

use clap::Parser;
use mockable::Env;

/// Environment variable consulted when no URI argument is given.
pub const URI_ENV: &str = "MONGODB_URI";
/// Database used when the URI does not name one.
pub const DEFAULT_DATABASE: &str = "delivery";

const SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// `provision-store` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "provision-store",
    about = "Ensure delivery-store collections and indexes exist and seed the fixture graph",
    version
)]
pub struct CliArgs {
    /// MongoDB connection URI. Falls back to `MONGODB_URI` when omitted.
    #[arg(value_name = "URI")]
    pub uri: Option<String>,
}

/// Errors raised while resolving the store target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreTargetError {
    /// Neither the argument nor the environment supplied a URI.
    #[error("store URI missing: pass it as an argument or set {URI_ENV}")]
    Missing,
    /// A URI was supplied but is blank.
    #[error("store URI from {origin} must not be empty")]
    Empty {
        /// Where the blank value came from.
        origin: &'static str,
    },
    /// The URI does not use a MongoDB scheme.
    #[error("store URI {uri} must start with mongodb:// or mongodb+srv://")]
    UnsupportedScheme {
        /// The offending URI with any password masked.
        uri: String,
    },
}

/// Resolved connection target.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreTarget {
    uri: String,
    database: String,
}

impl StoreTarget {
    /// Resolve the target from an explicit URI or the environment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreTargetError`] when no URI is available, the URI is
    /// blank, or it does not use a MongoDB scheme.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use delivery_store::inbound::cli::StoreTarget;
    /// use mockable::MockEnv;
    ///
    /// let mut env = MockEnv::new();
    /// env.expect_string().returning(|_| None);
    ///
    /// let target = StoreTarget::resolve(Some("mongodb://localhost:27017/fleet".into()), &env)
    ///     .expect("valid target");
    /// assert_eq!(target.database(), "fleet");
    /// ```
    pub fn resolve(explicit: Option<String>, env: &impl Env) -> Result<Self, StoreTargetError> {
        let (raw, origin) = match explicit {
            Some(value) => (value, "the URI argument"),
            None => (env.string(URI_ENV).ok_or(StoreTargetError::Missing)?, URI_ENV),
        };
        let uri = raw.trim().to_owned();
        if uri.is_empty() {
            return Err(StoreTargetError::Empty { origin });
        }
        if !SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
            return Err(StoreTargetError::UnsupportedScheme {
                uri: redact(&uri),
            });
        }
        let database = database_from_uri(&uri).unwrap_or(DEFAULT_DATABASE).to_owned();
        Ok(Self { uri, database })
    }

    /// Connection URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Target database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// URI safe to log: any password is replaced with `***`.
    #[must_use]
    pub fn redacted(&self) -> String {
        redact(&self.uri)
    }
}

impl fmt::Debug for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTarget")
            .field("uri", &self.redacted())
            .field("database", &self.database)
            .finish()
    }
}

/// Database named in the URI path, if any.
fn database_from_uri(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("://")?;
    let (_, path) = rest.split_once('/')?;
    let name = path.split('?').next().unwrap_or_default();
    (!name.is_empty()).then_some(name)
}

fn redact(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_owned();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let Some((credentials, hosts)) = authority.rsplit_once('@') else {
        return uri.to_owned();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{hosts}{tail}"),
        None => uri.to_owned(),
    }
}
