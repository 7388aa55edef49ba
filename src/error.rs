//! Error taxonomy shared by the aggregator, the graph store and the query layer.

/// Every failure the library surfaces to its callers.
///
/// Store and feed failures are never swallowed into empty results: a caller
/// computing a popularity ratio must be able to tell "zero" from "failed".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A station or edge is absent from the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// An edge write referenced a station that does not exist.
    #[error("cannot link {origin} -> {destination}: missing endpoint station '{missing}'")]
    MissingEndpoint {
        origin: String,
        destination: String,
        missing: String,
    },

    /// A station could not be resolved in the store or the live capacity feed.
    #[error("station unavailable: {0}")]
    StationUnavailable(String),

    /// A trip pair has no row in the distance/time table.
    #[error("no distance/time estimate for {origin} -> {destination}")]
    LookupIncomplete { origin: String, destination: String },

    /// The persistence layer could not be reached or failed mid-operation.
    #[error("graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// Stored bytes failed to decode into the edge or station schema.
    #[error("corrupt record for {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be serialized for writing.
    #[error("cannot encode record for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A trip row or edge carries values that cannot be aggregated or stored.
    #[error("invalid trip {origin} -> {destination}: {reason}")]
    InvalidTrip {
        origin: String,
        destination: String,
        reason: String,
    },

    /// More pairs were handed to a single distance lookup call than it accepts.
    #[error("lookup batch of {size} pairs exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// An external collaborator (distance matrix, GBFS) failed or returned garbage.
    #[error("external feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::FeedUnavailable(e.to_string())
    }
}

/// Maps any redb failure (open, transaction, table, storage, commit) onto
/// [`Error::StoreUnavailable`].
pub(crate) fn store_err(e: impl Into<redb::Error>) -> Error {
    Error::StoreUnavailable(e.into().to_string())
}
