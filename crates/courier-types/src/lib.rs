/// Courier shared types.
///
/// Key material in the flat, serializable layout used when keys are written
/// to disk or sent to a peer. Nothing in here performs cryptography; the
/// typed, validated views live in `courier-crypto`.

mod b64;
pub mod params;

pub use params::RsaParameters;
