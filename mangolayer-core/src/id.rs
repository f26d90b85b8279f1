//! Identifier generation for services whose identity field is not `_id`.

use chrono::Utc;
use std::fmt::Debug;
use uuid::Uuid;

/// Mints identifiers for newly created documents.
pub trait IdGenerator: Send + Sync + Debug {
    fn generate(&self) -> String;
}

/// Default [`IdGenerator`]: a timestamp followed by random bits, all hex.
///
/// The first 16 digits are the current UTC time in nanoseconds, so identifiers
/// minted later usually sort later. The remaining 32 digits come from a v4 UUID,
/// drawn from the operating system's secure random source. Collisions are not
/// ruled out, only made vanishingly unlikely.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexIdGenerator;

impl IdGenerator for HexIdGenerator {
    fn generate(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;

        format!("{nanos:016x}{}", Uuid::new_v4().simple())
    }
}
