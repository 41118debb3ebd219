pub mod cache;
pub mod lookup;
pub mod verifier;

pub use cache::RegistryCache;
pub use lookup::{
    classify_response, RegistryLookup, RegistryTransport, RipeStatHttp, WhoisCommand, WhoisTcp,
};
pub use verifier::{RegistryVerifier, VerificationOutcome, VerifierConfig};
