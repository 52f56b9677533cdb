mod client;
mod digest;

pub use client::Fetcher;
pub use digest::{
    compute_digest, digest_bytes, digest_file, verify, DigestAlgorithm, DigestHasher, DigestResult,
};
