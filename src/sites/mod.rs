pub mod http;

pub use http::{classify_claim_body, HttpClaimStrategy, SiteProfile};
