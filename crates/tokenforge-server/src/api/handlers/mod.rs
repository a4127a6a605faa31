//! API request handlers

pub mod keys;
pub mod policy;
pub mod token;

pub use keys::jwks;
pub use policy::{get_policy, PolicyResponse};
pub use token::{
    introspect, issue_token, verify_token, AppState, IntrospectResponse, IssueRequest,
    IssueResponse, VerifyRequest, VerifyResponse,
};
