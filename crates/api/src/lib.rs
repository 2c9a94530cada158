//! `finsight-api` — the engine's externally callable surface: typed
//! request/response DTOs, tenant scoping, and wire-level error rendering.
//!
//! Everything here is transport-agnostic. An HTTP or IPC layer owns
//! serialization of the DTOs and turns [`ErrorResponse`] into status
//! codes; the engines never learn which transport called them.

pub mod context;
pub mod dto;
pub mod errors;
pub mod service;

pub use context::TenantContext;
pub use dto::{
    AckResponse, CustomerLookupRequest, CustomerLookupResponse, ForecastKind, ForecastRequest,
    ForecastResponse, MatchCustomerRequest, MatchCustomerResponse, MatchKind,
    MatchTransactionRequest, SyncAccountRequest, SyncAccountResponse, UnmatchTransactionRequest,
    parse_forecast_kind, parse_match_kind,
};
pub use errors::{ErrorResponse, error_code};
pub use service::EngineService;
