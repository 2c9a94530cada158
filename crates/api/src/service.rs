//! Transport-agnostic facade over the engines.

use chrono::{Datelike, NaiveDate};

use finsight_core::{EngineError, EngineResult};
use finsight_forecast::RevenueForecaster;
use finsight_ledger::{LedgerReader, ReconciliationStore};
use finsight_matching::CustomerMatcher;
use finsight_reconciliation::{BankAdapter, ReconciliationEngine, SyncWindow};

use crate::context::TenantContext;
use crate::dto::{
    AckResponse, CustomerLookupRequest, CustomerLookupResponse, ForecastKind, ForecastRequest,
    ForecastResponse, MatchCustomerRequest, MatchCustomerResponse, MatchKind,
    MatchTransactionRequest, SyncAccountRequest, SyncAccountResponse, UnmatchTransactionRequest,
    parse_forecast_kind, parse_match_kind,
};

/// Horizon used when a forecast request leaves `months` unset.
const DEFAULT_HORIZON_MONTHS: u32 = 6;

/// One entry point per externally callable operation, every engine wired
/// over the same ledger store. A transport layer deserializes into the
/// request DTOs and renders failures through `ErrorResponse`; this type
/// never sees the wire.
pub struct EngineService<S> {
    forecaster: RevenueForecaster<S>,
    matcher: CustomerMatcher<S>,
    reconciliation: ReconciliationEngine<S>,
}

impl<S> EngineService<S>
where
    S: LedgerReader + ReconciliationStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            forecaster: RevenueForecaster::new(store.clone()),
            matcher: CustomerMatcher::new(store.clone()),
            reconciliation: ReconciliationEngine::new(store),
        }
    }

    /// Wires pre-configured engines when a default knob is not good enough.
    pub fn with_engines(
        forecaster: RevenueForecaster<S>,
        matcher: CustomerMatcher<S>,
        reconciliation: ReconciliationEngine<S>,
    ) -> Self {
        Self {
            forecaster,
            matcher,
            reconciliation,
        }
    }

    /// Computes the sections named by `request.kind`; `all` fills every
    /// section of the response. `today` anchors the cash-flow and turnover
    /// projections.
    pub fn forecast(
        &self,
        ctx: TenantContext,
        request: ForecastRequest,
        today: NaiveDate,
    ) -> EngineResult<ForecastResponse> {
        let kind = parse_forecast_kind(&request.kind)?;
        let tenant_id = ctx.tenant_id();
        let months = request.months.unwrap_or(DEFAULT_HORIZON_MONTHS);
        tracing::debug!("Computing {} forecast for tenant {}", kind.as_str(), tenant_id);

        let mut response = ForecastResponse::empty(kind);
        if matches!(kind, ForecastKind::Revenue | ForecastKind::All) {
            response.revenue = Some(self.forecaster.forecast_revenue(tenant_id, months)?);
        }
        if matches!(kind, ForecastKind::CashFlow | ForecastKind::All) {
            let balance = request.current_balance.ok_or_else(|| {
                EngineError::validation("cash-flow forecasts require current_balance")
            })?;
            response.cash_flow = Some(self.forecaster.forecast_cash_flow(
                tenant_id,
                months,
                balance,
                today,
                &request.outflows,
            )?);
        }
        if matches!(kind, ForecastKind::Seasonality | ForecastKind::All) {
            response.seasonality = Some(self.forecaster.seasonality_analysis(tenant_id));
        }
        if matches!(kind, ForecastKind::Growth | ForecastKind::All) {
            response.growth = Some(self.forecaster.growth_metrics(tenant_id));
        }
        if matches!(kind, ForecastKind::Turnover | ForecastKind::All) {
            let year = request.year.unwrap_or_else(|| today.year());
            response.turnover =
                Some(self.forecaster.predict_annual_turnover(tenant_id, year, today)?);
        }
        Ok(response)
    }

    pub fn match_customer(
        &self,
        ctx: TenantContext,
        request: MatchCustomerRequest,
    ) -> EngineResult<MatchCustomerResponse> {
        let kind = match request.kind.as_deref() {
            Some(kind) => parse_match_kind(kind)?,
            None => MatchKind::Generic,
        };
        if let Some(floor) = request.min_confidence {
            if !(0.0..=1.0).contains(&floor) {
                return Err(EngineError::validation("min confidence must be within [0, 1]"));
            }
        }

        let tenant_id = ctx.tenant_id();
        let mut matches = match kind {
            MatchKind::Generic => {
                self.matcher
                    .match_from_text(tenant_id, &request.text, request.min_confidence)?
            }
            MatchKind::Email => {
                let sender = request.sender_email.as_deref().unwrap_or("");
                self.matcher.match_from_email(tenant_id, &request.text, sender)?
            }
            MatchKind::Document => self.matcher.match_from_document(tenant_id, &request.text)?,
        };
        // Email and document matching run on the engine's own floor; a
        // stricter caller floor still applies on top.
        if let Some(floor) = request.min_confidence {
            matches.retain(|candidate| candidate.confidence >= floor);
        }
        Ok(MatchCustomerResponse::from(matches))
    }

    /// Exact lookup when `identifier` is set, fuzzy suggestions when
    /// `query` is set. Asking for both (or neither) is a caller mistake.
    pub fn lookup_customer(
        &self,
        ctx: TenantContext,
        request: CustomerLookupRequest,
    ) -> EngineResult<CustomerLookupResponse> {
        let tenant_id = ctx.tenant_id();
        match (request.identifier.as_deref(), request.query.as_deref()) {
            (Some(identifier), None) => Ok(CustomerLookupResponse {
                customer: self.matcher.find_by_identifier(tenant_id, identifier)?,
                suggestions: Vec::new(),
            }),
            (None, Some(query)) => Ok(CustomerLookupResponse {
                customer: None,
                suggestions: self.matcher.suggest(tenant_id, query, request.limit),
            }),
            _ => Err(EngineError::validation(
                "exactly one of identifier or query must be provided",
            )),
        }
    }

    pub fn sync_account(
        &self,
        ctx: TenantContext,
        request: SyncAccountRequest,
        adapter: &dyn BankAdapter,
        today: NaiveDate,
    ) -> EngineResult<SyncAccountResponse> {
        let window = match (request.date_from, request.date_to) {
            (Some(from), Some(to)) => Some(SyncWindow { from, to }),
            (None, None) => None,
            _ => {
                return Err(EngineError::validation(
                    "date_from and date_to must be provided together",
                ));
            }
        };
        let report = self.reconciliation.sync_account(
            ctx.tenant_id(),
            request.account_id,
            adapter,
            window,
            today,
        )?;
        Ok(SyncAccountResponse::from(report))
    }

    pub fn match_transaction(
        &self,
        ctx: TenantContext,
        request: MatchTransactionRequest,
    ) -> EngineResult<AckResponse> {
        self.reconciliation.match_transaction(
            ctx.tenant_id(),
            request.transaction_id,
            request.invoice_id,
        )?;
        Ok(AckResponse::ok())
    }

    pub fn unmatch_transaction(
        &self,
        ctx: TenantContext,
        request: UnmatchTransactionRequest,
    ) -> EngineResult<AckResponse> {
        self.reconciliation
            .unmatch_transaction(ctx.tenant_id(), request.transaction_id)?;
        Ok(AckResponse::ok())
    }
}
