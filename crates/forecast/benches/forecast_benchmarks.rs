use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chrono::Duration;
use finsight_core::{CustomerId, InvoiceId, MonthKey, TenantId};
use finsight_ledger::{Customer, InMemoryLedger, Invoice, InvoiceStatus};
use finsight_forecast::RevenueForecaster;

/// Seed `months` months of paid invoices, four receipts per month.
fn seeded_ledger(months: u32) -> (InMemoryLedger, TenantId) {
    let ledger = InMemoryLedger::new();
    let tenant_id = TenantId::new();
    let customer = Customer {
        id: CustomerId::new(),
        display_name: "Benchmark Customer s.r.o.".to_string(),
        email: None,
        phone: None,
        tax_id: None,
        aliases: Vec::new(),
        active: true,
    };
    let customer_id = customer.id;
    ledger.upsert_customer(tenant_id, customer).unwrap();

    let mut month = MonthKey::new(2022, 1).unwrap();
    for m in 0..months {
        for slot in 0..4u32 {
            let received = month.first_day() + Duration::days(i64::from(slot) * 7);
            let amount = 8_000 + i64::from((m * 7 + slot * 13) % 5_000);
            let invoice = Invoice {
                id: InvoiceId::new(),
                customer_id,
                number: format!("B-{m:03}-{slot}"),
                issue_date: received - Duration::days(14),
                due_date: received,
                total_amount: amount,
                paid_amount: 0,
                currency: "CZK".to_string(),
                status: InvoiceStatus::Sent,
            };
            let invoice_id = invoice.id;
            ledger.insert_invoice(tenant_id, invoice).unwrap();
            ledger
                .record_payment(tenant_id, invoice_id, amount, received)
                .unwrap();
        }
        month = month.next();
    }
    (ledger, tenant_id)
}

fn bench_forecast_revenue(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecast_revenue");
    for months in [12u32, 36, 60] {
        let (ledger, tenant_id) = seeded_ledger(months);
        group.bench_with_input(
            BenchmarkId::from_parameter(months),
            &months,
            |b, _| {
                let forecaster = RevenueForecaster::new(&ledger);
                b.iter(|| {
                    let forecast = forecaster
                        .forecast_revenue(black_box(tenant_id), black_box(12))
                        .unwrap();
                    black_box(forecast)
                });
            },
        );
    }
    group.finish();
}

fn bench_seasonality_analysis(c: &mut Criterion) {
    let (ledger, tenant_id) = seeded_ledger(48);
    c.bench_function("seasonality_analysis_48_months", |b| {
        let forecaster = RevenueForecaster::new(&ledger);
        b.iter(|| black_box(forecaster.seasonality_analysis(black_box(tenant_id))));
    });
}

criterion_group!(benches, bench_forecast_revenue, bench_seasonality_analysis);
criterion_main!(benches);
