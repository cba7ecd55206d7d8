//! Month-end cycle close through the service and the in-memory store.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use aquabill_billing::{AgingBuckets, Bill, BillStatus, MeterReading, PaymentStatus};
use aquabill_core::{DomainError, MeterId};
use aquabill_infra::{BillingStore, ManualBill, MeterSelector};
use aquabill_tariffs::CustomerType;

use common::{add_meter, consume, period, service, Service};

fn close(service: &Service, meter_id: MeterId, month: &str, carry_balance: bool) -> Bill {
    let summary = service
        .run_billing_cycle(MeterSelector::Meter(meter_id), period(month), carry_balance)
        .unwrap();
    assert_eq!(summary.succeeded, 1, "{:?}", summary.results);
    let closed = summary.results[0].outcome.clone().unwrap();
    service.get_bill(closed.bill_id).unwrap()
}

#[test]
fn carried_balance_ages_by_one_bucket() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    consume(&service, meter, dec!(10));
    let january = close(&service, meter, "2024-01", true);
    assert_eq!(january.total_bill_amount(), dec!(100));
    assert_eq!(january.status(), BillStatus::Draft);

    consume(&service, meter, dec!(20));
    let february = close(&service, meter, "2024-02", true);

    assert_eq!(february.total_bill_amount(), dec!(200));
    assert_eq!(february.aging().debit_30, dec!(200));
    assert_eq!(february.aging().debit_30_60, dec!(100));
    assert_eq!(february.aging().debit_60, Decimal::ZERO);
    assert_eq!(february.outstanding_amount(), dec!(300));
    assert_eq!(february.months_overdue(), 1);
    assert_eq!(february.previous_reading(), dec!(10));
    assert_eq!(february.current_reading(), dec!(30));
}

#[test]
fn current_reading_opens_the_next_cycle() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    consume(&service, meter, dec!(7));
    close(&service, meter, "2024-01", true);

    let reading = service.store().get_meter_reading(meter).unwrap().unwrap();
    assert_eq!(reading.previous, dec!(7));
    assert_eq!(reading.usage().unwrap(), Decimal::ZERO);
}

#[test]
fn mark_paid_writes_off_the_prior_bill() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    consume(&service, meter, dec!(10));
    let january = close(&service, meter, "2024-01", true);

    consume(&service, meter, dec!(20));
    let february = close(&service, meter, "2024-02", false);

    assert_eq!(february.aging().debit_30, dec!(200));
    assert_eq!(february.aging().debit_30_60, Decimal::ZERO);
    assert_eq!(february.aging().debit_60, Decimal::ZERO);
    assert_eq!(february.outstanding_amount(), dec!(200));
    assert_eq!(february.months_overdue(), 0);

    let january = service.get_bill(january.id_typed()).unwrap();
    assert_eq!(january.payment_status(), PaymentStatus::Paid);
    assert!(january.is_written_off());
    assert!(january.outstanding_amount().is_zero());
    // Written off, not paid: no workflow activity is implied.
    assert!(service.workflow_history(january.id_typed()).unwrap().is_empty());
}

#[test]
fn penalty_is_charged_on_the_live_balance() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    let mut bills = Vec::new();
    for month in ["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"] {
        consume(&service, meter, dec!(10));
        bills.push(close(&service, meter, month, true));
    }

    let overdue: Vec<u32> = bills.iter().map(|b| b.months_overdue()).collect();
    assert_eq!(overdue, vec![0, 1, 2, 3, 4]);

    // April: 3 months overdue on 300 outstanding at 0.15 + 0.
    assert_eq!(bills[3].penalty_amount(), dec!(45));
    assert_eq!(bills[3].total_bill_amount(), dec!(145));
    assert_eq!(bills[3].outstanding_amount(), dec!(445));

    // May: 4 months overdue on 445 at 0.15 + 0.10.
    assert_eq!(bills[4].penalty_amount(), dec!(111.25));
    assert_eq!(bills[4].total_bill_amount(), dec!(211.25));
    assert_eq!(
        bills[4].outstanding_amount(),
        bills[4].aging().debit_30 + bills[4].aging().debit_30_60 + bills[4].aging().debit_60
    );
}

#[test]
fn payment_resets_overdue_tracking() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    consume(&service, meter, dec!(10));
    close(&service, meter, "2024-01", true);
    consume(&service, meter, dec!(10));
    let february = close(&service, meter, "2024-02", true);

    service.record_payment(february.id_typed()).unwrap();

    consume(&service, meter, dec!(10));
    let march = close(&service, meter, "2024-03", true);
    assert_eq!(march.months_overdue(), 0);
    assert_eq!(march.penalty_amount(), Decimal::ZERO);
    assert_eq!(march.outstanding_amount(), dec!(100));
}

#[test]
fn all_meters_mode_isolates_failures() {
    let service = service();
    let good = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));
    // No tariff published for rental customers.
    let no_tariff = add_meter(&service, CustomerType::RentalDomestic, Some("1/2"));
    // Domestic tariff has no rent price for 2".
    let no_rent = add_meter(&service, CustomerType::Domestic, Some("2"));
    for meter in [good, no_tariff, no_rent] {
        consume(&service, meter, dec!(5));
    }

    let summary = service
        .run_billing_cycle(MeterSelector::All, period("2024-01"), true)
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.results.len(), 3);
    assert!(summary.result_for(good).unwrap().outcome.is_ok());

    let err = summary.result_for(no_tariff).unwrap().outcome.clone().unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
    let err = summary.result_for(no_rent).unwrap().outcome.clone().unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::MissingRentPrice(_))));

    // Failed meters keep their open reading.
    let reading = service.store().get_meter_reading(no_rent).unwrap().unwrap();
    assert_eq!(reading.usage().unwrap(), dec!(5));
}

#[test]
fn parallel_workers_close_every_meter() {
    let service = aquabill_infra::BillingService::new(
        aquabill_infra::InMemoryBillingStore::new(),
        aquabill_infra::BillingConfig::default().with_cycle_workers(3),
    );
    service.publish_tariff(common::flat_tariff()).unwrap();

    let meters: Vec<MeterId> = (0..10)
        .map(|_| add_meter(&service, CustomerType::NonDomestic, None))
        .collect();
    for meter in &meters {
        consume(&service, *meter, dec!(3));
    }

    let summary = service
        .run_billing_cycle(MeterSelector::All, period("2024-01"), true)
        .unwrap();
    assert_eq!(summary.succeeded, 10);
    assert_eq!(summary.failed, 0);
    for meter in &meters {
        let closed = summary.result_for(*meter).unwrap().outcome.clone().unwrap();
        assert_eq!(closed.total_bill_amount, dec!(30));
    }
}

#[test]
fn closing_the_same_period_twice_fails_for_that_meter() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    consume(&service, meter, dec!(10));
    close(&service, meter, "2024-01", true);

    let summary = service
        .run_billing_cycle(MeterSelector::Meter(meter), period("2024-01"), true)
        .unwrap();
    assert_eq!(summary.failed, 1);
    let err = summary.results[0].outcome.clone().unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
}

#[test]
fn unknown_meter_is_reported_not_raised() {
    let service = service();
    let summary = service
        .run_billing_cycle(MeterSelector::Meter(MeterId::new()), period("2024-01"), true)
        .unwrap();
    assert_eq!(summary.failed, 1);
    let err = summary.results[0].outcome.clone().unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
}

fn manual(meter_id: MeterId, month: &str, previous: Decimal, current: Decimal) -> ManualBill {
    ManualBill {
        meter_id,
        month_year: period(month),
        reading: MeterReading::new(previous, current).unwrap(),
        opening_balance: AgingBuckets::default(),
    }
}

#[test]
fn manual_bill_rolls_the_reading_for_the_next_cycle() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));

    consume(&service, meter, dec!(10));
    let january = service
        .create_manual_bill(manual(meter, "2024-01", dec!(0), dec!(10)))
        .unwrap();
    assert_eq!(january.total_bill_amount(), dec!(100));

    let reading = service.store().get_meter_reading(meter).unwrap().unwrap();
    assert_eq!(reading.previous, dec!(10));
    assert_eq!(reading.usage().unwrap(), Decimal::ZERO);

    consume(&service, meter, dec!(20));
    let february = close(&service, meter, "2024-02", true);

    // Only February's 20 units; January's 10 were billed manually.
    assert_eq!(february.previous_reading(), dec!(10));
    assert_eq!(february.current_reading(), dec!(30));
    assert_eq!(february.total_bill_amount(), dec!(200));
    assert_eq!(february.aging().debit_30_60, dec!(100));
}

#[test]
fn manual_bill_must_start_at_the_open_reading() {
    let service = service();
    let meter = add_meter(&service, CustomerType::NonDomestic, Some("1/2"));
    consume(&service, meter, dec!(10));

    let err = service
        .create_manual_bill(manual(meter, "2024-01", dec!(5), dec!(10)))
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::Validation(_))));

    assert!(service.store().latest_bill_for_meter(meter).unwrap().is_none());
    let reading = service.store().get_meter_reading(meter).unwrap().unwrap();
    assert_eq!(reading.usage().unwrap(), dec!(10));
}
