use super::common::*;
use crate::error::ErrorKind;
use crate::workflows::records::domain::{KpiRecord, KpiRecordStatus};
use crate::workflows::records::lifecycle::{
    can_approve, can_submit, is_editable, parse_actual, LifecycleError, RecordAction,
};
use rust_decimal::Decimal;

const ALL_STATUSES: [KpiRecordStatus; 4] = [
    KpiRecordStatus::Pending,
    KpiRecordStatus::AwaitingApproval,
    KpiRecordStatus::Approved,
    KpiRecordStatus::Rejected,
];

#[test]
fn editable_exactly_when_pending_or_rejected() {
    for status in ALL_STATUSES {
        let expected = matches!(status, KpiRecordStatus::Pending | KpiRecordStatus::Rejected);
        assert_eq!(is_editable(status), expected, "{status}");
    }
}

#[test]
fn submit_requires_editable_status_and_positive_actual() {
    assert!(can_submit(KpiRecordStatus::Pending, dec(1)));
    assert!(can_submit(KpiRecordStatus::Rejected, Decimal::new(1, 2)));
    assert!(!can_submit(KpiRecordStatus::Pending, Decimal::ZERO));
    assert!(!can_submit(KpiRecordStatus::Pending, dec(-5)));
    assert!(!can_submit(KpiRecordStatus::AwaitingApproval, dec(50)));
    assert!(!can_submit(KpiRecordStatus::Approved, dec(50)));
}

#[test]
fn approval_only_from_awaiting_approval() {
    for status in ALL_STATUSES {
        assert_eq!(
            can_approve(status),
            status == KpiRecordStatus::AwaitingApproval
        );
    }
}

#[test]
fn update_actual_keeps_status_and_accepts_zero() {
    let record = pending_record("r1");
    let updated = record
        .apply(&RecordAction::UpdateActual(Decimal::ZERO))
        .expect("zero is a valid actual");
    assert_eq!(updated.status, KpiRecordStatus::Pending);
    assert_eq!(updated.actual, Decimal::ZERO);

    let rejected = record_with(KpiRecordStatus::Rejected);
    let updated = rejected
        .apply(&RecordAction::UpdateActual(dec(75)))
        .expect("rejected records reopen editing");
    assert_eq!(updated.status, KpiRecordStatus::Rejected);
    assert_eq!(updated.actual, dec(75));
}

#[test]
fn submit_moves_to_awaiting_approval() {
    let mut record = pending_record("r1");
    record.actual = dec(50);

    let submitted = record
        .apply(&RecordAction::SubmitReport("q1.pdf".to_string()))
        .expect("submission accepted");

    assert_eq!(submitted.status, KpiRecordStatus::AwaitingApproval);
    assert_eq!(submitted.submitted_report, "q1.pdf");
    assert_eq!(record.status, KpiRecordStatus::Pending, "input untouched");
}

#[test]
fn submit_without_actual_is_a_guard_violation() {
    let record = pending_record("r1");
    let err = record
        .apply(&RecordAction::SubmitReport("q1.pdf".to_string()))
        .expect_err("actual is zero");
    assert_eq!(
        err,
        LifecycleError::ActualNotReported {
            actual: Decimal::ZERO
        }
    );
    assert_eq!(err.kind(), ErrorKind::GuardViolation);
}

#[test]
fn submit_without_report_is_a_validation_error() {
    let mut record = pending_record("r1");
    record.actual = dec(10);
    let err = record
        .apply(&RecordAction::SubmitReport("   ".to_string()))
        .expect_err("blank report");
    assert_eq!(err, LifecycleError::MissingReport);
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn approve_clears_comment() {
    let mut record = record_with(KpiRecordStatus::AwaitingApproval);
    record.approval_comment = "previous rejection".to_string();

    let approved = record.apply(&RecordAction::Approve).expect("approved");
    assert_eq!(approved.status, KpiRecordStatus::Approved);
    assert_eq!(approved.approval_comment, "");
}

#[test]
fn approve_pending_is_a_guard_violation() {
    let record = pending_record("r1");
    let err = record.apply(&RecordAction::Approve).expect_err("pending");
    assert_eq!(
        err,
        LifecycleError::NotAwaitingApproval {
            status: KpiRecordStatus::Pending
        }
    );
    assert_eq!(err.kind(), ErrorKind::GuardViolation);
}

#[test]
fn reject_requires_non_blank_reason() {
    let record = record_with(KpiRecordStatus::AwaitingApproval);
    for reason in ["", "  \t"] {
        let err = record
            .apply(&RecordAction::Reject(reason.to_string()))
            .expect_err("blank reason");
        assert_eq!(err, LifecycleError::EmptyRejectionReason);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    let rejected = record
        .apply(&RecordAction::Reject("missing evidence".to_string()))
        .expect("rejected");
    assert_eq!(rejected.status, KpiRecordStatus::Rejected);
    assert_eq!(rejected.approval_comment, "missing evidence");
}

#[test]
fn approved_records_are_terminal() {
    let record = record_with(KpiRecordStatus::Approved);
    let actions = [
        RecordAction::UpdateActual(dec(1)),
        RecordAction::SubmitReport("late.pdf".to_string()),
        RecordAction::Approve,
        RecordAction::Reject("too late".to_string()),
    ];
    for action in actions {
        let err = record.apply(&action).expect_err("approved is terminal");
        assert_eq!(err.kind(), ErrorKind::GuardViolation, "{}", action.label());
    }
}

#[test]
fn approved_records_never_carry_a_comment() {
    for status in ALL_STATUSES {
        let mut record = record_with(status);
        record.actual = dec(10);
        record.approval_comment = "stale".to_string();
        let actions = [
            RecordAction::UpdateActual(dec(20)),
            RecordAction::SubmitReport("r.pdf".to_string()),
            RecordAction::Approve,
            RecordAction::Reject("nope".to_string()),
        ];
        for action in actions {
            if let Ok(next) = record.apply(&action) {
                if next.status == KpiRecordStatus::Approved {
                    assert!(next.approval_comment.is_empty());
                }
            }
        }
    }
}

#[test]
fn parse_actual_rejects_non_numeric_input() {
    assert_eq!(parse_actual(" 42.5 ").expect("decimal"), Decimal::new(425, 1));
    assert_eq!(parse_actual("1e3").expect("scientific"), dec(1000));
    let err = parse_actual("fifty").expect_err("not a number");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(parse_actual("NaN").is_err());
}

fn record_with(status: KpiRecordStatus) -> KpiRecord {
    record("r1", 100, 50, status)
}
