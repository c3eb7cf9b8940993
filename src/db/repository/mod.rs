//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table; everything is re-exported here.

mod donor;
mod inventory;
mod recipient;
mod request;
mod stats;

use std::str::FromStr;

use uuid::Uuid;

use super::DatabaseError;
use crate::models::enums::DecisionActor;
use crate::models::DecisionRecord;

pub use donor::*;
pub use inventory::*;
pub use recipient::*;
pub use request::*;
pub use stats::*;

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Split a decision into its (actor, score, reason) columns.
pub(crate) fn decision_columns(
    decision: Option<&DecisionRecord>,
) -> (Option<&'static str>, Option<i64>, Option<String>) {
    match decision {
        Some(d) => (
            Some(d.actor.as_str()),
            d.score.map(i64::from),
            Some(d.reason.clone()),
        ),
        None => (None, None, None),
    }
}

pub(crate) fn decision_from_columns(
    actor: Option<String>,
    score: Option<i64>,
    reason: Option<String>,
) -> Result<Option<DecisionRecord>, DatabaseError> {
    let Some(actor) = actor else {
        return Ok(None);
    };
    let score = score
        .map(|s| {
            u8::try_from(s).map_err(|_| {
                DatabaseError::ConstraintViolation(format!("Decision score out of range: {s}"))
            })
        })
        .transpose()?;
    Ok(Some(DecisionRecord {
        actor: DecisionActor::from_str(&actor)?,
        score,
        reason: reason.unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;
    use crate::models::enums::*;
    use rusqlite::Connection;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn make_lot(conn: &Connection, blood_type: BloodType, units: u32, expiry_days: i64) -> InventoryLot {
        let lot = NewInventoryLot {
            blood_type,
            units,
            expiry_date: t0() + Duration::days(expiry_days),
            donor_id: None,
            collection_date: None,
        }
        .into_lot(t0());
        insert_lot(conn, &lot).unwrap();
        lot
    }

    fn make_recipient(conn: &Connection, name: &str, created: chrono::DateTime<Utc>) -> Recipient {
        let recipient = NewRecipient {
            name: name.into(),
            age: 40,
            blood_type: BloodType::APos,
            phone: "08000000000".into(),
            hospital: "St. Luke".into(),
            units_required: 2,
            urgency: Urgency::High,
        }
        .into_recipient(created);
        insert_recipient(conn, &recipient).unwrap();
        recipient
    }

    #[test]
    fn donor_insert_and_list() {
        let conn = test_db();
        let donor = NewDonor {
            name: "Tunde".into(),
            age: 29,
            blood_type: BloodType::ONeg,
            phone: "08011112222".into(),
            email: "tunde@example.com".into(),
            address: "5 Allen Avenue, Ikeja".into(),
            last_donation: None,
        }
        .into_donor(t0());
        insert_donor(&conn, &donor).unwrap();

        let listed = list_donors(&conn).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].blood_type, BloodType::ONeg);
        assert!(listed[0].is_active);
        assert_eq!(get_donor(&conn, &donor.id).unwrap().unwrap().email, "tunde@example.com");
    }

    #[test]
    fn donor_duplicate_email_is_constraint_violation() {
        let conn = test_db();
        let payload = NewDonor {
            name: "Tunde".into(),
            age: 29,
            blood_type: BloodType::ONeg,
            phone: "08011112222".into(),
            email: "tunde@example.com".into(),
            address: "5 Allen Avenue, Ikeja".into(),
            last_donation: None,
        };
        insert_donor(&conn, &payload.clone().into_donor(t0())).unwrap();
        let err = insert_donor(&conn, &payload.into_donor(t0())).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn list_lots_orders_by_expiry_and_filters() {
        let conn = test_db();
        let late = make_lot(&conn, BloodType::APos, 4, 40);
        let early = make_lot(&conn, BloodType::APos, 6, 10);
        make_lot(&conn, BloodType::BPos, 9, 5);
        make_lot(&conn, BloodType::APos, 1, 3);

        let lots = list_lots(&conn, &LotFilter::available(vec![BloodType::APos], 2, t0())).unwrap();
        let ids: Vec<Uuid> = lots.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[test]
    fn list_lots_hides_out_of_date_lots() {
        let conn = test_db();
        make_lot(&conn, BloodType::ONeg, 5, -1);
        let lots = list_lots(&conn, &LotFilter::available(vec![BloodType::ONeg], 1, t0())).unwrap();
        assert!(lots.is_empty());
    }

    #[test]
    fn update_lot_detects_stale_version() {
        let conn = test_db();
        let lot = make_lot(&conn, BloodType::OPos, 5, 20);

        let mut first = lot.clone();
        first.units = 3;
        let version = update_lot(&conn, &first, t0()).unwrap();
        assert_eq!(version, 1);

        let mut stale = lot.clone();
        stale.units = 1;
        let err = update_lot(&conn, &stale, t0()).unwrap_err();
        assert!(matches!(err, DatabaseError::ConcurrentModification { .. }));
        assert_eq!(get_lot(&conn, &lot.id).unwrap().unwrap().units, 3);
    }

    #[test]
    fn update_missing_lot_is_not_found() {
        let conn = test_db();
        let lot = NewInventoryLot {
            blood_type: BloodType::OPos,
            units: 2,
            expiry_date: t0(),
            donor_id: None,
            collection_date: None,
        }
        .into_lot(t0());
        assert!(matches!(
            update_lot(&conn, &lot, t0()),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn mark_expired_only_touches_available_past_lots() {
        let conn = test_db();
        let past = make_lot(&conn, BloodType::ANeg, 3, -2);
        let future = make_lot(&conn, BloodType::ANeg, 3, 2);

        assert_eq!(mark_expired_lots(&conn, t0()).unwrap(), 1);
        assert_eq!(mark_expired_lots(&conn, t0()).unwrap(), 0);
        assert_eq!(get_lot(&conn, &past.id).unwrap().unwrap().status, LotStatus::Expired);
        assert_eq!(get_lot(&conn, &future.id).unwrap().unwrap().status, LotStatus::Available);
    }

    #[test]
    fn pending_request_lookup_by_recipient() {
        let conn = test_db();
        let recipient = make_recipient(&conn, "Bola", t0());
        assert!(find_pending_request_for_recipient(&conn, &recipient.id).unwrap().is_none());

        let request = BloodRequest::for_recipient(&recipient, t0());
        insert_request(&conn, &request).unwrap();
        let found = find_pending_request_for_recipient(&conn, &recipient.id).unwrap().unwrap();
        assert_eq!(found.id, request.id);
    }

    #[test]
    fn request_decision_round_trip() {
        let conn = test_db();
        let recipient = make_recipient(&conn, "Bola", t0());
        let mut request = BloodRequest::for_recipient(&recipient, t0());
        insert_request(&conn, &request).unwrap();

        request.status = RequestStatus::Approved;
        request.processed_by = Some(DecisionRecord::auto(Some(85), "Approved with score 85"));
        update_request(&conn, &request).unwrap();

        let stored = get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        let decision = stored.processed_by.unwrap();
        assert_eq!(decision.actor, DecisionActor::Auto);
        assert_eq!(decision.score, Some(85));
    }

    #[test]
    fn recipient_status_update_and_pending_listing() {
        let conn = test_db();
        let older = make_recipient(&conn, "Older", t0());
        let newer = make_recipient(&conn, "Newer", t0() + Duration::minutes(5));

        let pending = list_pending_recipients(&conn).unwrap();
        assert_eq!(pending[0].id, older.id);
        assert_eq!(pending[1].id, newer.id);

        update_recipient_status(
            &conn,
            &older.id,
            RequestStatus::Rejected,
            &DecisionRecord::manual("Manual Administrator"),
            t0(),
        )
        .unwrap();
        let pending = list_pending_recipients(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, newer.id);
    }

    #[test]
    fn dashboard_stats_counts_available_only() {
        let conn = test_db();
        make_lot(&conn, BloodType::APos, 4, 10);
        make_lot(&conn, BloodType::APos, 2, 20);
        make_lot(&conn, BloodType::ONeg, 3, -1);
        mark_expired_lots(&conn, t0()).unwrap();

        let recipient = make_recipient(&conn, "Bola", t0());
        insert_request(&conn, &BloodRequest::for_recipient(&recipient, t0())).unwrap();

        let stats = fetch_dashboard_stats(&conn).unwrap();
        assert_eq!(stats.total_units, 6);
        assert_eq!(stats.units_by_blood_type.len(), 1);
        assert_eq!(stats.total_recipients, 1);
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.total_requests, 1);
    }

    #[test]
    fn recipient_intake_creates_pending_request() {
        let conn = test_db();
        let recipient = NewRecipient {
            name: "Tunde".into(),
            age: 33,
            blood_type: BloodType::BNeg,
            phone: "08011111111".into(),
            hospital: "Mercy".into(),
            units_required: 3,
            urgency: Urgency::Critical,
        }
        .into_recipient(t0());

        let request = insert_recipient_with_request(&conn, &recipient, t0()).unwrap();
        assert_eq!(request.recipient_id, Some(recipient.id));
        assert_eq!(request.status, RequestStatus::Pending);

        let found = find_pending_request_for_recipient(&conn, &recipient.id).unwrap().unwrap();
        assert_eq!(found.id, request.id);
        assert_eq!(found.units, 3);
    }
}
