//! Priority score for a (request, lot) pairing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::compatibility::is_compatible;
use crate::models::enums::Urgency;
use crate::models::{BloodRequest, InventoryLot};

/// Scores at or above this approve the request.
pub const APPROVAL_THRESHOLD: u8 = 70;

pub const MAX_SCORE: u8 = 100;

/// Per-component points, kept for logging and decision reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub urgency: u8,
    pub type_match: u8,
    pub abundance: u8,
    pub freshness: u8,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        let sum = u16::from(self.urgency)
            + u16::from(self.type_match)
            + u16::from(self.abundance)
            + u16::from(self.freshness);
        sum.min(u16::from(MAX_SCORE)) as u8
    }
}

fn urgency_points(urgency: Urgency) -> u8 {
    match urgency {
        Urgency::Critical => 40,
        Urgency::High => 30,
        Urgency::Medium => 20,
        Urgency::Low => 10,
    }
}

fn abundance_points(available: u32, needed: u32) -> u8 {
    let available = u64::from(available);
    let needed = u64::from(needed);
    if available >= needed * 3 {
        20
    } else if available >= needed * 2 {
        15
    } else if available >= needed {
        10
    } else {
        0
    }
}

fn freshness_points(days_to_expiry: i64) -> u8 {
    match days_to_expiry {
        d if d > 30 => 10,
        d if d > 14 => 7,
        d if d > 7 => 5,
        _ => 0,
    }
}

pub fn breakdown(request: &BloodRequest, lot: &InventoryLot, now: DateTime<Utc>) -> ScoreBreakdown {
    let type_match = if lot.blood_type == request.blood_type {
        30
    } else if is_compatible(request.blood_type, lot.blood_type) {
        20
    } else {
        0
    };

    ScoreBreakdown {
        urgency: urgency_points(request.urgency),
        type_match,
        abundance: abundance_points(lot.units, request.units),
        freshness: freshness_points(lot.days_to_expiry(now)),
    }
}

/// Score in `0..=100`. Higher means the pairing should be served.
pub fn score(request: &BloodRequest, lot: &InventoryLot, now: DateTime<Utc>) -> u8 {
    breakdown(request, lot, now).total()
}

pub fn is_approvable(score: u8) -> bool {
    score >= APPROVAL_THRESHOLD
}
