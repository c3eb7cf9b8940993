//! Intake payloads accepted at the HTTP boundary, with their field rules.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::donor::Donor;
use super::enums::{BloodType, LotStatus, RequestStatus, Urgency};
use super::inventory::InventoryLot;
use super::recipient::Recipient;
use super::request::BloodRequest;

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(format!("{field} must be between {min} and {max} characters"));
    }
    Ok(())
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("{field} must be between {min} and {max}"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDonor {
    pub name: String,
    pub age: u8,
    pub blood_type: BloodType,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub last_donation: Option<DateTime<Utc>>,
}

impl NewDonor {
    pub fn validate(&self) -> Result<(), String> {
        check_len("Name", &self.name, 2, 100)?;
        check_range("Age", u32::from(self.age), 18, 65)?;
        check_len("Phone number", &self.phone, 10, 15)?;
        let email = self.email.trim();
        if email.len() < 3 || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err("Invalid email address".into());
        }
        check_len("Address", &self.address, 10, 200)?;
        Ok(())
    }

    pub fn into_donor(self, now: DateTime<Utc>) -> Donor {
        Donor {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            age: self.age,
            blood_type: self.blood_type,
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            address: self.address.trim().to_string(),
            last_donation: self.last_donation,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipient {
    pub name: String,
    pub age: u8,
    pub blood_type: BloodType,
    pub phone: String,
    pub hospital: String,
    pub units_required: u32,
    pub urgency: Urgency,
}

impl NewRecipient {
    pub fn validate(&self) -> Result<(), String> {
        check_len("Name", &self.name, 2, 100)?;
        check_range("Age", u32::from(self.age), 1, 120)?;
        check_len("Phone number", &self.phone, 10, 15)?;
        check_len("Hospital name", &self.hospital, 2, 100)?;
        check_range("Units required", self.units_required, 1, 10)?;
        Ok(())
    }

    pub fn into_recipient(self, now: DateTime<Utc>) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            age: self.age,
            blood_type: self.blood_type,
            phone: self.phone.trim().to_string(),
            hospital: self.hospital.trim().to_string(),
            units_required: self.units_required,
            urgency: self.urgency,
            status: RequestStatus::Pending,
            processed_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryLot {
    pub blood_type: BloodType,
    pub units: u32,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub donor_id: Option<Uuid>,
    #[serde(default)]
    pub collection_date: Option<DateTime<Utc>>,
}

impl NewInventoryLot {
    pub fn validate(&self) -> Result<(), String> {
        if self.units < 1 {
            return Err("Units must be at least 1".into());
        }
        Ok(())
    }

    pub fn into_lot(self, now: DateTime<Utc>) -> InventoryLot {
        InventoryLot {
            id: Uuid::new_v4(),
            blood_type: self.blood_type,
            units: self.units,
            expiry_date: self.expiry_date,
            donor_id: self.donor_id,
            status: LotStatus::Available,
            collection_date: self.collection_date.unwrap_or(now),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A free-standing request, not tied to a registered recipient.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBloodRequest {
    pub recipient_name: String,
    pub blood_type: BloodType,
    pub units: u32,
    pub hospital: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewBloodRequest {
    pub fn validate(&self) -> Result<(), String> {
        check_len("Recipient name", &self.recipient_name, 2, 100)?;
        check_len("Hospital name", &self.hospital, 2, 100)?;
        if self.units < 1 {
            return Err("Units must be at least 1".into());
        }
        Ok(())
    }

    pub fn into_request(self, now: DateTime<Utc>) -> BloodRequest {
        BloodRequest {
            id: Uuid::new_v4(),
            recipient_id: None,
            recipient_name: self.recipient_name.trim().to_string(),
            blood_type: self.blood_type,
            units: self.units,
            hospital: self.hospital.trim().to_string(),
            urgency: self.urgency,
            status: RequestStatus::Pending,
            notes: self.notes.map(|n| n.trim().to_string()),
            processed_by: None,
            allocated_lot_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl BloodRequest {
    /// Build the pending request that mirrors a recipient's demand.
    /// It inherits the recipient's intake time so batch order stays fair
    /// even when the request is raised late by a sync pass.
    pub fn for_recipient(recipient: &Recipient, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: Some(recipient.id),
            recipient_name: recipient.name.clone(),
            blood_type: recipient.blood_type,
            units: recipient.units_required,
            hospital: recipient.hospital.clone(),
            urgency: recipient.urgency,
            status: RequestStatus::Pending,
            notes: None,
            processed_by: None,
            allocated_lot_id: None,
            created_at: recipient.created_at,
            updated_at: now,
        }
    }
}
