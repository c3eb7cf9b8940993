//! ABO/Rh red-cell compatibility.
//!
//! A donor is compatible when the donor cells carry no ABO antigen the
//! recipient lacks, and an Rh+ donor only goes to an Rh+ recipient.
//! O- therefore donates to everyone and AB+ receives from everyone.

use crate::models::enums::BloodType;

/// Can `recipient` safely receive red cells of type `donor`?
pub fn is_compatible(recipient: BloodType, donor: BloodType) -> bool {
    recipient.abo().accepts(donor.abo()) && (recipient.rh_positive() || !donor.rh_positive())
}

/// Every donor type `recipient` can receive, exact type included.
pub fn compatible_donor_types(recipient: BloodType) -> Vec<BloodType> {
    BloodType::ALL
        .into_iter()
        .filter(|donor| is_compatible(recipient, *donor))
        .collect()
}

/// Donor types usable in place of an exact match.
pub fn substitute_donor_types(recipient: BloodType) -> Vec<BloodType> {
    BloodType::ALL
        .into_iter()
        .filter(|donor| *donor != recipient && is_compatible(recipient, *donor))
        .collect()
}

/// Reverse direction: every recipient type that can receive from `donor`.
pub fn compatible_recipient_types(donor: BloodType) -> Vec<BloodType> {
    BloodType::ALL
        .into_iter()
        .filter(|recipient| is_compatible(*recipient, donor))
        .collect()
}
