use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde representation.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(BloodType {
    APos => "A+",
    ANeg => "A-",
    BPos => "B+",
    BNeg => "B-",
    AbPos => "AB+",
    AbNeg => "AB-",
    OPos => "O+",
    ONeg => "O-",
});

str_enum!(Urgency {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Critical => "Critical",
});

str_enum!(LotStatus {
    Available => "available",
    Reserved => "reserved",
    Used => "used",
    Expired => "expired",
});

str_enum!(RequestStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Fulfilled => "fulfilled",
});

str_enum!(DecisionActor {
    Auto => "auto",
    Manual => "manual",
});

/// ABO antigen group, without the Rh factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AboGroup {
    O,
    A,
    B,
    AB,
}

impl AboGroup {
    fn has_a(self) -> bool {
        matches!(self, AboGroup::A | AboGroup::AB)
    }

    fn has_b(self) -> bool {
        matches!(self, AboGroup::B | AboGroup::AB)
    }

    /// True when every antigen on `donor` red cells is also present here.
    pub fn accepts(self, donor: AboGroup) -> bool {
        (!donor.has_a() || self.has_a()) && (!donor.has_b() || self.has_b())
    }
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::APos,
        BloodType::ANeg,
        BloodType::BPos,
        BloodType::BNeg,
        BloodType::AbPos,
        BloodType::AbNeg,
        BloodType::OPos,
        BloodType::ONeg,
    ];

    pub fn abo(&self) -> AboGroup {
        match self {
            BloodType::APos | BloodType::ANeg => AboGroup::A,
            BloodType::BPos | BloodType::BNeg => AboGroup::B,
            BloodType::AbPos | BloodType::AbNeg => AboGroup::AB,
            BloodType::OPos | BloodType::ONeg => AboGroup::O,
        }
    }

    pub fn rh_positive(&self) -> bool {
        matches!(
            self,
            BloodType::APos | BloodType::BPos | BloodType::AbPos | BloodType::OPos
        )
    }
}

impl Urgency {
    /// Batch priority: higher is served first.
    pub fn rank(&self) -> u8 {
        match self {
            Urgency::Critical => 4,
            Urgency::High => 3,
            Urgency::Medium => 2,
            Urgency::Low => 1,
        }
    }
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }
}
