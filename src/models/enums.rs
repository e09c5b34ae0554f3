use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
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
    };
}

str_enum!(FrequencyType {
    FixedTimes => "fixed_times",
    Interval => "interval",
    Custom => "custom",
});

str_enum!(DoseStatus {
    Pending => "pending",
    Completed => "completed",
    Skipped => "skipped",
    Snoozed => "snoozed",
});

str_enum!(AdjustmentType {
    OneTime => "one_time",
    Permanent => "permanent",
});

str_enum!(TimeSlot {
    Morning => "morning",
    Afternoon => "afternoon",
    Evening => "evening",
});

str_enum!(SlotStatus {
    NoMedication => "no_medication",
    Completed => "completed",
    Partial => "partial",
    Missed => "missed",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn frequency_type_round_trip() {
        for (variant, s) in [
            (FrequencyType::FixedTimes, "fixed_times"),
            (FrequencyType::Interval, "interval"),
            (FrequencyType::Custom, "custom"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(FrequencyType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn dose_status_round_trip() {
        for (variant, s) in [
            (DoseStatus::Pending, "pending"),
            (DoseStatus::Completed, "completed"),
            (DoseStatus::Skipped, "skipped"),
            (DoseStatus::Snoozed, "snoozed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(DoseStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn slot_status_round_trip() {
        for (variant, s) in [
            (SlotStatus::NoMedication, "no_medication"),
            (SlotStatus::Completed, "completed"),
            (SlotStatus::Partial, "partial"),
            (SlotStatus::Missed, "missed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(SlotStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(FrequencyType::from_str("weekly").is_err());
        assert!(DoseStatus::from_str("missed").is_err());
        assert!(AdjustmentType::from_str("").is_err());
    }
}
