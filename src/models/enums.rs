use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(TestCategory {
    BloodWork => "Blood Work",
    CtScan => "CT Scan",
    Unknown => "Unknown",
});

str_enum!(ProcessingStatus {
    Success => "success",
    Failed => "failed",
    NonMedical => "non_medical",
});

// What create_or_merge did with the incoming document.
str_enum!(MergeAction {
    Created => "created",
    Updated => "updated",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_category_round_trips() {
        assert_eq!(TestCategory::BloodWork.as_str(), "Blood Work");
        assert_eq!(TestCategory::from_str("CT Scan").unwrap(), TestCategory::CtScan);
    }

    #[test]
    fn invalid_value_is_rejected() {
        let err = ProcessingStatus::from_str("bogus");
        assert!(matches!(err, Err(DatabaseError::InvalidEnum { .. })));
    }

    #[test]
    fn merge_action_display() {
        assert_eq!(MergeAction::Created.to_string(), "created");
        assert_eq!(MergeAction::Updated.to_string(), "updated");
    }
}
