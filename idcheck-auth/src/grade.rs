//! Capability grades
//!
//! A grade is how well an authenticator service believes it can evaluate a
//! given identity application. Grades are totally ordered: a higher grade
//! always means "more suited".

use serde::{Deserialize, Serialize};

/// How well a service supports an identity application
///
/// The variant order is the grade order, so the derived `Ord` is the
/// selection order used by the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    /// The service cannot evaluate the application at all
    #[default]
    NotAtAll,
    /// The service might be able to say something
    Perhaps,
    /// The service can evaluate the application
    Ok,
    /// The service is well suited
    Good,
    /// The service is the best fit there is
    Excellent,
}

impl Grade {
    /// All grades, lowest first
    pub const ALL: [Grade; 5] = [
        Grade::NotAtAll,
        Grade::Perhaps,
        Grade::Ok,
        Grade::Good,
        Grade::Excellent,
    ];

    /// Whether a service with this grade may be selected
    pub fn is_supported(self) -> bool {
        self > Grade::NotAtAll
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::NotAtAll => write!(f, "not_at_all"),
            Grade::Perhaps => write!(f, "perhaps"),
            Grade::Ok => write!(f, "ok"),
            Grade::Good => write!(f, "good"),
            Grade::Excellent => write!(f, "excellent"),
        }
    }
}

impl std::str::FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_at_all" | "notatall" | "not-at-all" | "none" => Ok(Grade::NotAtAll),
            "perhaps" => Ok(Grade::Perhaps),
            "ok" => Ok(Grade::Ok),
            "good" => Ok(Grade::Good),
            "excellent" => Ok(Grade::Excellent),
            _ => Err(format!("Unknown grade: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_order_is_total_and_monotone() {
        for pair in Grade::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(Grade::ALL.iter().max(), Some(&Grade::Excellent));
    }

    #[test]
    fn test_only_not_at_all_is_unsupported() {
        assert!(!Grade::NotAtAll.is_supported());
        assert!(Grade::Perhaps.is_supported());
        assert!(Grade::Excellent.is_supported());
    }

    #[test]
    fn test_grade_parsing() {
        assert_eq!("not_at_all".parse::<Grade>().unwrap(), Grade::NotAtAll);
        assert_eq!("NotAtAll".parse::<Grade>().unwrap(), Grade::NotAtAll);
        assert_eq!("Good".parse::<Grade>().unwrap(), Grade::Good);
        assert!("superb".parse::<Grade>().is_err());
    }

    #[test]
    fn test_grade_display_round_trips_through_serde() {
        let json = serde_json::to_string(&Grade::Excellent).unwrap();
        assert_eq!(json, "\"excellent\"");
        assert_eq!(Grade::Excellent.to_string(), "excellent");
    }
}
