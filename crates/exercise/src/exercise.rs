use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported exercises. Wire names are lowercase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exercise {
    #[default]
    Curl,
    Squat,
    Lift,
}

impl Exercise {
    pub const ALL: [Exercise; 3] = [Exercise::Curl, Exercise::Squat, Exercise::Lift];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::Squat => "squat",
            Self::Lift => "lift",
        }
    }
}

impl std::fmt::Display for Exercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exercise: {0}")]
pub struct ParseExerciseError(pub String);

impl FromStr for Exercise {
    type Err = ParseExerciseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ParseExerciseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!("curl".parse::<Exercise>(), Ok(Exercise::Curl));
        assert_eq!("squat".parse::<Exercise>(), Ok(Exercise::Squat));
        assert_eq!("lift".parse::<Exercise>(), Ok(Exercise::Lift));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("Squat".parse::<Exercise>().is_err());
        assert!("pushup".parse::<Exercise>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Exercise::Lift).unwrap(), "\"lift\"");
    }
}
