use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Literal {
    UInt(u64),
    Int(i64),
}

impl Literal {
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::UInt(uint) => i64::try_from(uint).ok(),
            Self::Int(int) => Some(int),
        }
    }

    /// Value as seen by the generated code, which stores every number as `f64`
    pub fn as_f64(self) -> f64 {
        match self {
            Self::UInt(uint) => uint as f64,
            Self::Int(int) => int as f64,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(uint) => write!(f, "{uint}u"),
            Self::Int(int) => write!(f, "{int}"),
        }
    }
}
