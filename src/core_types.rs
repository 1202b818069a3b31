use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{Debug, Display},
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AflError {
    pub msg: String,
}
impl AflError {
    pub fn new(msg: &str) -> Self {
        AflError {
            msg: msg.to_string(),
        }
    }
}
impl Display for AflError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.msg)
    }
}
impl Error for AflError {}
#[macro_export]
macro_rules! aflerr {
    ($s:literal $(, $exps:expr )*) => {
        $crate::core_types::AflError::new(format!($s, $($exps,)*).as_str())
    }
}

pub type AflResult<T> = Result<T, AflError>;

pub fn to_afl<E: Debug>(e: E) -> AflError {
    AflError {
        msg: format!("{e:?}"),
    }
}

#[test]
fn test_aflerr() {
    let e = aflerr!("asset {} not found", "PETR4");
    assert_eq!(e.to_string(), "asset PETR4 not found");
    let e = to_afl("boom");
    assert_eq!(e.msg, "\"boom\"");
}
