//! Accelerator backend kinds and the fallback order

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accelerator targets the inference engine can run on, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackendKind {
    /// Neural processing unit (fastest, least commonly available)
    Npu,
    /// GPU delegate
    Gpu,
    /// CPU, always available as the last resort
    Cpu,
}

/// Full fallback order. Preference chains are suffixes of this list.
pub const FALLBACK_ORDER: [BackendKind; 3] = [BackendKind::Npu, BackendKind::Gpu, BackendKind::Cpu];

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Npu => "NPU",
            BackendKind::Gpu => "GPU",
            BackendKind::Cpu => "CPU",
        }
    }

    /// Returns the ordered chain of backends to attempt, starting at
    /// `preferred` (or the full NPU → GPU → CPU order when none is given).
    ///
    /// A GPU preference still falls back through CPU; a CPU preference has
    /// nothing to fall back to.
    pub fn fallback_chain(preferred: Option<BackendKind>) -> &'static [BackendKind] {
        match preferred {
            None | Some(BackendKind::Npu) => &FALLBACK_ORDER[..],
            Some(BackendKind::Gpu) => &FALLBACK_ORDER[1..],
            Some(BackendKind::Cpu) => &FALLBACK_ORDER[2..],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NPU" => Ok(BackendKind::Npu),
            "GPU" => Ok(BackendKind::Gpu),
            "CPU" => Ok(BackendKind::Cpu),
            other => Err(format!(
                "Unknown backend '{}'. Valid backends: NPU, GPU, CPU",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_without_preference_is_full_order() {
        assert_eq!(BackendKind::fallback_chain(None), &FALLBACK_ORDER[..]);
    }

    #[test]
    fn test_chain_is_suffix_of_fallback_order() {
        for (i, &kind) in FALLBACK_ORDER.iter().enumerate() {
            let chain = BackendKind::fallback_chain(Some(kind));
            assert_eq!(chain, &FALLBACK_ORDER[i..]);
            assert_eq!(chain[0], kind);
        }
    }

    #[test]
    fn test_cpu_preference_has_no_fallback() {
        assert_eq!(
            BackendKind::fallback_chain(Some(BackendKind::Cpu)),
            &[BackendKind::Cpu]
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for kind in FALLBACK_ORDER {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!("gpu".parse::<BackendKind>().unwrap(), BackendKind::Gpu);
        assert!("TPU".parse::<BackendKind>().is_err());
    }
}
