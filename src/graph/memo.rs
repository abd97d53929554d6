//! Memoization keys for build-description invocations.
//!
//! A key identifies one invocation: the callee's identity plus a stable
//! serialization of its typed parameter struct. `serde_json` maps are
//! ordered, so structurally identical parameters always serialize to
//! the same string regardless of how they were assembled.

use serde::Serialize;

use crate::graph::error::GraphError;
use crate::util::hash::sha256_str;

/// The identity of the build description being invoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callee {
    /// An in-tree description function: address plus parameter type name.
    Function { addr: usize, params: &'static str },
    /// An external description entry: resolved path plus entry name.
    /// Including the path means two vendor locations are never conflated.
    External { path: String, entry: String },
}

/// A fully resolved memo key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub callee: Callee,
    /// SHA256 digest of the canonical parameter serialization.
    pub params_digest: String,
}

impl MemoKey {
    /// Key for an in-tree description function.
    pub fn function<P: Serialize>(addr: usize, params: &P) -> Result<MemoKey, GraphError> {
        Ok(MemoKey {
            callee: Callee::Function {
                addr,
                params: std::any::type_name::<P>(),
            },
            params_digest: digest(params)?,
        })
    }

    /// Key for an external description entry.
    pub fn external<P: Serialize>(
        path: &str,
        entry: &str,
        params: &P,
    ) -> Result<MemoKey, GraphError> {
        Ok(MemoKey {
            callee: Callee::External {
                path: path.to_string(),
                entry: entry.to_string(),
            },
            params_digest: digest(params)?,
        })
    }
}

fn digest<P: Serialize>(params: &P) -> Result<String, GraphError> {
    let canonical = serde_json::to_string(params)?;
    Ok(sha256_str(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::path::PathBuf;

    #[derive(Serialize)]
    struct Params {
        out_dir: PathBuf,
        defines: Vec<String>,
    }

    fn params(out_dir: &str) -> Params {
        Params {
            out_dir: PathBuf::from(out_dir),
            defines: vec!["A".to_string()],
        }
    }

    #[test]
    fn test_identical_params_identical_keys() {
        let a = MemoKey::function(0x1000, &params("out")).unwrap();
        let b = MemoKey::function(0x1000, &params("out")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_params_different_keys() {
        let a = MemoKey::function(0x1000, &params("out")).unwrap();
        let b = MemoKey::function(0x1000, &params("elsewhere")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_callees_different_keys() {
        let a = MemoKey::function(0x1000, &params("out")).unwrap();
        let b = MemoKey::function(0x2000, &params("out")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_external_keys_include_path() {
        let a = MemoKey::external("vendor/zlib", "build", &params("out")).unwrap();
        let b = MemoKey::external("other/zlib", "build", &params("out")).unwrap();
        assert_ne!(a, b);
    }
}
