use std::collections::BTreeMap;

use helm_canon::Value;
use serde::Serialize;

use crate::error::MerkleError;
use crate::error::Result;
use crate::tree::Hash;
use crate::tree::InclusionProof;
use crate::tree::MerkleTree;
use crate::tree::Side;
use crate::tree::leaf_hash;
use crate::tree::node_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Disclose,
    Seal,
    Redact,
}

#[derive(Debug, Clone)]
pub struct ViewRule {
    /// `"*"`, `"<prefix>/*"`, or a literal path.
    pub path_pattern: String,
    pub action: Action,
    pub reason: Option<String>,
}

impl ViewRule {
    fn matches(&self, path: &str) -> bool {
        if self.path_pattern == "*" {
            return true;
        }
        if let Some(prefix) = self.path_pattern.strip_suffix("/*") {
            return path == prefix || path.starts_with(&format!("{prefix}/"));
        }
        self.path_pattern == path
    }
}

const NO_MATCHING_RULE_REASON: &str = "no matching policy rule";

#[derive(Debug, Clone, Serialize)]
pub struct SealedLeaf {
    pub path: String,
    pub commitment: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireInclusionProof {
    pub path: String,
    pub leaf_hash: String,
    pub steps: Vec<(String, String)>,
}

impl From<&InclusionProof> for WireInclusionProof {
    fn from(p: &InclusionProof) -> Self {
        WireInclusionProof {
            path: p.path.clone(),
            leaf_hash: hex::encode(p.leaf_hash),
            steps: p
                .steps
                .iter()
                .map(|(h, side)| {
                    (
                        hex::encode(h),
                        match side {
                            Side::Left => "L".to_string(),
                            Side::Right => "R".to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// A deterministically-derived, selectively-disclosed projection of an
/// evidence pack.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceView {
    pub disclosed: BTreeMap<String, serde_json::Value>,
    pub sealed: Vec<SealedLeaf>,
    pub proofs: Vec<WireInclusionProof>,
    pub pack_root: String,
    pub policy_id: String,
    pub view_hash: String,
}

/// Derive a view: `(pack, tree, policy, ts) -> identical view`. `ts` does
/// not appear as a parameter here because rule matching is a pure
/// function of path and policy — any time-dependence belongs to the
/// caller's policy evaluation, not to view derivation itself.
pub fn derive_view(tree: &MerkleTree, rules: &[ViewRule], policy_id: &str) -> Result<EvidenceView> {
    let mut paths: Vec<&str> = tree.paths().collect();
    if paths.is_empty() {
        return Err(MerkleError::EmptyDocument);
    }
    paths.sort_unstable();

    let mut disclosed = BTreeMap::new();
    let mut sealed = Vec::new();
    let mut proofs = Vec::new();

    for path in paths {
        let rule = rules.iter().find(|r| r.matches(path));
        let value = tree
            .leaf_value(path)
            .ok_or_else(|| MerkleError::UnknownPath(path.to_string()))?;
        let leaf_hash = tree
            .leaf_hash(path)
            .ok_or_else(|| MerkleError::UnknownPath(path.to_string()))?;

        match rule.map(|r| r.action) {
            Some(Action::Disclose) => {
                disclosed.insert(path.to_string(), value.to_json());
                if let Some(proof) = tree.proof(path) {
                    proofs.push(WireInclusionProof::from(&proof));
                }
            }
            Some(Action::Redact) => {}
            Some(Action::Seal) => {
                let reason = rule
                    .and_then(|r| r.reason.clone())
                    .unwrap_or_else(|| NO_MATCHING_RULE_REASON.to_string());
                sealed.push(SealedLeaf {
                    path: path.to_string(),
                    commitment: hex::encode(leaf_hash),
                    reason,
                });
            }
            None => sealed.push(SealedLeaf {
                path: path.to_string(),
                commitment: hex::encode(leaf_hash),
                reason: NO_MATCHING_RULE_REASON.to_string(),
            }),
        }
    }

    sealed.sort_by(|a, b| a.path.cmp(&b.path));
    proofs.sort_by(|a, b| a.path.cmp(&b.path));

    let pack_root = tree.root_addr();
    let view_hash = hash_view(&disclosed, &sealed, &proofs, &pack_root, policy_id);

    Ok(EvidenceView {
        disclosed,
        sealed,
        proofs,
        pack_root,
        policy_id: policy_id.to_string(),
        view_hash,
    })
}

/// Controls how strictly [`verify_view`] treats a disclosed leaf that
/// carries no inclusion proof — a view that fails to attach one for
/// every disclosed path is malformed, but a caller reconstructing an
/// older wire format may want to tolerate it instead of rejecting the
/// whole view.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    pub require_proof_for_every_disclosure: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            require_proof_for_every_disclosure: true,
        }
    }
}

/// Re-derives each disclosed leaf's hash from its JSON value and checks
/// it against the view's inclusion proofs and `pack_root`. A third party
/// holding only an [`EvidenceView`] (never the full [`MerkleTree`]) can
/// confirm the disclosed values really are part of the sealed pack this
/// way.
pub fn verify_view(view: &EvidenceView, opts: VerifyOptions) -> Result<()> {
    let root = decode_hash(&view.pack_root)?;

    for (path, json_value) in &view.disclosed {
        let proof = view.proofs.iter().find(|p| &p.path == path);
        let proof = match proof {
            Some(p) => p,
            None if opts.require_proof_for_every_disclosure => {
                return Err(MerkleError::InclusionMismatch(path.clone()));
            }
            None => continue,
        };

        let value = helm_canon::transform(json_value, None)
            .map_err(|_| MerkleError::InclusionMismatch(path.clone()))?;
        let expected = leaf_hash(path, &value);
        if hex::encode(expected) != proof.leaf_hash {
            return Err(MerkleError::InclusionMismatch(path.clone()));
        }
        if wire_proof_root(proof)? != root {
            return Err(MerkleError::InclusionMismatch(path.clone()));
        }
    }
    Ok(())
}

fn decode_hash(addr: &str) -> Result<Hash> {
    let hex_part = addr
        .strip_prefix("sha256:")
        .ok_or_else(|| MerkleError::InvalidAddress(addr.to_string()))?;
    decode_hex(hex_part, addr)
}

fn decode_hex(hex_str: &str, original: &str) -> Result<Hash> {
    let bytes = hex::decode(hex_str).map_err(|_| MerkleError::InvalidAddress(original.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| MerkleError::InvalidAddress(original.to_string()))
}

fn wire_proof_root(proof: &WireInclusionProof) -> Result<Hash> {
    let mut cur = decode_hex(&proof.leaf_hash, &proof.leaf_hash)?;
    for (sibling_hex, side) in &proof.steps {
        let sibling = decode_hex(sibling_hex, sibling_hex)?;
        cur = match side.as_str() {
            "L" => node_hash(&sibling, &cur),
            _ => node_hash(&cur, &sibling),
        };
    }
    Ok(cur)
}

fn hash_view(
    disclosed: &BTreeMap<String, serde_json::Value>,
    sealed: &[SealedLeaf],
    proofs: &[WireInclusionProof],
    pack_root: &str,
    policy_id: &str,
) -> String {
    let mut root = BTreeMap::new();
    root.insert(
        "disclosed".to_string(),
        helm_canon::transform(
            &serde_json::to_value(disclosed).unwrap_or(serde_json::Value::Null),
            None,
        )
        .unwrap_or(Value::Null),
    );
    root.insert(
        "sealed".to_string(),
        helm_canon::transform(
            &serde_json::to_value(sealed).unwrap_or(serde_json::Value::Null),
            None,
        )
        .unwrap_or(Value::Null),
    );
    root.insert(
        "proofs".to_string(),
        helm_canon::transform(
            &serde_json::to_value(proofs).unwrap_or(serde_json::Value::Null),
            None,
        )
        .unwrap_or(Value::Null),
    );
    root.insert("pack_root".to_string(), Value::String(pack_root.to_string()));
    root.insert("policy_id".to_string(), Value::String(policy_id.to_string()));
    helm_canon::hash(&Value::Object(root))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Value {
        helm_canon::transform(&json, None).expect("valid document")
    }

    #[test]
    fn disclose_seal_redact_partitions_paths() {
        let v = doc(json!({"public": "ok", "secret": "shh", "dropped": "gone"}));
        let tree = MerkleTree::build(&v);
        let rules = vec![
            ViewRule {
                path_pattern: "/public".to_string(),
                action: Action::Disclose,
                reason: None,
            },
            ViewRule {
                path_pattern: "/secret".to_string(),
                action: Action::Seal,
                reason: Some("pii".to_string()),
            },
            ViewRule {
                path_pattern: "/dropped".to_string(),
                action: Action::Redact,
                reason: None,
            },
        ];
        let view = derive_view(&tree, &rules, "policy-1").expect("view");
        assert_eq!(view.disclosed.len(), 1);
        assert_eq!(view.sealed.len(), 1);
        assert_eq!(view.sealed[0].reason, "pii");
        assert!(!view.disclosed.contains_key("/dropped"));
        assert!(!view.sealed.iter().any(|s| s.path == "/dropped"));
        assert_eq!(view.proofs.len(), 1);
    }

    #[test]
    fn unmatched_path_defaults_to_sealed() {
        let v = doc(json!({"x": "y"}));
        let tree = MerkleTree::build(&v);
        let view = derive_view(&tree, &[], "policy-empty").expect("view");
        assert_eq!(view.sealed.len(), 1);
        assert_eq!(view.sealed[0].reason, "no matching policy rule");
    }

    #[test]
    fn view_derivation_is_deterministic() {
        let v = doc(json!({"a": "1", "b": "2"}));
        let tree = MerkleTree::build(&v);
        let rules = vec![ViewRule {
            path_pattern: "*".to_string(),
            action: Action::Disclose,
            reason: None,
        }];
        let a = derive_view(&tree, &rules, "p").expect("view");
        let b = derive_view(&tree, &rules, "p").expect("view");
        assert_eq!(a.view_hash, b.view_hash);
    }

    #[test]
    fn verify_view_accepts_an_untampered_view() {
        let v = doc(json!({"public": "ok", "secret": "shh"}));
        let tree = MerkleTree::build(&v);
        let rules = vec![
            ViewRule {
                path_pattern: "/public".to_string(),
                action: Action::Disclose,
                reason: None,
            },
            ViewRule {
                path_pattern: "/secret".to_string(),
                action: Action::Seal,
                reason: Some("pii".to_string()),
            },
        ];
        let view = derive_view(&tree, &rules, "policy-1").expect("view");
        verify_view(&view, VerifyOptions::default()).expect("view verifies");
    }

    #[test]
    fn verify_view_rejects_a_tampered_disclosed_value() {
        let v = doc(json!({"public": "ok", "secret": "shh"}));
        let tree = MerkleTree::build(&v);
        let rules = vec![ViewRule {
            path_pattern: "*".to_string(),
            action: Action::Disclose,
            reason: None,
        }];
        let mut view = derive_view(&tree, &rules, "policy-1").expect("view");
        view.disclosed
            .insert("/public".to_string(), serde_json::Value::String("tampered".to_string()));
        let err = verify_view(&view, VerifyOptions::default()).unwrap_err();
        assert!(matches!(err, MerkleError::InclusionMismatch(_)));
    }

    #[test]
    fn verify_view_rejects_disclosure_missing_a_proof_by_default() {
        let v = doc(json!({"public": "ok"}));
        let tree = MerkleTree::build(&v);
        let rules = vec![ViewRule {
            path_pattern: "*".to_string(),
            action: Action::Disclose,
            reason: None,
        }];
        let mut view = derive_view(&tree, &rules, "policy-1").expect("view");
        view.proofs.clear();
        assert!(verify_view(&view, VerifyOptions::default()).is_err());
        let lenient = VerifyOptions {
            require_proof_for_every_disclosure: false,
        };
        assert!(verify_view(&view, lenient).is_ok());
    }
}
