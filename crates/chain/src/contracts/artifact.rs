//! On-disk ABI artifact handling.
//!
//! Deployments ship `ASLExperienceToken.json` / `AchievementToken.json`
//! artifacts shaped either `{ "abi": [...] }` or as a bare ABI array. The
//! compiled-in `sol!` interfaces are the normative surface; artifacts are
//! loaded only to verify that the deployed contract still exposes every
//! method this service calls. A missing or unreadable artifact falls back
//! to the compiled-in surface with a warning, never a startup failure.

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

/// Artifact file for the experience token.
pub const XP_ARTIFACT_FILE: &str = "ASLExperienceToken.json";
/// Artifact file for the achievement token.
pub const ACHIEVEMENT_ARTIFACT_FILE: &str = "AchievementToken.json";

/// Methods the experience token must expose.
pub const XP_REQUIRED_FUNCTIONS: &[&str] = &[
    "awardXP",
    "awardCustomXP",
    "updateRewardRate",
    "balanceOf",
    "hasRole",
    "grantRole",
];

/// Methods the achievement token must expose.
pub const ACHIEVEMENT_REQUIRED_FUNCTIONS: &[&str] = &[
    "mintAchievement",
    "updateMetadata",
    "getUserAchievements",
    "getAchievement",
    "hasRole",
    "grantRole",
];

/// Result of loading and validating one ABI artifact.
#[derive(Debug, Clone)]
pub struct AbiArtifact {
    /// Artifact file name this was loaded from.
    pub file_name: String,
    /// Function names found in the artifact.
    pub functions: Vec<String>,
    /// Required functions the artifact does not declare.
    pub missing: Vec<String>,
    /// True when the file was absent or unparseable and the compiled-in
    /// interface is in effect.
    pub using_fallback: bool,
}

impl AbiArtifact {
    /// Load `file_name` from `dir` and validate it against `required`.
    pub fn load(dir: &Path, file_name: &str, required: &[&str]) -> Self {
        let path = dir.join(file_name);

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "ABI artifact not readable, using compiled-in interface"
                );
                return Self::fallback(file_name);
            }
        };

        let entries = match parse_abi_entries(&raw) {
            Some(entries) => entries,
            None => {
                warn!(
                    path = %path.display(),
                    "ABI artifact is neither an ABI array nor an {{abi: [...]}} object, using compiled-in interface"
                );
                return Self::fallback(file_name);
            }
        };

        let functions: Vec<String> = entries
            .iter()
            .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("function"))
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let missing: Vec<String> = required
            .iter()
            .filter(|name| !functions.iter().any(|f| f == *name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            info!(path = %path.display(), functions = functions.len(), "ABI artifact validated");
        } else {
            warn!(
                path = %path.display(),
                missing = ?missing,
                "ABI artifact is missing expected functions; the deployed contract may not be compatible"
            );
        }

        Self {
            file_name: file_name.to_string(),
            functions,
            missing,
            using_fallback: false,
        }
    }

    fn fallback(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            functions: Vec::new(),
            missing: Vec::new(),
            using_fallback: true,
        }
    }
}

/// Accept `{ "abi": [...] }` artifacts and bare `[...]` ABI arrays.
fn parse_abi_entries(raw: &str) -> Option<Vec<Value>> {
    let parsed: Value = serde_json::from_str(raw).ok()?;
    match parsed {
        Value::Array(entries) => Some(entries),
        Value::Object(mut object) => match object.remove("abi") {
            Some(Value::Array(entries)) => Some(entries),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rewarder-abi-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn abi_array(names: &[&str]) -> String {
        let entries: Vec<Value> = names
            .iter()
            .map(|name| serde_json::json!({ "type": "function", "name": name, "inputs": [] }))
            .collect();
        serde_json::to_string(&entries).unwrap()
    }

    #[test]
    fn test_bare_array_shape() {
        let dir = temp_dir("bare");
        let names = ["awardXP", "awardCustomXP", "updateRewardRate", "balanceOf", "hasRole", "grantRole"];
        std::fs::write(dir.join(XP_ARTIFACT_FILE), abi_array(&names)).unwrap();

        let artifact = AbiArtifact::load(&dir, XP_ARTIFACT_FILE, XP_REQUIRED_FUNCTIONS);
        assert!(!artifact.using_fallback);
        assert!(artifact.missing.is_empty());
        assert_eq!(artifact.functions.len(), 6);
    }

    #[test]
    fn test_wrapped_object_shape() {
        let dir = temp_dir("wrapped");
        let wrapped = format!("{{\"contractName\":\"X\",\"abi\":{}}}", abi_array(&["hasRole"]));
        std::fs::write(dir.join(ACHIEVEMENT_ARTIFACT_FILE), wrapped).unwrap();

        let artifact =
            AbiArtifact::load(&dir, ACHIEVEMENT_ARTIFACT_FILE, ACHIEVEMENT_REQUIRED_FUNCTIONS);
        assert!(!artifact.using_fallback);
        assert!(artifact.missing.contains(&"mintAchievement".to_string()));
        assert!(!artifact.missing.contains(&"hasRole".to_string()));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = temp_dir("absent");
        let artifact = AbiArtifact::load(&dir, "DoesNotExist.json", XP_REQUIRED_FUNCTIONS);
        assert!(artifact.using_fallback);
        assert!(artifact.missing.is_empty());
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let dir = temp_dir("garbage");
        std::fs::write(dir.join(XP_ARTIFACT_FILE), "not json at all").unwrap();

        let artifact = AbiArtifact::load(&dir, XP_ARTIFACT_FILE, XP_REQUIRED_FUNCTIONS);
        assert!(artifact.using_fallback);
    }

    #[test]
    fn test_non_function_entries_ignored() {
        let dir = temp_dir("events");
        let entries = serde_json::json!([
            { "type": "event", "name": "XPAwarded", "inputs": [] },
            { "type": "function", "name": "awardXP", "inputs": [] },
        ]);
        std::fs::write(dir.join(XP_ARTIFACT_FILE), entries.to_string()).unwrap();

        let artifact = AbiArtifact::load(&dir, XP_ARTIFACT_FILE, &["awardXP"]);
        assert_eq!(artifact.functions, vec!["awardXP"]);
        assert!(artifact.missing.is_empty());
    }
}
