//! Include directive resolution.
//!
//! Two recognition paths feed the same resolver:
//!
//! - Text formats (toml): a line of the form `# @include "path"` is
//!   rewritten *before* structural parsing into a reserved marker
//!   assignment, so the parser treats it as an opaque string value.
//! - Tree formats (json, yaml, script output): reserved marker keys
//!   (`__include_file_path`, optionally `_N`-suffixed) are recognized by
//!   walking the already-parsed tree.
//!
//! Resolution is depth-first and top-down: content pulled in by one
//! directive is itself resolved before the walk continues. A depth counter
//! incremented on each descent into a container and on each cross-file hop
//! is bounded at [`MAX_INCLUDE_DEPTH`]; include cycles therefore terminate
//! with [`ConfigError::ExcessiveNesting`] instead of recursing forever.
//!
//! A directive whose target is missing or not a regular file is a soft
//! failure: the directive is left in place, with diagnostics controlled by
//! [`IncludeStrictness`].

use crate::error::{ConfigError, Result};
use crate::format;
use regex_lite::{Captures, Regex};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Maximum include nesting depth, counted per container descent and per
/// cross-file include hop.
pub const MAX_INCLUDE_DEPTH: usize = 100;

const MARKER_PREFIX: &str = "__include_file_path";

/// How an include directive with a missing or unreadable target is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncludeStrictness {
    /// Leave the directive in place silently.
    Lenient,
    /// Leave the directive in place and log a warning.
    #[default]
    Warn,
    /// Fail the whole load.
    Strict,
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // the directive name is case-insensitive and must start its line
    RE.get_or_init(|| {
        Regex::new(r#"(?im)^[ \t]*#[ \t]*@include[ \t]*"([^"]+)""#)
            .unwrap_or_else(|e| panic!("directive regex: {e}"))
    })
}

/// Whether a mapping key is a reserved include marker.
fn is_marker_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix(MARKER_PREFIX) else {
        return false;
    };
    match rest.strip_prefix('_') {
        None => rest.is_empty(),
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// Rewrite `# @include "path"` lines into reserved marker assignments before
/// structural parsing. Relative targets resolve against `base_dir`. A target
/// that is missing or not a regular file leaves the directive line untouched
/// (a comment, as far as the structural parser is concerned), subject to the
/// configured strictness.
pub fn rewrite_directives(
    file: &Path,
    base_dir: &Path,
    contents: &str,
    strictness: IncludeStrictness,
) -> Result<String> {
    let mut counter = 0usize;
    let mut unresolved: Option<PathBuf> = None;

    let rewritten = directive_regex()
        .replace_all(contents, |caps: &Captures<'_>| {
            let mut target = PathBuf::from(&caps[1]);
            if target.is_relative() {
                target = base_dir.join(target);
            }
            match std::fs::metadata(&target) {
                Ok(meta) if meta.is_file() => {
                    counter += 1;
                    // JSON string escaping is valid TOML basic-string escaping
                    let escaped = Value::String(target.to_string_lossy().into_owned());
                    format!("{MARKER_PREFIX}_{counter} = {escaped}")
                }
                _ => {
                    match strictness {
                        IncludeStrictness::Strict => {
                            unresolved.get_or_insert(target);
                        }
                        IncludeStrictness::Warn => {
                            warn!(
                                file = %file.display(),
                                target = %target.display(),
                                "include target not found, directive left unresolved"
                            );
                        }
                        IncludeStrictness::Lenient => {}
                    }
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    match unresolved {
        Some(target) => Err(ConfigError::UnresolvedInclude {
            path: file.to_path_buf(),
            target,
        }),
        None => Ok(rewritten),
    }
}

/// Resolve every include marker in `tree`, in place.
///
/// `file` names the tree's originating file for error messages; `base_dir`
/// anchors relative targets; `depth` is the nesting level already consumed
/// by the caller (0 for a top-level source).
pub fn resolve(
    tree: &mut Value,
    file: &Path,
    base_dir: &Path,
    strictness: IncludeStrictness,
    depth: usize,
) -> Result<()> {
    walk(tree, file, base_dir, strictness, depth)
}

fn walk(
    node: &mut Value,
    file: &Path,
    base_dir: &Path,
    strictness: IncludeStrictness,
    level: usize,
) -> Result<()> {
    if level > MAX_INCLUDE_DEPTH {
        return Err(ConfigError::ExcessiveNesting {
            path: file.to_path_buf(),
        });
    }

    match node {
        Value::Array(items) => {
            for item in items.iter_mut() {
                walk(item, file, base_dir, strictness, level + 1)?;
            }
            Ok(())
        }
        Value::Object(_) => resolve_mapping(node, file, base_dir, strictness, level),
        _ => Ok(()),
    }
}

fn resolve_mapping(
    node: &mut Value,
    file: &Path,
    base_dir: &Path,
    strictness: IncludeStrictness,
    level: usize,
) -> Result<()> {
    // Snapshot the keys: spliced-in content is already fully resolved and
    // must not be rescanned at this level.
    let keys: Vec<String> = match node.as_object() {
        Some(map) => map.keys().cloned().collect(),
        None => return Ok(()),
    };

    for key in keys {
        let target = match node.get(&key) {
            Some(Value::String(raw)) if is_marker_key(&key) => {
                let path = PathBuf::from(raw);
                if path.is_relative() {
                    Some(base_dir.join(path))
                } else {
                    Some(path)
                }
            }
            _ => None,
        };

        let Some(target) = target else {
            if let Some(child) = node.get_mut(&key)
                && (child.is_object() || child.is_array())
            {
                walk(child, file, base_dir, strictness, level + 1)?;
            }
            continue;
        };

        if !target.is_file() {
            match strictness {
                IncludeStrictness::Strict => {
                    return Err(ConfigError::UnresolvedInclude {
                        path: file.to_path_buf(),
                        target,
                    });
                }
                IncludeStrictness::Warn => {
                    warn!(
                        file = %file.display(),
                        target = %target.display(),
                        "include target not found, directive left unresolved"
                    );
                }
                IncludeStrictness::Lenient => {}
            }
            continue;
        }

        // Cross-file hop costs one nesting level; the included file resolves
        // its own directives against its own directory (top-down recursion).
        let parsed = format::parse_file(&target, strictness, level + 1)?;

        let replacement = {
            let Some(map) = node.as_object_mut() else {
                continue;
            };
            map.remove(&key);
            match parsed {
                Value::Object(spliced) => {
                    map.extend(spliced);
                    None
                }
                // A sequence replaces the container wholesale, but only when
                // the directive was the container's sole content.
                Value::Array(items) if map.is_empty() => Some(Value::Array(items)),
                _ => None,
            }
        };

        if let Some(sequence) = replacement {
            *node = sequence;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn resolve_at_root(tree: &mut Value, base_dir: &Path) -> Result<()> {
        resolve(
            tree,
            &base_dir.join("root.json"),
            base_dir,
            IncludeStrictness::Lenient,
            0,
        )
    }

    #[test]
    fn test_marker_key_recognition() {
        assert!(is_marker_key("__include_file_path"));
        assert!(is_marker_key("__include_file_path_1"));
        assert!(is_marker_key("__include_file_path_42"));
        assert!(!is_marker_key("__include_file_path_"));
        assert!(!is_marker_key("__include_file_path_x"));
        assert!(!is_marker_key("include_file_path"));
        assert!(!is_marker_key("server"));
    }

    fn rewrite_lenient(base_dir: &Path, contents: &str) -> String {
        rewrite_directives(
            &base_dir.join("root.toml"),
            base_dir,
            contents,
            IncludeStrictness::Lenient,
        )
        .unwrap()
    }

    #[test]
    fn test_rewrite_directive_with_existing_target() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("extra.toml"), "x = 1\n").unwrap();

        let rewritten = rewrite_lenient(temp.path(), "# @include \"extra.toml\"\nport = 25\n");
        assert!(rewritten.starts_with("__include_file_path_1 = \""));
        assert!(rewritten.contains("extra.toml"));
        assert!(rewritten.contains("port = 25"));
    }

    #[test]
    fn test_rewrite_directive_case_insensitive_and_indented() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("extra.toml"), "").unwrap();

        let rewritten = rewrite_lenient(temp.path(), "  #  @INCLUDE \"extra.toml\"");
        assert!(rewritten.contains(MARKER_PREFIX));
    }

    #[test]
    fn test_rewrite_leaves_missing_target_untouched() {
        let temp = TempDir::new().unwrap();
        let contents = "# @include \"nope.toml\"\nport = 25\n";
        assert_eq!(rewrite_lenient(temp.path(), contents), contents);
    }

    #[test]
    fn test_rewrite_leaves_directory_target_untouched() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        let contents = "# @include \"sub\"\n";
        assert_eq!(rewrite_lenient(temp.path(), contents), contents);
    }

    #[test]
    fn test_rewrite_missing_target_fatal_when_strict() {
        let temp = TempDir::new().unwrap();
        let err = rewrite_directives(
            &temp.path().join("root.toml"),
            temp.path(),
            "# @include \"nope.toml\"\n",
            IncludeStrictness::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedInclude { .. }));
    }

    #[test]
    fn test_resolution_is_idempotent_without_markers() {
        let temp = TempDir::new().unwrap();
        let mut tree = json!({"server": {"port": 25, "hosts": ["a", "b"]}});
        let expected = tree.clone();
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(tree, expected);
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_mapping_target_splices_into_surrounding_mapping() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("tls.json"),
            r#"{"cert": "/etc/cert.pem", "key": "/etc/key.pem"}"#,
        )
        .unwrap();

        let mut tree = json!({
            "server": {"port": 25, "__include_file_path_1": "tls.json"}
        });
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(
            tree,
            json!({
                "server": {"port": 25, "cert": "/etc/cert.pem", "key": "/etc/key.pem"}
            })
        );
    }

    #[test]
    fn test_sequence_target_replaces_sole_content_container() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("hosts.json"), r#"["a", "b"]"#).unwrap();

        let mut tree = json!({
            "relay": {"hosts": {"__include_file_path": "hosts.json"}}
        });
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(tree, json!({"relay": {"hosts": ["a", "b"]}}));
    }

    #[test]
    fn test_sequence_target_dropped_when_container_has_siblings() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("hosts.json"), r#"["a", "b"]"#).unwrap();

        let mut tree = json!({
            "relay": {"__include_file_path": "hosts.json", "port": 25}
        });
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(tree, json!({"relay": {"port": 25}}));
    }

    #[test]
    fn test_nested_includes_resolve_top_down() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("outer.json"),
            r#"{"__include_file_path": "inner.json", "from_outer": 1}"#,
        )
        .unwrap();
        std::fs::write(temp.path().join("inner.json"), r#"{"from_inner": 2}"#).unwrap();

        let mut tree = json!({"__include_file_path": "outer.json"});
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(tree, json!({"from_outer": 1, "from_inner": 2}));
    }

    #[test]
    fn test_missing_target_left_in_place_leniently() {
        let temp = TempDir::new().unwrap();
        let mut tree = json!({"__include_file_path": "nope.json", "port": 25});
        let expected = tree.clone();
        resolve_at_root(&mut tree, temp.path()).unwrap();
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_missing_target_fatal_when_strict() {
        let temp = TempDir::new().unwrap();
        let mut tree = json!({"__include_file_path": "nope.json"});
        let err = resolve(
            &mut tree,
            &temp.path().join("root.json"),
            temp.path(),
            IncludeStrictness::Strict,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedInclude { .. }));
    }

    #[test]
    fn test_include_cycle_hits_depth_bound() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("a.json"),
            r#"{"__include_file_path": "b.json"}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join("b.json"),
            r#"{"__include_file_path": "a.json"}"#,
        )
        .unwrap();

        let mut tree = json!({"__include_file_path": "a.json"});
        let err = resolve_at_root(&mut tree, temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ExcessiveNesting { .. }));
    }

    #[test]
    fn test_structural_depth_exceeding_bound_is_fatal() {
        let temp = TempDir::new().unwrap();
        // the walk enters a container per wrap, so the innermost mapping
        // sits one level past the bound
        let mut tree = json!(1);
        for _ in 0..MAX_INCLUDE_DEPTH + 2 {
            tree = json!({ "inner": tree });
        }
        let err = resolve_at_root(&mut tree, temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ExcessiveNesting { .. }));
    }
}
