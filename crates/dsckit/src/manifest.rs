//! Manifest loading and saving.
//!
//! Field names are matched case-insensitively (`packages`, `packageIdentifier`,
//! `version`) and unknown fields are ignored. A manifest is either returned
//! fully validated or not at all.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Manifest, Package};

/// Load and validate a manifest file.
pub fn load(path: &Path) -> Result<Manifest> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let manifest = parse_str(&content)?;
    log::debug!(
        "Loaded {} package(s) from {}",
        manifest.len(),
        path.display()
    );
    Ok(manifest)
}

/// Parse and validate manifest JSON text.
pub fn parse_str(content: &str) -> Result<Manifest> {
    if content.trim().is_empty() {
        return Err(Error::invalid("document is empty"));
    }

    let root: Value = serde_json::from_str(content)
        .map_err(|e| Error::invalid(format!("malformed JSON: {e}")))?;

    let object = match &root {
        Value::Object(map) => map,
        Value::Null => return Err(Error::invalid("document has no value")),
        _ => return Err(Error::invalid("top-level value must be an object")),
    };

    let entries = match field(object, "packages") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Err(Error::invalid("missing field: packages")),
        Some(_) => return Err(Error::invalid("packages must be an array")),
    };

    let packages = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_package(index, entry))
        .collect::<Result<Vec<_>>>()?;

    let manifest = Manifest::new(packages);
    manifest.validate()?;
    Ok(manifest)
}

/// Serialize a manifest to pretty JSON, re-validating first.
pub fn to_json(manifest: &Manifest) -> Result<String> {
    manifest.validate()?;
    Ok(serde_json::to_string_pretty(manifest)?)
}

/// Write a manifest to a file, re-validating first.
pub fn save(manifest: &Manifest, path: &Path) -> Result<()> {
    let content = to_json(manifest)?;
    fs::write(path, content)?;
    Ok(())
}

fn parse_package(index: usize, entry: &Value) -> Result<Package> {
    let Value::Object(object) = entry else {
        return Err(Error::invalid(format!("packages[{index}] must be an object")));
    };

    let package_identifier = string_field(object, "packageIdentifier", index)?;
    let version = string_field(object, "version", index)?;

    Ok(Package {
        package_identifier,
        version,
    })
}

fn string_field(object: &Map<String, Value>, name: &str, index: usize) -> Result<String> {
    match field(object, name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(Error::invalid(format!(
            "packages[{index}]: {name} is empty"
        ))),
        Some(Value::Null) | None => Err(Error::invalid(format!(
            "packages[{index}]: missing field: {name}"
        ))),
        Some(_) => Err(Error::invalid(format!(
            "packages[{index}]: {name} must be a string"
        ))),
    }
}

/// Case-insensitive field lookup. An exact match wins over a folded one.
fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("packages.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_single_package() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            r#"{"packages":[{"packageIdentifier":"test.test","version":"1.0"}]}"#,
        );

        let manifest = load(&path).unwrap();
        assert_eq!(manifest.packages.len(), 1);
        assert_eq!(manifest.packages[0].package_identifier, "test.test");
        assert_eq!(manifest.packages[0].version, "1.0");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_load_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(load(dir.path()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_empty_packages_is_valid() {
        let manifest = parse_str(r#"{"packages": []}"#).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let err = parse_str(r#"{"packages":[{"packageIdentifier":"a"}]}"#).unwrap_err();
        match err {
            Error::InvalidManifest { message } => {
                assert!(message.contains("version"), "{message}");
                assert!(message.contains("packages[0]"), "{message}");
            }
            other => panic!("expected InvalidManifest, got {other:?}"),
        }
    }

    #[test]
    fn test_first_missing_field_is_cited() {
        let err = parse_str(
            r#"{"packages":[
                {"packageIdentifier":"a","version":"1"},
                {"version":"2"},
                {"packageIdentifier":"c"}
            ]}"#,
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("packages[1]"), "{text}");
        assert!(text.contains("packageIdentifier"), "{text}");
    }

    #[test]
    fn test_missing_or_null_packages_is_invalid() {
        for doc in [r"{}", r#"{"packages": null}"#, r#"{"other": []}"#] {
            let err = parse_str(doc).unwrap_err();
            assert!(
                matches!(err, Error::InvalidManifest { ref message } if message.contains("packages")),
                "{doc}: {err}"
            );
        }
    }

    #[test]
    fn test_no_value_documents_are_invalid() {
        for doc in ["", "   ", "null", "[1,2]", "{not json"] {
            assert!(
                matches!(parse_str(doc), Err(Error::InvalidManifest { .. })),
                "{doc:?}"
            );
        }
    }

    #[test]
    fn test_empty_string_fields_are_invalid() {
        assert!(parse_str(r#"{"packages":[{"packageIdentifier":"","version":"1"}]}"#).is_err());
        assert!(parse_str(r#"{"packages":[{"packageIdentifier":"a","version":""}]}"#).is_err());
    }

    #[test]
    fn test_non_string_field_is_invalid() {
        let err = parse_str(r#"{"packages":[{"packageIdentifier":"a","version":1}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_case_insensitive_fields_and_unknown_ignored() {
        let manifest = parse_str(
            r#"{
                "Packages": [
                    {"PACKAGEIDENTIFIER": "Git.Git", "Version": "2.44.0", "source": "winget"},
                    {"packageidentifier": "Microsoft.PowerToys", "VERSION": "0.80.0"}
                ],
                "comment": "ignored"
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.packages[0].package_identifier, "Git.Git");
        assert_eq!(manifest.packages[1].version, "0.80.0");
    }

    #[test]
    fn test_manifest_order_is_preserved() {
        let manifest = parse_str(
            r#"{"packages":[
                {"packageIdentifier":"z","version":"1"},
                {"packageIdentifier":"a","version":"1"},
                {"packageIdentifier":"m","version":"1"}
            ]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = manifest
            .packages
            .iter()
            .map(|p| p.package_identifier.as_str())
            .collect();
        assert_eq!(ids, ["z", "a", "m"]);
    }

    #[test]
    fn test_round_trip_keeps_values() {
        let original = parse_str(
            r#"{"PACKAGES":[
                {"packageIdentifier":"Git.Git","version":"2.44.0"},
                {"packageIdentifier":"Vendor.Tool (beta)","version":"1.0.0-rc.1+build"}
            ]}"#,
        )
        .unwrap();

        let json = to_json(&original).unwrap();
        assert!(json.contains("\"packageIdentifier\""));
        let reparsed = parse_str(&json).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_to_json_rejects_mutated_manifest() {
        let mut manifest = parse_str(
            r#"{"packages":[{"packageIdentifier":"a","version":"1"}]}"#,
        )
        .unwrap();
        manifest.packages[0].version = String::new();

        assert!(matches!(
            to_json(&manifest),
            Err(Error::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let manifest = Manifest::new(vec![Package::new("a.b", "3.1").unwrap()]);

        save(&manifest, &path).unwrap();
        assert_eq!(load(&path).unwrap(), manifest);
    }

    #[test]
    fn test_save_invalid_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let manifest = Manifest::new(vec![Package {
            package_identifier: "a".to_string(),
            version: String::new(),
        }]);

        assert!(save(&manifest, &path).is_err());
        assert!(!path.exists());
    }
}
