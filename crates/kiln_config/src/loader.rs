//! Loading and validation of `kiln.toml` and `rules.toml`.

use std::collections::BTreeMap;
use std::path::Path;

use kiln_common::{Identifier, Pattern, PatternKind};
use kiln_model::config::{
    INDEX_FILENAMES, OUTPUT_DIR, PERSIST_PROGRESS_ON_FAILURE, STRING_PATTERN_TYPE,
    TEXT_EXTENSIONS,
};
use kiln_model::{Configuration, Value};

use crate::error::ConfigError;
use crate::types::{RulesFile, StepSpec, WriteSpec};

/// Name of the site configuration file.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Name of the rules file.
pub const RULES_FILE: &str = "rules.toml";

/// Loads and validates `<site_dir>/kiln.toml`.
pub fn load_site_config(site_dir: &Path) -> Result<Configuration, ConfigError> {
    let content = std::fs::read_to_string(site_dir.join(CONFIG_FILE))?;
    load_site_config_from_str(site_dir, &content)
}

/// Parses and validates a site configuration, filling in defaults.
pub fn load_site_config_from_str(
    site_dir: &Path,
    content: &str,
) -> Result<Configuration, ConfigError> {
    let entries: BTreeMap<String, Value> =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    let config = Configuration::new(site_dir, entries).with_defaults();
    validate_site_config(&config)?;
    Ok(config)
}

fn validate_site_config(config: &Configuration) -> Result<(), ConfigError> {
    let expect = |key: &str, ok: bool, what: &str| {
        if ok {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(format!("{key} must be {what}")))
        }
    };
    let is_string_list = |v: Option<&Value>| {
        v.and_then(Value::as_array)
            .is_some_and(|items| items.iter().all(|i| i.as_str().is_some()))
    };

    expect(
        OUTPUT_DIR,
        config.get(OUTPUT_DIR).and_then(Value::as_str).is_some(),
        "a string",
    )?;
    expect(
        INDEX_FILENAMES,
        is_string_list(config.get(INDEX_FILENAMES)),
        "a list of strings",
    )?;
    expect(
        TEXT_EXTENSIONS,
        is_string_list(config.get(TEXT_EXTENSIONS)),
        "a list of strings",
    )?;
    expect(
        PERSIST_PROGRESS_ON_FAILURE,
        config
            .get(PERSIST_PROGRESS_ON_FAILURE)
            .and_then(Value::as_bool)
            .is_some(),
        "a boolean",
    )?;
    config
        .pattern_kind()
        .map_err(|e| ConfigError::ValidationError(format!("{STRING_PATTERN_TYPE}: {e}")))?;
    Ok(())
}

/// Loads and validates `<site_dir>/rules.toml`.
pub fn load_rules(site_dir: &Path, kind: PatternKind) -> Result<RulesFile, ConfigError> {
    let content = std::fs::read_to_string(site_dir.join(RULES_FILE))?;
    load_rules_from_str(&content, kind)
}

/// Parses and validates a rules file. Patterns are checked against the
/// site's pattern flavour.
pub fn load_rules_from_str(content: &str, kind: PatternKind) -> Result<RulesFile, ConfigError> {
    let rules: RulesFile =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_rules(&rules, kind)?;
    Ok(rules)
}

fn validate_rules(rules: &RulesFile, kind: PatternKind) -> Result<(), ConfigError> {
    let check_pattern = |source: &str| {
        Pattern::with_kind(source, kind)
            .map(|_| ())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    };

    for (i, rule) in rules.compile.iter().enumerate() {
        check_pattern(&rule.pattern)?;
        if rule.rep.is_empty() {
            return Err(ConfigError::MissingField(format!("compile[{i}].rep")));
        }
        for step in &rule.steps {
            match step {
                StepSpec::Filter { filter, .. } if filter.is_empty() => {
                    return Err(ConfigError::MissingField(format!("compile[{i}].steps.filter")));
                }
                StepSpec::Layout { layout, .. } => {
                    Identifier::new(layout.as_str()).map_err(|e| {
                        ConfigError::ValidationError(format!("compile[{i}] layout: {e}"))
                    })?;
                }
                StepSpec::Snapshot { snapshot, .. } if snapshot.is_empty() => {
                    return Err(ConfigError::MissingField(format!(
                        "compile[{i}].steps.snapshot"
                    )));
                }
                _ => {}
            }
        }
        if let Some(WriteSpec::Ext { ext }) = &rule.write {
            if ext.is_empty() || ext.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "compile[{i}].write.ext must be a bare extension"
                )));
            }
        }
    }
    for (i, rule) in rules.layout.iter().enumerate() {
        check_pattern(&rule.pattern)?;
        if rule.filter.is_empty() {
            return Err(ConfigError::MissingField(format!("layout[{i}].filter")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_config_gets_defaults() {
        let config = load_site_config_from_str(Path::new("/site"), "").unwrap();
        assert_eq!(config.output_dir(), PathBuf::from("/site/output"));
        assert_eq!(config.pattern_kind().unwrap(), PatternKind::Glob);
    }

    #[test]
    fn custom_entries_kept() {
        let config = load_site_config_from_str(
            Path::new("/site"),
            r#"
output_dir = "public"
title = "My Site"
persist_progress_on_failure = true

[author]
name = "Ann"
"#,
        )
        .unwrap();
        assert_eq!(config.output_dir(), PathBuf::from("/site/public"));
        assert_eq!(config.get("title"), Some(&Value::from("My Site")));
        assert!(config.persist_progress_on_failure());
        assert!(config.get("author").and_then(Value::as_table).is_some());
    }

    #[test]
    fn wrong_types_rejected() {
        let err = load_site_config_from_str(Path::new("/site"), "output_dir = 3").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err =
            load_site_config_from_str(Path::new("/site"), "string_pattern_type = \"regex\"")
                .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_site_config_from_str(Path::new("/site"), "not valid {{{").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_config_file() {
        let err = load_site_config(Path::new("/nonexistent/site")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn rules_loaded_and_validated() {
        let rules = load_rules_from_str(
            r#"
[[compile]]
pattern = "/**/*.md"
steps = [{ filter = "template" }, { layout = "/default.html" }]
write = { ext = "html" }

[[layout]]
pattern = "/**/*"
filter = "template"
"#,
            PatternKind::Glob,
        )
        .unwrap();
        assert_eq!(rules.compile.len(), 1);
        assert_eq!(rules.layout.len(), 1);
    }

    #[test]
    fn bad_layout_identifier_rejected() {
        let err = load_rules_from_str(
            "[[compile]]\npattern = \"/*\"\nsteps = [{ layout = \"default.html\" }]\n",
            PatternKind::Glob,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn bad_pattern_rejected() {
        let err = load_rules_from_str("[[compile]]\npattern = \"/[\"\n", PatternKind::Glob)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_rep_rejected() {
        let err = load_rules_from_str("[[compile]]\npattern = \"/*\"\nrep = \"\"\n", PatternKind::Glob)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }
}
