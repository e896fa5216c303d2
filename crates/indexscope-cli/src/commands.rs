//! Subcommand handlers.
//!
//! Each handler returns a [`Reply`]: a serializable envelope for `--json` and
//! plain text for the terminal.

use crate::cli::{Command, ConfigCommand, ExtensionsCommand, RuleArgs, RuleKind, RulesCommand};
use crate::console::describe_attempt;
use anyhow::Result;
use indexscope_core::store::validate_file;
use indexscope_core::{
    FileExtensionSetting, FileTypeFilter, FilterType, IndexRule, IndexScope, OperationResult,
    RegistrationOptions, RuleType,
};
use serde::Serialize;
use serde_json::Value;

/// Output of one command.
pub struct Reply {
    pub result: OperationResult<Value>,
    pub text: String,
}

impl Reply {
    fn ok<T: Serialize>(value: &T, message: impl Into<String>, text: String) -> Result<Self> {
        Ok(Self {
            result: OperationResult::success(serde_json::to_value(value)?, message),
            text,
        })
    }

    /// A completed command whose outcome still counts as a failure.
    fn unsuccessful<T: Serialize>(value: &T, message: impl Into<String>, text: String) -> Result<Self> {
        let mut reply = Self::ok(value, message, text)?;
        reply.result.success = false;
        reply.result.exit_code = 1;
        Ok(reply)
    }

    pub fn exit_code(&self) -> i32 {
        self.result.exit_code
    }
}

/// `config validate` needs nothing from the indexing backend.
pub fn validate_document(path: &std::path::Path) -> Result<Reply> {
    let validation = validate_file(path)?;
    let text = if validation.is_valid {
        format!(
            "{} is valid ({} rules, {} extension settings)",
            path.display(),
            validation.rule_count,
            validation.extension_count
        )
    } else {
        let mut text = format!("{} is invalid:", path.display());
        for violation in &validation.violations {
            text.push_str("\n  - ");
            text.push_str(violation);
        }
        text
    };
    if validation.is_valid {
        Reply::ok(&validation, "valid", text)
    } else {
        Reply::unsuccessful(&validation, validation.message.clone(), text)
    }
}

/// Run a command against a built scope.
pub async fn dispatch(scope: &IndexScope, command: &Command, argv: &[String]) -> Result<Reply> {
    match command {
        Command::Status => status(scope),
        Command::Register => register(scope, argv).await,
        Command::Rules(command) => rules(scope, command),
        Command::Extensions(command) => extensions(scope, command),
        Command::Config(command) => config(scope, command),
    }
}

fn status(scope: &IndexScope) -> Result<Reply> {
    let status = scope.registration().detector().get_status();
    let mut text = format!(
        "Search manager usable: {}\nValidation: {:?}\nBinary: {}",
        if status.is_usable { "yes" } else { "no" },
        status.validation_state,
        status.binary_path.as_deref().unwrap_or("(not registered)"),
    );
    if let Some(message) = &status.error_message {
        text.push_str(&format!("\nError: {}", message));
    }
    text.push_str(&format!(
        "\nElevated: {}",
        if scope.registration().is_elevated() { "yes" } else { "no" }
    ));

    if status.is_usable {
        Reply::ok(&status, "usable", text)
    } else {
        Reply::unsuccessful(&status, "not usable", text)
    }
}

async fn register(scope: &IndexScope, argv: &[String]) -> Result<Reply> {
    let options = RegistrationOptions::from_args(argv)?;
    let attempt = scope.registration().register(&options).await?;
    let text = describe_attempt(&attempt);
    if attempt.is_success() {
        Reply::ok(&attempt, "registered", text)
    } else {
        Reply::unsuccessful(&attempt, format!("{:?}", attempt.outcome), text)
    }
}

fn rules(scope: &IndexScope, command: &RulesCommand) -> Result<Reply> {
    let manager = scope.rules();
    match command {
        RulesCommand::List { include_system } => {
            let rules = manager.list_rules(*include_system)?;
            let text = render_rules(&rules);
            Reply::ok(&rules, format!("{} rules", rules.len()), text)
        }
        RulesCommand::Add(args) => {
            let added = manager.add_rule(&rule_from_args(args))?;
            let text = format!("Added {} rule for {}", kind_label(added.rule_type), added.path);
            Reply::ok(&added, "added", text)
        }
        RulesCommand::Remove { path } => {
            manager.remove_rule(path)?;
            Reply::ok(&Value::Null, "removed", format!("Removed rule for {}", path))
        }
        RulesCommand::Modify(args) => {
            let modified = manager.modify_rule(&rule_from_args(args))?;
            let text = format!("Updated rule for {}", modified.path);
            Reply::ok(&modified, "modified", text)
        }
    }
}

fn extensions(scope: &IndexScope, command: &ExtensionsCommand) -> Result<Reply> {
    let manager = scope.rules();
    match command {
        ExtensionsCommand::List => {
            let settings = manager.list_extensions()?;
            Reply::ok(&settings, format!("{} extensions", settings.len()), render_extensions(&settings))
        }
        ExtensionsCommand::Search { pattern } => {
            let settings = manager.search_extensions(pattern)?;
            let text = if settings.is_empty() {
                format!("No extensions match {}", pattern)
            } else {
                render_extensions(&settings)
            };
            Reply::ok(&settings, format!("{} matches", settings.len()), text)
        }
        ExtensionsCommand::Get { extension } => {
            let setting = manager.get_extension(extension)?;
            let text = render_extensions(std::slice::from_ref(&setting));
            Reply::ok(&setting, "ok", text)
        }
        ExtensionsCommand::Set { extension, depth } => {
            let setting = manager.set_extension_depth(extension, *depth)?;
            let text = format!("{} is now {}", setting.extension, setting.indexing_depth);
            Reply::ok(&setting, "updated", text)
        }
    }
}

fn config(scope: &IndexScope, command: &ConfigCommand) -> Result<Reply> {
    match command {
        ConfigCommand::Export {
            path,
            include_defaults,
            no_extensions,
        } => {
            let document = scope.store().export(path, *include_defaults, !*no_extensions)?;
            let text = format!(
                "Exported {} rules and {} extension settings to {}",
                document.rules.len(),
                document.extension_settings.len(),
                path.display()
            );
            Reply::ok(&document, "exported", text)
        }
        ConfigCommand::Import {
            path,
            replace,
            fail_fast,
        } => {
            if *replace {
                eprintln!("Existing user rules will be removed before importing. This is not transactional.");
            }
            let result = scope.store().import(path, !*replace, !*fail_fast)?;
            let mut text = format!(
                "Rules: {} imported, {} failed, {} skipped\nExtensions: {} imported, {} failed, {} skipped",
                result.rules_imported,
                result.rules_failed,
                result.rules_skipped,
                result.extensions_imported,
                result.extensions_failed,
                result.extensions_skipped
            );
            for error in &result.errors {
                text.push_str("\n  - ");
                text.push_str(error);
            }
            if let Some(reason) = &result.aborted {
                text.push_str(&format!("\nImport stopped: {}", reason));
            }

            if result.is_success() {
                Reply::ok(&result, "imported", text)
            } else {
                Reply::unsuccessful(&result, "import incomplete", text)
            }
        }
        ConfigCommand::Validate { path } => validate_document(path),
    }
}

fn rule_from_args(args: &RuleArgs) -> IndexRule {
    let rule_type = match args.kind {
        RuleKind::Include => RuleType::Include,
        RuleKind::Exclude => RuleType::Exclude,
    };
    let mut rule = IndexRule::new(args.path.clone(), rule_type).with_recursive(!args.no_recursive);
    for pattern in &args.include_patterns {
        rule = rule.with_filter(FileTypeFilter::from_pattern(pattern, true));
    }
    for pattern in &args.exclude_patterns {
        rule = rule.with_filter(FileTypeFilter::from_pattern(pattern, false));
    }
    for subfolder in &args.excluded_subfolders {
        rule = rule.with_excluded_subfolder(subfolder.clone());
    }
    rule
}

fn kind_label(rule_type: RuleType) -> &'static str {
    if rule_type.is_include() {
        "include"
    } else {
        "exclude"
    }
}

fn render_rules(rules: &[IndexRule]) -> String {
    if rules.is_empty() {
        return "No rules".to_string();
    }
    rules
        .iter()
        .map(|rule| {
            let mut line = format!(
                "{:<8} {:<8} {}",
                kind_label(rule.rule_type),
                if rule.is_system() { "system" } else { "user" },
                rule.path
            );
            if !rule.file_type_filters.is_empty() {
                let patterns: Vec<String> = rule
                    .file_type_filters
                    .iter()
                    .map(|f| match f.filter_type {
                        FilterType::Include => format!("+{}", f.pattern),
                        FilterType::Exclude => format!("-{}", f.pattern),
                    })
                    .collect();
                line.push_str(&format!("  [{}]", patterns.join(" ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_extensions(settings: &[FileExtensionSetting]) -> String {
    if settings.is_empty() {
        return "No extension settings".to_string();
    }
    settings
        .iter()
        .map(|s| {
            format!(
                "{:<12} {:<22}{}",
                s.extension,
                s.indexing_depth.as_str(),
                if s.is_default_setting { " (default)" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexscope_core::{ConfigurationDocument, FilterTarget};
    use tempfile::TempDir;

    fn rule_args(path: &str) -> RuleArgs {
        RuleArgs {
            path: path.to_string(),
            kind: RuleKind::Include,
            no_recursive: true,
            include_patterns: vec!["*.md".to_string()],
            exclude_patterns: vec!["~*".to_string()],
            excluded_subfolders: vec!["node_modules".to_string()],
        }
    }

    #[test]
    fn test_rule_from_args() {
        let rule = rule_from_args(&rule_args(r"D:\Notes"));
        assert_eq!(rule.path, r"D:\Notes");
        assert!(!rule.recursive);
        assert_eq!(rule.file_type_filters.len(), 2);
        assert_eq!(rule.file_type_filters[0].applies_to, FilterTarget::FileExtension);
        assert_eq!(rule.file_type_filters[1].filter_type, FilterType::Exclude);
        assert_eq!(rule.excluded_subfolders, vec!["node_modules".to_string()]);
    }

    #[test]
    fn test_validate_reports_invalid_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        let document = ConfigurationDocument::new(
            "tester",
            "WS-01",
            vec![IndexRule::include(""), IndexRule::include(r"D:\Ok")],
            Vec::new(),
        );
        std::fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();

        let reply = validate_document(&path).unwrap();
        assert!(!reply.result.success);
        assert_eq!(reply.exit_code(), 1);
        assert!(reply.text.contains("is invalid"));
    }

    #[test]
    fn test_validate_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_document(&temp_dir.path().join("absent.json")).is_err());
    }
}
