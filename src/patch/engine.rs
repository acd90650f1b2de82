//! Applies change sets operation by operation and reports every outcome.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::change_set::{Change, ChangeSet, Operation};
use super::source_file::{Edit, SourceFile};
use super::{ChangeError, PatchError};
use crate::treesitter::{field_names, normalize_import, DeclKind, Declaration, DeclarationTable};

/// Indent added to a class's own indent for new members.
const MEMBER_INDENT: &str = "    ";

/// Applies change sets to files under a project root.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    root: PathBuf,
}

/// What became of one operation.
#[derive(Debug)]
pub enum OperationOutcome {
    Applied,
    /// Nothing to do, or nothing could be done; the tree is untouched.
    Skipped(String),
    Failed(PatchError),
}

#[derive(Debug)]
pub struct ChangeReport {
    pub label: String,
    pub result: Result<(), ChangeError>,
}

#[derive(Debug)]
pub struct OperationReport {
    pub action: &'static str,
    pub file: String,
    pub outcome: OperationOutcome,
    /// Per-change results (UPDATE_CODE only).
    pub changes: Vec<ChangeReport>,
}

#[derive(Debug, Default)]
pub struct PatchReport {
    pub operations: Vec<OperationReport>,
}

impl PatchReport {
    pub fn applied(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op.outcome, OperationOutcome::Applied))
            .count()
    }

    /// Failed operations plus failed changes.
    pub fn failures(&self) -> usize {
        self.operations
            .iter()
            .map(|op| {
                let failed_op = usize::from(matches!(op.outcome, OperationOutcome::Failed(_)));
                failed_op + op.changes.iter().filter(|c| c.result.is_err()).count()
            })
            .sum()
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.operations.iter().enumerate() {
            let status = match &op.outcome {
                OperationOutcome::Applied => "applied".to_string(),
                OperationOutcome::Skipped(reason) => format!("skipped: {reason}"),
                OperationOutcome::Failed(e) => format!("failed: {e}"),
            };
            writeln!(f, "[{}] {} {}: {status}", i + 1, op.action, op.file)?;
            for change in &op.changes {
                match &change.result {
                    Ok(()) => writeln!(f, "    ok     {}", change.label)?,
                    Err(e) => writeln!(f, "    failed {}: {e}", change.label)?,
                }
            }
        }
        write!(
            f,
            "{} of {} operations applied, {} failures",
            self.applied(),
            self.operations.len(),
            self.failures()
        )
    }
}

impl PatchEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Apply every operation in document order. Never stops early.
    pub fn apply(&self, set: &ChangeSet) -> PatchReport {
        let mut report = PatchReport::default();
        for operation in &set.operations {
            let mut changes = Vec::new();
            let outcome = match self.apply_operation(operation, &mut changes) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(action = operation.action(), file = ?operation.file(), error = %e, "operation failed");
                    OperationOutcome::Failed(e)
                }
            };
            report.operations.push(OperationReport {
                action: operation.action(),
                file: operation.file().unwrap_or("-").to_string(),
                outcome,
                changes,
            });
        }
        report
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn apply_operation(
        &self,
        operation: &Operation,
        changes: &mut Vec<ChangeReport>,
    ) -> Result<OperationOutcome, PatchError> {
        match operation {
            Operation::CreateFile { file, content } => {
                let path = self.resolve(file);
                let content = content
                    .as_deref()
                    .ok_or_else(|| PatchError::MissingContent { path: path.clone() })?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| PatchError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                if path.exists() {
                    warn!(path = %path.display(), "overwriting existing file");
                }
                fs::write(&path, content).map_err(|source| PatchError::Write {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "created file");
                Ok(OperationOutcome::Applied)
            }

            Operation::DeleteFile { file } => {
                let path = self.resolve(file);
                if !path.exists() {
                    info!(path = %path.display(), "delete: file does not exist");
                    return Ok(OperationOutcome::Skipped("file does not exist".into()));
                }
                fs::remove_file(&path).map_err(|source| PatchError::Write {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "deleted file");
                Ok(OperationOutcome::Applied)
            }

            Operation::RenameFile { file, new_file } => {
                let from = self.resolve(file);
                let new_file = new_file
                    .as_deref()
                    .ok_or_else(|| PatchError::MissingTarget { path: from.clone() })?;
                if !from.exists() {
                    info!(path = %from.display(), "rename: source does not exist");
                    return Ok(OperationOutcome::Skipped("source file does not exist".into()));
                }
                let to = self.resolve(new_file);
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent).map_err(|source| PatchError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                fs::rename(&from, &to).map_err(|source| PatchError::Write {
                    path: to.clone(),
                    source,
                })?;
                info!(from = %from.display(), to = %to.display(), "renamed file");
                Ok(OperationOutcome::Applied)
            }

            Operation::UpdateCode { file, changes: wanted } => {
                let path = self.resolve(file);
                let mut source = SourceFile::load(&path)?;
                let mut succeeded = 0;
                for change in wanted {
                    let result = apply_change(&mut source, change);
                    match &result {
                        Ok(()) => {
                            info!(path = %path.display(), change = %change, "applied change");
                            succeeded += 1;
                        }
                        Err(e) => {
                            warn!(path = %path.display(), change = %change, error = %e, "change skipped")
                        }
                    }
                    changes.push(ChangeReport {
                        label: change.to_string(),
                        result,
                    });
                }

                if succeeded == 0 {
                    return Ok(OperationOutcome::Skipped("no change applied".into()));
                }
                source.save()?;
                Ok(OperationOutcome::Applied)
            }

            Operation::Unknown => Err(PatchError::UnsupportedAction),
        }
    }
}

/// Locate and apply one change against the current state of `source`.
pub fn apply_change(source: &mut SourceFile, change: &Change) -> Result<(), ChangeError> {
    let edit = plan_change(source.table(), source.lines(), change)?;
    source.apply(edit).map_err(ChangeError::BreaksSyntax)
}

/// Turn a change into a line edit using the declaration table.
pub fn plan_change(
    table: &DeclarationTable,
    lines: &[String],
    change: &Change,
) -> Result<Edit, ChangeError> {
    match change {
        Change::AddClass { class, new_code } => {
            let class = required(class, "class name")?;
            if !table.classes_named(class).is_empty() {
                return Err(ChangeError::ClassExists(class.to_string()));
            }
            let code = required_code(new_code)?;
            Ok(Edit::Insert {
                before: table.package_line().map_or(1, |line| line + 1),
                lines: code_lines(code),
            })
        }

        Change::RemoveClass { class } => {
            let decl = resolve_class(table, required(class, "class name")?)?;
            Ok(Edit::Remove {
                start: decl.start_line,
                end: decl.end_line,
            })
        }

        Change::AddField {
            class,
            field,
            new_code,
        } => {
            let decl = resolve_class(table, required(class, "class name")?)?;
            let path = decl.qualified_name();
            let code = required_code(new_code)?;

            let mut names = field_names(table.lang(), code);
            if let Some(field) = field.as_deref().filter(|f| !f.trim().is_empty()) {
                if !names.iter().any(|n| n == field) {
                    names.push(field.to_string());
                }
            }
            if names.is_empty() {
                return Err(ChangeError::MissingName("field name"));
            }
            if let Some(taken) = names.iter().find(|n| table.field(&path, n).is_some()) {
                return Err(ChangeError::FieldExists {
                    class: path,
                    field: taken.clone(),
                });
            }

            let indent = member_indent(table, lines, decl);
            if let Some(edit) = open_one_line_body(lines, decl, &indent, code) {
                return Ok(edit);
            }
            let before = match table.first_method(&path) {
                Some(method) => method.start_line,
                None => decl.body_line.unwrap_or(decl.start_line) + 1,
            };
            Ok(Edit::Insert {
                before,
                lines: reindent(code, &indent),
            })
        }

        Change::RemoveField { class, field } => {
            let decl = find_field(table, class, field)?;
            Ok(Edit::Remove {
                start: decl.start_line,
                end: decl.end_line,
            })
        }

        Change::UpdateField {
            class,
            field,
            new_code,
        } => {
            let decl = find_field(table, class, field)?;
            let code = required_code(new_code)?;
            Ok(Edit::Replace {
                start: decl.start_line,
                end: decl.end_line,
                lines: code_lines(code),
            })
        }

        Change::AddMethod {
            class, new_code, ..
        } => {
            let decl = resolve_class(table, required(class, "class name")?)?;
            let code = required_code(new_code)?;
            let indent = member_indent(table, lines, decl);
            if let Some(edit) = open_one_line_body(lines, decl, &indent, code) {
                return Ok(edit);
            }
            Ok(Edit::Insert {
                before: decl.end_line,
                lines: reindent(code, &indent),
            })
        }

        Change::RemoveMethod {
            class,
            method,
            params,
        } => {
            let decl = find_method(table, class, method, params)?;
            Ok(Edit::Remove {
                start: decl.start_line,
                end: decl.end_line,
            })
        }

        Change::UpdateMethod {
            class,
            method,
            params,
            new_code,
        } => {
            let decl = find_method(table, class, method, params)?;
            let code = required_code(new_code)?;
            Ok(Edit::Replace {
                start: decl.start_line,
                end: decl.end_line,
                lines: code_lines(code),
            })
        }

        Change::AddImport { import, new_code } => {
            let path = import
                .as_deref()
                .or(new_code.as_deref())
                .map(normalize_import)
                .filter(|p| !p.is_empty())
                .ok_or(ChangeError::MissingName("import path"))?;
            if table.import(&path).is_some() {
                return Err(ChangeError::ImportExists(path));
            }
            Ok(Edit::Insert {
                before: table.package_line().map_or(1, |line| line + 1),
                lines: vec![format!("import {path};")],
            })
        }

        Change::RemoveImport { import } => {
            let path = required(import, "import path")?;
            let decl = table
                .import(path)
                .ok_or_else(|| ChangeError::ImportNotFound(normalize_import(path)))?;
            Ok(Edit::Remove {
                start: decl.start_line,
                end: decl.end_line,
            })
        }

        Change::Unknown => Err(ChangeError::Unsupported),
    }
}

fn required<'a>(value: &'a Option<String>, what: &'static str) -> Result<&'a str, ChangeError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ChangeError::MissingName(what))
}

fn required_code(new_code: &Option<String>) -> Result<&str, ChangeError> {
    new_code.as_deref().ok_or(ChangeError::MissingNewCode)
}

/// The one type `class` names, by path or simple name.
fn resolve_class<'t>(table: &'t DeclarationTable, class: &str) -> Result<&'t Declaration, ChangeError> {
    match table.classes_named(class).as_slice() {
        [] => Err(ChangeError::ClassNotFound(class.to_string())),
        [only] => Ok(*only),
        many => Err(ChangeError::AmbiguousClass {
            class: class.to_string(),
            candidates: many
                .iter()
                .map(|d| d.qualified_name())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn find_field<'t>(
    table: &'t DeclarationTable,
    class: &Option<String>,
    field: &Option<String>,
) -> Result<&'t Declaration, ChangeError> {
    let class = required(class, "class name")?;
    let field = required(field, "field name")?;
    let path = resolve_class(table, class)?.qualified_name();
    let decl = table.field(&path, field).ok_or_else(|| ChangeError::FieldNotFound {
        class: class.to_string(),
        field: field.to_string(),
    })?;
    ensure_own_lines(table, decl)?;
    Ok(decl)
}

fn find_method<'t>(
    table: &'t DeclarationTable,
    class: &Option<String>,
    method: &Option<String>,
    params: &[String],
) -> Result<&'t Declaration, ChangeError> {
    let class = required(class, "class name")?;
    let method = required(method, "method name")?;
    let path = resolve_class(table, class)?.qualified_name();
    let decl = table
        .method(&path, method, params)
        .ok_or_else(|| ChangeError::MethodNotFound {
            class: class.to_string(),
            method: method.to_string(),
            params: params.join(", "),
        })?;
    ensure_own_lines(table, decl)?;
    Ok(decl)
}

/// Line edits can only replace or remove a member that has its lines to
/// itself: no sibling declarator, no other member, no class header or
/// closing brace on any of them.
fn ensure_own_lines(table: &DeclarationTable, decl: &Declaration) -> Result<(), ChangeError> {
    let shared = table.declarations().iter().find(|other| {
        !std::ptr::eq(*other, decl)
            && match other.kind {
                DeclKind::Import => false,
                DeclKind::Class => decl.touches_frame_of(other),
                DeclKind::Method | DeclKind::Field => decl.overlaps(other),
            }
    });
    match shared {
        Some(other) => Err(ChangeError::SharedLines {
            target: describe(decl),
            other: describe(other),
        }),
        None => Ok(()),
    }
}

fn describe(decl: &Declaration) -> String {
    let kind = match decl.kind {
        DeclKind::Class => "class",
        DeclKind::Method => "method",
        DeclKind::Field => "field",
        DeclKind::Import => "import",
    };
    format!("{kind} {}", decl.qualified_name())
}

/// For a type whose body opens and closes on one line (`class A {}`), split
/// that line so the new member goes between the braces.
fn open_one_line_body(lines: &[String], class: &Declaration, indent: &str, code: &str) -> Option<Edit> {
    let line_no = class.body_line.filter(|&line| line == class.end_line)?;
    let line = lines.get(line_no.checked_sub(1)?)?;
    let close = line.rfind('}')?;
    let outer = &line[..line.len() - line.trim_start().len()];

    let mut replacement = vec![line[..close].trim_end().to_string()];
    replacement.extend(reindent(code, indent));
    replacement.push(format!("{outer}{}", &line[close..]));
    Some(Edit::Replace {
        start: line_no,
        end: line_no,
        lines: replacement,
    })
}

/// Code spliced in as given, one element per line.
fn code_lines(code: &str) -> Vec<String> {
    code.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Indent of the first member on its own line below the class header, or
/// the class's own indent plus one level.
fn member_indent(table: &DeclarationTable, lines: &[String], class: &Declaration) -> String {
    let line_indent = |line: usize| -> String {
        lines
            .get(line.saturating_sub(1))
            .map(|l| l[..l.len() - l.trim_start().len()].to_string())
            .unwrap_or_default()
    };
    let header_end = class.body_line.unwrap_or(class.start_line);
    match table
        .members(&class.qualified_name())
        .filter(|d| d.start_line > header_end)
        .min_by_key(|d| d.start_line)
    {
        Some(member) => line_indent(member.start_line),
        None => format!("{}{MEMBER_INDENT}", line_indent(class.start_line)),
    }
}

/// Strip the code's common indent and prefix every non-blank line with `indent`.
fn reindent(code: &str, indent: &str) -> Vec<String> {
    let lines: Vec<&str> = code
        .trim_matches(['\r', '\n'])
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                let body = l.get(common..).unwrap_or_else(|| l.trim_start());
                format!("{indent}{body}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    const FOO: &str = "package com.example;

import java.util.List;

public class Foo {
    private int count = 0;
    private String name;

    public Foo() {
    }

    public String bar(String input) {
        if (input == null) {
            return \"\";
        }
        return input.trim();
    }

    public String bar(int input) {
        return String.valueOf(input);
    }
}
";

    fn setup(source: &str) -> (TempDir, PatchEngine, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src/Foo.java");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        let engine = PatchEngine::new(dir.path());
        (dir, engine, path)
    }

    fn update(changes: &str) -> ChangeSet {
        ChangeSet::from_json(&format!(
            r#"{{"operations": [{{"file": "src/Foo.java", "action": "UPDATE_CODE", "changes": {changes}}}]}}"#
        ))
        .unwrap()
    }

    #[test]
    fn update_method_replaces_exact_span() {
        let (_dir, engine, path) = setup(FOO);
        let set = update(
            r#"[{"type": "UPDATE_METHOD", "class": "Foo", "method": "bar", "params": ["String"],
                "new_code": "    public String bar(String input) {\n        return input;\n    }"}]"#,
        );

        let report = engine.apply(&set);

        assert!(matches!(report.operations[0].outcome, OperationOutcome::Applied));
        let expected = FOO.replace(
            "    public String bar(String input) {
        if (input == null) {
            return \"\";
        }
        return input.trim();
    }",
            "    public String bar(String input) {
        return input;
    }",
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn overload_is_selected_by_parameter_types() {
        let (_dir, engine, path) = setup(FOO);
        let set = update(
            r#"[{"type": "REMOVE_METHOD", "class": "Foo", "method": "bar", "params": ["int"]}]"#,
        );

        engine.apply(&set);

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("String.valueOf"));
        assert!(text.contains("return input.trim();"));
    }

    #[test]
    fn duplicate_import_leaves_file_unchanged() {
        let (_dir, engine, path) = setup(FOO);
        let set = update(r#"[{"type": "ADD_IMPORT", "import": "java.util.List"}]"#);

        let report = engine.apply(&set);

        let change = &report.operations[0].changes[0];
        assert!(change.result.as_ref().unwrap_err().to_string().contains("already exists"));
        assert!(matches!(report.operations[0].outcome, OperationOutcome::Skipped(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), FOO);
    }

    #[test]
    fn invalid_change_does_not_block_valid_sibling() {
        let (_dir, engine, path) = setup(FOO);
        let set = update(
            r#"[{"type": "UPDATE_METHOD", "class": "Foo", "method": "missing", "params": [],
                 "new_code": "void missing() {}"},
                {"type": "UPDATE_FIELD", "class": "Foo", "field": "count",
                 "new_code": "    private int count = 42;"}]"#,
        );

        let report = engine.apply(&set);

        let changes = &report.operations[0].changes;
        assert!(matches!(
            changes[0].result,
            Err(ChangeError::MethodNotFound { .. })
        ));
        assert!(changes[1].result.is_ok());
        assert_eq!(report.failures(), 1);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("    private int count = 42;"));
        assert!(!text.contains("count = 0"));
    }

    #[test]
    fn add_import_goes_after_package_line() {
        let (_dir, engine, path) = setup(FOO);
        engine.apply(&update(r#"[{"type": "ADD_IMPORT", "import": "java.util.Map"}]"#));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("package com.example;\nimport java.util.Map;\n"));
    }

    #[test]
    fn remove_import() {
        let (_dir, engine, path) = setup(FOO);
        engine.apply(&update(r#"[{"type": "REMOVE_IMPORT", "import": "java.util.List"}]"#));
        assert!(!fs::read_to_string(&path).unwrap().contains("import java.util.List;"));
    }

    #[test]
    fn add_field_goes_before_first_method_indented() {
        let (_dir, engine, path) = setup(FOO);
        engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "Foo", "field": "enabled",
                 "new_code": "private boolean enabled;"}]"#,
        ));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("    private boolean enabled;\n    public Foo() {"));
    }

    #[test]
    fn add_field_rejects_duplicate() {
        let (_dir, engine, _path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "Foo", "field": "name",
                 "new_code": "private String name;"}]"#,
        ));
        assert!(matches!(
            report.operations[0].changes[0].result,
            Err(ChangeError::FieldExists { .. })
        ));
    }

    #[test]
    fn add_field_to_class_without_methods() {
        let (_dir, engine, path) = setup("class Foo {\n    int a;\n}\n");
        engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "Foo", "field": "b", "new_code": "int b;"}]"#,
        ));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "class Foo {\n    int b;\n    int a;\n}\n"
        );
    }

    #[test]
    fn add_field_opens_one_line_class() {
        let (_dir, engine, path) = setup("public class NewFeature {}\n");
        let report = engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "NewFeature", "field": "x", "new_code": "int x;"}]"#,
        ));
        assert_eq!(report.failures(), 0);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "public class NewFeature {\n    int x;\n}\n"
        );
    }

    #[test]
    fn add_method_opens_one_line_class() {
        let (_dir, engine, path) = setup("class Foo { }\n");
        engine.apply(&update(
            r#"[{"type": "ADD_METHOD", "class": "Foo", "method": "f", "new_code": "void f() {}"}]"#,
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "class Foo {\n    void f() {}\n}\n");

        let (_dir, engine, path) = setup("    class Foo { int a; }\n");
        engine.apply(&update(
            r#"[{"type": "ADD_METHOD", "class": "Foo", "method": "f", "new_code": "void f() {}"}]"#,
        ));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "    class Foo { int a;\n        void f() {}\n    }\n"
        );
    }

    #[test]
    fn add_field_takes_its_name_from_the_code() {
        let (_dir, engine, path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "Foo", "new_code": "private String name;"},
                {"type": "ADD_FIELD", "class": "Foo", "new_code": "not a field"}]"#,
        ));
        let changes = &report.operations[0].changes;
        assert!(matches!(
            &changes[0].result,
            Err(ChangeError::FieldExists { field, .. }) if field == "name"
        ));
        assert!(matches!(changes[1].result, Err(ChangeError::MissingName("field name"))));
        assert_eq!(fs::read_to_string(&path).unwrap(), FOO);
    }

    #[test]
    fn shared_declaration_is_not_split() {
        let source = "class Foo {\n    private int count = 0, limit = 10;\n}\n";
        let (_dir, engine, path) = setup(source);
        let report = engine.apply(&update(
            r#"[{"type": "UPDATE_FIELD", "class": "Foo", "field": "limit",
                 "new_code": "    private int limit = 20;"},
                {"type": "REMOVE_FIELD", "class": "Foo", "field": "count"}]"#,
        ));
        let changes = &report.operations[0].changes;
        assert!(matches!(
            &changes[0].result,
            Err(ChangeError::SharedLines { other, .. }) if other == "field Foo.count"
        ));
        assert!(matches!(changes[1].result, Err(ChangeError::SharedLines { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn member_on_class_line_is_not_removed_with_it() {
        let (_dir, engine, path) = setup("class Foo { int a; }\n");
        let report = engine.apply(&update(
            r#"[{"type": "REMOVE_FIELD", "class": "Foo", "field": "a"}]"#,
        ));
        assert!(report.operations[0].changes[0]
            .result
            .as_ref()
            .unwrap_err()
            .to_string()
            .contains("shares lines with class Foo"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "class Foo { int a; }\n");
    }

    #[test]
    fn nested_classes_are_addressed_by_path() {
        let source = "class A {\n    static class Builder {\n        int a;\n    }\n}\n\nclass B {\n    static class Builder {\n        int b;\n    }\n}\n";
        let (_dir, engine, path) = setup(source);
        let report = engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "Builder", "field": "c", "new_code": "int c;"},
                {"type": "ADD_FIELD", "class": "B.Builder", "field": "c", "new_code": "int c;"}]"#,
        ));
        let changes = &report.operations[0].changes;
        assert!(matches!(
            &changes[0].result,
            Err(ChangeError::AmbiguousClass { candidates, .. }) if candidates == "A.Builder, B.Builder"
        ));
        assert!(changes[1].result.is_ok());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            source.replace("        int b;\n", "        int c;\n        int b;\n")
        );
    }

    #[test]
    fn crlf_file_stays_crlf() {
        let (_dir, engine, path) = setup("class Foo {\r\n    int a;\r\n}\r\n");
        engine.apply(&update(
            r#"[{"type": "ADD_FIELD", "class": "Foo", "field": "b", "new_code": "int b;\r\n"}]"#,
        ));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "class Foo {\r\n    int b;\r\n    int a;\r\n}\r\n"
        );
    }

    #[test]
    fn add_method_goes_before_closing_brace() {
        let (_dir, engine, path) = setup(FOO);
        engine.apply(&update(
            r#"[{"type": "ADD_METHOD", "class": "Foo", "method": "reset",
                 "new_code": "public void reset() {\n    count = 0;\n}"}]"#,
        ));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with(
            "    public void reset() {\n        count = 0;\n    }\n}\n"
        ));
    }

    #[test]
    fn add_and_remove_class() {
        let (_dir, engine, path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "ADD_CLASS", "class": "Helper", "new_code": "class Helper {\n}"},
                {"type": "REMOVE_CLASS", "class": "Foo"}]"#,
        ));
        assert_eq!(report.failures(), 0);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "package com.example;\nclass Helper {\n}\n\nimport java.util.List;\n\n"
        );
    }

    #[test]
    fn add_existing_class_is_rejected() {
        let (_dir, engine, _path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "ADD_CLASS", "class": "Foo", "new_code": "class Foo {}"}]"#,
        ));
        assert!(matches!(
            report.operations[0].changes[0].result,
            Err(ChangeError::ClassExists(_))
        ));
    }

    #[test]
    fn missing_names_and_code_are_reported() {
        let (_dir, engine, _path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "UPDATE_METHOD", "class": "Foo", "method": "bar", "params": ["int"]},
                {"type": "REMOVE_FIELD", "class": "Foo"},
                {"type": "SPLIT_CLASS", "class": "Foo"}]"#,
        ));
        let changes = &report.operations[0].changes;
        assert!(matches!(changes[0].result, Err(ChangeError::MissingNewCode)));
        assert!(matches!(changes[1].result, Err(ChangeError::MissingName(_))));
        assert!(matches!(changes[2].result, Err(ChangeError::Unsupported)));
    }

    #[test]
    fn syntax_breaking_change_is_rolled_back() {
        let (_dir, engine, path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "UPDATE_FIELD", "class": "Foo", "field": "name", "new_code": "    private String name("}]"#,
        ));
        assert!(matches!(
            report.operations[0].changes[0].result,
            Err(ChangeError::BreaksSyntax(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), FOO);
    }

    #[test]
    fn unparseable_file_fails_only_its_operation() {
        let (dir, engine, _path) = setup("class Foo { void f( }");
        let set = ChangeSet::from_json(
            r#"{"operations": [
                {"file": "src/Foo.java", "action": "UPDATE_CODE",
                 "changes": [{"type": "REMOVE_CLASS", "class": "Foo"}]},
                {"file": "src/New.java", "action": "CREATE_FILE", "content": "class New {}"}
            ]}"#,
        )
        .unwrap();

        let report = engine.apply(&set);

        assert!(matches!(
            report.operations[0].outcome,
            OperationOutcome::Failed(PatchError::Syntax { .. })
        ));
        assert!(matches!(report.operations[1].outcome, OperationOutcome::Applied));
        assert!(dir.path().join("src/New.java").exists());
    }

    #[test]
    fn create_file_makes_directories() {
        let dir = TempDir::new().unwrap();
        let engine = PatchEngine::new(dir.path());
        let content = "package com.example;\n\npublic class New {\n}\n";
        let set = ChangeSet::from_json(&format!(
            r#"{{"operations": [{{"file": "src/main/java/com/example/New.java", "action": "CREATE_FILE", "content": {}}}]}}"#,
            serde_json::to_string(content).unwrap()
        ))
        .unwrap();

        let report = engine.apply(&set);

        assert!(matches!(report.operations[0].outcome, OperationOutcome::Applied));
        let written = fs::read_to_string(dir.path().join("src/main/java/com/example/New.java")).unwrap();
        assert_eq!(written, content);
    }

    #[test]
    fn create_without_content_fails() {
        let dir = TempDir::new().unwrap();
        let engine = PatchEngine::new(dir.path());
        let set = ChangeSet::from_json(
            r#"{"operations": [{"file": "src/New.java", "action": "CREATE_FILE"}]}"#,
        )
        .unwrap();
        let report = engine.apply(&set);
        assert!(matches!(
            report.operations[0].outcome,
            OperationOutcome::Failed(PatchError::MissingContent { .. })
        ));
        assert!(!dir.path().join("src/New.java").exists());
    }

    #[test]
    fn delete_and_rename_tolerate_missing_files() {
        let (dir, engine, _path) = setup(FOO);
        let set = ChangeSet::from_json(
            r#"{"operations": [
                {"file": "src/Gone.java", "action": "DELETE_FILE"},
                {"file": "src/Gone.java", "action": "RENAME_FILE", "new_file": "src/Back.java"},
                {"file": "src/Foo.java", "action": "RENAME_FILE", "new_file": "src/moved/Bar.java"},
                {"file": "src/moved/Bar.java", "action": "DELETE_FILE"},
                {"file": "x", "action": "CHMOD"}
            ]}"#,
        )
        .unwrap();

        let report = engine.apply(&set);

        let outcomes: Vec<_> = report.operations.iter().map(|op| &op.outcome).collect();
        assert!(matches!(outcomes[0], OperationOutcome::Skipped(_)));
        assert!(matches!(outcomes[1], OperationOutcome::Skipped(_)));
        assert!(matches!(outcomes[2], OperationOutcome::Applied));
        assert!(matches!(outcomes[3], OperationOutcome::Applied));
        assert!(matches!(
            outcomes[4],
            OperationOutcome::Failed(PatchError::UnsupportedAction)
        ));
        assert!(!dir.path().join("src/Foo.java").exists());
        assert!(!dir.path().join("src/moved/Bar.java").exists());
    }

    #[test]
    fn report_renders_every_outcome() {
        let (_dir, engine, _path) = setup(FOO);
        let report = engine.apply(&update(
            r#"[{"type": "ADD_IMPORT", "import": "java.util.List"},
                {"type": "ADD_IMPORT", "import": "java.util.Set"}]"#,
        ));
        let text = report.to_string();
        assert!(text.contains("[1] UPDATE_CODE src/Foo.java: applied"));
        assert!(text.contains("failed ADD_IMPORT java.util.List: import java.util.List already exists"));
        assert!(text.contains("ok     ADD_IMPORT java.util.Set"));
        assert!(text.ends_with("1 of 1 operations applied, 1 failures"));
    }

    #[test]
    fn reindent_strips_common_indent() {
        assert_eq!(
            reindent("\n    void f() {\n        x();\n    }\n", "  "),
            vec!["  void f() {", "      x();", "  }"]
        );
        assert_eq!(reindent("a\n\nb", ">"), vec![">a", "", ">b"]);
    }
}
