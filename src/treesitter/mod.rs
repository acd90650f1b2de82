//! Tree-sitter declaration table: where things are in a Java source file.
//!
//! A file is parsed once into a flat table of declarations (types, methods,
//! fields, imports) with 1-based line spans. The patch engine looks up
//! change targets here and re-parses after every edit.
//!
//! Closing lines come from `block_end`, a naive `{`/`}` counter that ignores
//! strings and comments.

pub mod languages;

use tree_sitter::{Node, Parser};

use languages::Lang;

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("failed to load {lang} grammar: {message}")]
    Grammar { lang: &'static str, message: String },

    #[error("parser produced no syntax tree")]
    NoTree,

    #[error("syntax error near line {line}")]
    Unparseable { line: usize },
}

/// What a declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// Class, interface, enum, record or annotation type.
    Class,
    /// Method or constructor.
    Method,
    Field,
    Import,
}

/// One row of the declaration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    /// Simple name; for imports, the imported path (`static` kept).
    pub name: String,
    /// Dotted path of the enclosing type (`Outer.Inner`), if any.
    pub class: Option<String>,
    /// Normalized parameter type names, in order (methods only).
    pub params: Vec<String>,
    /// First line, including modifiers and annotations.
    pub start_line: usize,
    /// Last line (closing brace or terminating `;`).
    pub end_line: usize,
    /// Line holding the opening brace of a type body.
    pub body_line: Option<usize>,
}

impl Declaration {
    /// `Outer.Inner.name`, or just the name at top level.
    pub fn qualified_name(&self) -> String {
        match &self.class {
            Some(outer) => format!("{outer}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// True when the two spans have a line in common.
    pub fn overlaps(&self, other: &Declaration) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }

    /// True when this declaration shares a line with the header (through the
    /// opening brace) or the closing line of `class`.
    pub fn touches_frame_of(&self, class: &Declaration) -> bool {
        let header_end = class.body_line.unwrap_or(class.start_line);
        let in_header = self.start_line <= header_end && class.start_line <= self.end_line;
        let on_close = self.start_line <= class.end_line && class.end_line <= self.end_line;
        in_header || on_close
    }
}

/// All declarations of one source file, in source order.
#[derive(Debug, Clone)]
pub struct DeclarationTable {
    lang: Lang,
    package_line: Option<usize>,
    declarations: Vec<Declaration>,
}

impl DeclarationTable {
    /// Parse `source` and build its table. Sources with any syntax error are
    /// rejected.
    pub fn parse(lang: Lang, source: &str) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new();
        parser
            .set_language(&lang.grammar())
            .map_err(|e| SyntaxError::Grammar {
                lang: lang.name(),
                message: e.to_string(),
            })?;
        let tree = parser.parse(source, None).ok_or(SyntaxError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(SyntaxError::Unparseable {
                line: first_error_line(root).unwrap_or(1),
            });
        }

        let lines: Vec<&str> = source.split('\n').collect();
        let mut table = Self {
            lang,
            package_line: None,
            declarations: Vec::new(),
        };
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            match node.kind() {
                "package_declaration" => table.package_line = Some(line_of(node)),
                "import_declaration" => table.declarations.push(Declaration {
                    kind: DeclKind::Import,
                    name: normalize_import(node_text(node, source)),
                    class: None,
                    params: Vec::new(),
                    start_line: line_of(node),
                    end_line: end_line_of(node),
                    body_line: None,
                }),
                kind if is_type_declaration(kind) => table.collect_type(node, source, &lines, None),
                _ => {}
            }
        }
        Ok(table)
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn package_line(&self) -> Option<usize> {
        self.package_line
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Type by dotted path (`Outer.Inner`) or by simple name. A simple name
    /// shared by several nested types matches none of them.
    pub fn class(&self, name: &str) -> Option<&Declaration> {
        match self.classes_named(name).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Every type `name` could refer to. An exact path wins over simple names.
    pub fn classes_named(&self, name: &str) -> Vec<&Declaration> {
        let types = || self.declarations.iter().filter(|d| d.kind == DeclKind::Class);
        let exact: Vec<&Declaration> = types().filter(|d| d.qualified_name() == name).collect();
        if !exact.is_empty() {
            return exact;
        }
        types().filter(|d| d.name == name).collect()
    }

    /// Method (or constructor) matched by name and ordered parameter types.
    pub fn method(&self, class: &str, name: &str, params: &[String]) -> Option<&Declaration> {
        let wanted: Vec<String> = params.iter().map(|p| normalize_type(p)).collect();
        self.members(class)
            .find(|d| d.kind == DeclKind::Method && d.name == name && d.params == wanted)
    }

    pub fn field(&self, class: &str, name: &str) -> Option<&Declaration> {
        self.members(class)
            .find(|d| d.kind == DeclKind::Field && d.name == name)
    }

    /// Import matched by exact path; `import` and `;` are optional in `path`.
    pub fn import(&self, path: &str) -> Option<&Declaration> {
        let wanted = normalize_import(path);
        self.declarations
            .iter()
            .find(|d| d.kind == DeclKind::Import && d.name == wanted)
    }

    /// First method or constructor of a class, by position.
    pub fn first_method(&self, class: &str) -> Option<&Declaration> {
        self.members(class)
            .filter(|d| d.kind == DeclKind::Method)
            .min_by_key(|d| d.start_line)
    }

    /// Direct members of a class, resolved as by `class`.
    pub fn members<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a Declaration> + 'a {
        let path = self.class(class).map(Declaration::qualified_name);
        self.declarations
            .iter()
            .filter(move |d| d.kind != DeclKind::Import && path.is_some() && d.class == path)
    }

    fn collect_type(&mut self, node: Node, source: &str, lines: &[&str], outer: Option<&str>) {
        let Some(name) = field_text(node, "name", source) else {
            return;
        };
        let path = match outer {
            Some(outer) => format!("{outer}.{name}"),
            None => name.to_string(),
        };
        let body = node.child_by_field_name("body");
        let body_line = body.map(line_of);
        let end_line = body_line
            .and_then(|line| block_end(lines, line))
            .unwrap_or_else(|| end_line_of(node));

        self.declarations.push(Declaration {
            kind: DeclKind::Class,
            name: name.to_string(),
            class: outer.map(str::to_string),
            params: Vec::new(),
            start_line: line_of(node),
            end_line,
            body_line,
        });

        if let Some(body) = body {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                self.collect_member(member, &path, source, lines);
            }
        }
    }

    fn collect_member(&mut self, member: Node, class: &str, source: &str, lines: &[&str]) {
        match member.kind() {
            "field_declaration" | "constant_declaration" => {
                let mut cursor = member.walk();
                for declarator in member.children_by_field_name("declarator", &mut cursor) {
                    if let Some(name) = field_text(declarator, "name", source) {
                        self.declarations.push(Declaration {
                            kind: DeclKind::Field,
                            name: name.to_string(),
                            class: Some(class.to_string()),
                            params: Vec::new(),
                            start_line: line_of(member),
                            end_line: end_line_of(member),
                            body_line: None,
                        });
                    }
                }
            }
            "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                let Some(name) = field_text(member, "name", source) else {
                    return;
                };
                let params = member
                    .child_by_field_name("parameters")
                    .map(|p| parameter_types(p, source))
                    .unwrap_or_default();
                let start_line = line_of(member);
                let scan_from = member
                    .child_by_field_name("body")
                    .map(line_of)
                    .unwrap_or(start_line);
                let end_line = block_end(lines, scan_from).unwrap_or_else(|| end_line_of(member));

                self.declarations.push(Declaration {
                    kind: DeclKind::Method,
                    name: name.to_string(),
                    class: Some(class.to_string()),
                    params,
                    start_line,
                    end_line,
                    body_line: None,
                });
            }
            "enum_body_declarations" => {
                let mut cursor = member.walk();
                for inner in member.named_children(&mut cursor) {
                    self.collect_member(inner, class, source, lines);
                }
            }
            kind if is_type_declaration(kind) => self.collect_type(member, source, lines, Some(class)),
            _ => {}
        }
    }
}

/// Names declared by a field snippet such as `private int a = 1, b;`.
/// Empty when the snippet is not a field declaration.
pub fn field_names(lang: Lang, code: &str) -> Vec<String> {
    let wrapped = format!("class FieldSnippet {{\n{code}\n}}\n");
    match DeclarationTable::parse(lang, &wrapped) {
        Ok(table) => table
            .declarations
            .into_iter()
            .filter(|d| d.kind == DeclKind::Field)
            .map(|d| d.name)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Last line (1-based) of the brace block that opens on or after `start`.
///
/// Counts `{` and `}` per line from `start`; the block ends on the line where
/// the depth returns to zero. A declaration without braces ends on the first
/// line containing `;`. Returns `None` when the braces never balance.
pub fn block_end<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    let mut depth: i64 = 0;
    let mut opened = false;
    for (index, line) in lines.iter().enumerate().skip(start.saturating_sub(1)) {
        let line = line.as_ref();
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return Some(index + 1);
        }
        if !opened && line.contains(';') {
            return Some(index + 1);
        }
    }
    None
}

/// Reduce a Java type to its simple name: `java.util.List<String>` → `List`,
/// `String[]` and `String...` → `String`.
pub fn normalize_type(raw: &str) -> String {
    let mut depth = 0usize;
    let mut stripped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    let stripped = stripped.replace("...", "").replace(['[', ']'], "");
    let last = stripped
        .split_whitespace()
        .rfind(|token| !token.starts_with('@'))
        .unwrap_or("");
    last.rsplit('.').next().unwrap_or(last).to_string()
}

/// Canonical import path: no `import` keyword, no `;`, single spaces.
pub fn normalize_import(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("import") {
        if rest.starts_with(char::is_whitespace) {
            text = rest;
        }
    }
    let text = text.trim().trim_end_matches(';');
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

fn parameter_types(params: Node, source: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let type_node = match param.kind() {
            "formal_parameter" => param.child_by_field_name("type"),
            "spread_parameter" => {
                let mut inner = param.walk();
                let found = param
                    .named_children(&mut inner)
                    .find(|n| !matches!(n.kind(), "modifiers" | "variable_declarator"));
                found
            }
            _ => None, // receiver parameters
        };
        if let Some(type_node) = type_node {
            types.push(normalize_type(node_text(type_node, source)));
        }
    }
    types
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    None
}

fn field_text<'s>(node: Node, field: &str, source: &'s str) -> Option<&'s str> {
    let child = node.child_by_field_name(field)?;
    let text = node_text(child, source);
    (!text.is_empty()).then_some(text)
}

fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

fn end_line_of(node: Node) -> usize {
    node.end_position().row + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_SERVICE: &str = r#"package com.example.service;

import java.util.List;
import java.util.Map;

@Service
public class UserService {
    private final UserRepository repository;
    private int count = 0, limit = 10;

    public UserService(UserRepository repository) {
        this.repository = repository;
    }

    @Override
    public String createUser(String name, List<String> roles) {
        if (name == null) {
            return null;
        }
        return name;
    }

    public void log(String... parts) {
    }

    static class Helper {
        int x;
    }
}

interface Greeter {
    String greet(String name);
}
"#;

    fn table() -> DeclarationTable {
        DeclarationTable::parse(Lang::Java, USER_SERVICE).unwrap()
    }

    #[test]
    fn finds_package_and_imports() {
        let t = table();
        assert_eq!(t.package_line(), Some(1));
        let list = t.import("java.util.List").unwrap();
        assert_eq!(list.start_line, 3);
        assert!(t.import("import java.util.Map;").is_some());
        assert!(t.import("java.util.Set").is_none());
    }

    #[test]
    fn class_span_covers_annotations_and_body() {
        let t = table();
        let class = t.class("UserService").unwrap();
        assert_eq!(class.start_line, 6);
        assert_eq!(class.body_line, Some(7));
        assert_eq!(class.end_line, 29);
        assert_eq!(class.class, None);
    }

    #[test]
    fn fields_per_declarator() {
        let t = table();
        assert_eq!(t.field("UserService", "repository").unwrap().start_line, 8);
        assert_eq!(t.field("UserService", "count").unwrap().start_line, 9);
        assert_eq!(t.field("UserService", "limit").unwrap().start_line, 9);
        assert!(t.field("UserService", "x").is_none());
        assert!(t.field("Helper", "x").is_some());
    }

    #[test]
    fn methods_match_on_parameter_types() {
        let t = table();
        let create = t
            .method("UserService", "createUser", &["String".into(), "List<String>".into()])
            .unwrap();
        assert_eq!(create.start_line, 15);
        assert_eq!(create.end_line, 21);
        assert_eq!(create.params, vec!["String", "List"]);
        assert!(t.method("UserService", "createUser", &["String".into()]).is_none());

        let log = t.method("UserService", "log", &["String...".into()]).unwrap();
        assert_eq!((log.start_line, log.end_line), (23, 24));
    }

    #[test]
    fn constructor_is_first_method() {
        let t = table();
        let ctor = t.first_method("UserService").unwrap();
        assert_eq!(ctor.name, "UserService");
        assert_eq!(ctor.params, vec!["UserRepository"]);
        assert_eq!((ctor.start_line, ctor.end_line), (11, 13));
    }

    #[test]
    fn nested_and_sibling_types() {
        let t = table();
        let helper = t.class("Helper").unwrap();
        assert_eq!(helper.class.as_deref(), Some("UserService"));
        assert_eq!((helper.start_line, helper.end_line), (26, 28));

        let greet = t.method("Greeter", "greet", &["String".into()]).unwrap();
        assert_eq!((greet.start_line, greet.end_line), (32, 32));
    }

    #[test]
    fn nested_types_are_keyed_by_path() {
        let source = "class A {\n    static class Builder {\n        int a;\n    }\n}\n\nclass B {\n    static class Builder {\n        int b;\n    }\n}\n";
        let t = DeclarationTable::parse(Lang::Java, source).unwrap();

        assert!(t.class("Builder").is_none());
        assert_eq!(t.classes_named("Builder").len(), 2);
        let builder = t.class("B.Builder").unwrap();
        assert_eq!((builder.start_line, builder.end_line), (8, 10));
        assert!(t.field("A.Builder", "a").is_some());
        assert!(t.field("A.Builder", "b").is_none());
        assert_eq!(t.members("B.Builder").count(), 1);
        assert_eq!(t.members("Builder").count(), 0);
    }

    #[test]
    fn field_names_of_snippets() {
        assert_eq!(field_names(Lang::Java, "private int a = 1, b;"), vec!["a", "b"]);
        assert_eq!(field_names(Lang::Java, "    @Inject Foo foo;"), vec!["foo"]);
        assert!(field_names(Lang::Java, "void f() {}").is_empty());
        assert!(field_names(Lang::Java, "int (").is_empty());
    }

    #[test]
    fn frame_and_overlap_checks() {
        let t = DeclarationTable::parse(Lang::Java, "class Foo { int a; }\nclass Bar {\n    int b, c;\n}\n").unwrap();
        let foo = t.class("Foo").unwrap();
        let a = t.field("Foo", "a").unwrap();
        assert!(a.touches_frame_of(foo));

        let bar = t.class("Bar").unwrap();
        let b = t.field("Bar", "b").unwrap();
        let c = t.field("Bar", "c").unwrap();
        assert!(!b.touches_frame_of(bar));
        assert!(b.overlaps(c));
        assert_eq!(c.qualified_name(), "Bar.c");
    }

    #[test]
    fn enum_members_are_collected() {
        let source = "enum Color {\n    RED, GREEN;\n\n    int code() {\n        return 1;\n    }\n}\n";
        let t = DeclarationTable::parse(Lang::Java, source).unwrap();
        let code = t.method("Color", "code", &[]).unwrap();
        assert_eq!((code.start_line, code.end_line), (4, 6));
        assert_eq!(t.class("Color").unwrap().end_line, 7);
    }

    #[test]
    fn broken_source_is_unparseable() {
        let err = DeclarationTable::parse(Lang::Java, "public class A {\n    void f( {\n}\n").unwrap_err();
        assert!(matches!(err, SyntaxError::Unparseable { .. }));
    }

    #[test]
    fn block_end_counts_braces() {
        let lines = ["void f() {", "    if (x) {", "    }", "}", "int y;"];
        assert_eq!(block_end(&lines[..], 1), Some(4));
        assert_eq!(block_end(&lines[..], 2), Some(3));
        assert_eq!(block_end(&lines[..], 5), Some(5));
    }

    #[test]
    fn block_end_unbalanced_is_none() {
        let lines = ["class A {", "    void f() {", "}"];
        assert_eq!(block_end(&lines[..], 1), None);
    }

    #[test]
    fn block_end_is_naive_about_strings() {
        let lines = ["void f() {", "    String s = \"}\";", "}"];
        assert_eq!(block_end(&lines[..], 1), Some(2));
    }

    #[test]
    fn type_normalization() {
        assert_eq!(normalize_type("java.util.List<String>"), "List");
        assert_eq!(normalize_type("Map<String, List<Integer>>"), "Map");
        assert_eq!(normalize_type("String[]"), "String");
        assert_eq!(normalize_type("String..."), "String");
        assert_eq!(normalize_type("@NonNull String"), "String");
        assert_eq!(normalize_type("int"), "int");
    }

    #[test]
    fn import_normalization() {
        assert_eq!(normalize_import("import java.util.List;"), "java.util.List");
        assert_eq!(normalize_import("import  static org.junit.Assert.*;"), "static org.junit.Assert.*");
        assert_eq!(normalize_import("important.Thing"), "important.Thing");
    }
}
