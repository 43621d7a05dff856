use crate::error::{ChunkerError, Result};
use crate::language::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser};

static LICENSE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)copyright|license|apache").expect("license keyword pattern is valid")
});

const NO_INIT_PLACEHOLDER: &str = "    # No __init__ method";

/// Structural role of a parsed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Class,
    Function,
    Statement,
}

/// One top-level declaration (or run of statements) of a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub kind: UnitKind,
    /// Declared name; `None` for statements
    pub name: Option<String>,
    /// Decorators and signature line
    pub header_text: String,
    /// Text of the unit as a single chunk
    pub text: String,
    /// Same as `text` without the docstring
    pub code_text: String,
    /// Cleaned docstring, if the declaration has one
    pub docstring: Option<String>,
    /// Methods of a class, excluding the initializer
    pub children: Vec<SourceUnit>,
}

impl SourceUnit {
    fn statement(text: String) -> Self {
        Self {
            kind: UnitKind::Statement,
            name: None,
            header_text: String::new(),
            code_text: text.clone(),
            text,
            docstring: None,
            children: Vec::new(),
        }
    }
}

/// Parsed declarations plus every import of the file
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    pub units: Vec<SourceUnit>,
    pub imports: Vec<String>,
}

/// Tree-sitter front end turning source into [`SourceUnit`]s
pub struct AstAnalyzer {
    parser: Parser,
    language: Language,
}

impl AstAnalyzer {
    /// Create new AST analyzer for a language
    pub fn new(language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(ChunkerError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self { parser, language })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse `content`. Source with any syntax error is rejected.
    pub fn analyze(&mut self, content: &str) -> Result<ParsedModule> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))?;

        let root = tree.root_node();
        if root.has_error() {
            let position = first_error(root).map_or(root.start_position(), |n| n.start_position());
            return Err(ChunkerError::parse(format!(
                "syntax error near line {}",
                position.row + 1
            )));
        }

        let mut imports = Vec::new();
        collect_imports(content, root, &mut imports);

        let lines: Vec<&str> = content.lines().collect();
        Ok(ParsedModule {
            units: extract_units(content, &lines, root),
            imports,
        })
    }
}

/// Top-level declarations, with consecutive plain statements grouped together
fn extract_units(content: &str, lines: &[&str], root: Node) -> Vec<SourceUnit> {
    let mut units = Vec::new();
    let mut statements: Vec<String> = Vec::new();

    let mut cursor = root.walk();
    let children: Vec<_> = root.named_children(&mut cursor).collect();

    for child in children {
        if is_import(child) || child.kind() == "comment" {
            continue;
        }

        let definition = definition_of(child);
        let unit = match definition.kind() {
            "class_definition" => class_unit(content, lines, child, definition),
            "function_definition" => function_unit(content, lines, child, definition),
            _ => {
                statements.push(node_lines(lines, child));
                continue;
            }
        };

        flush_statements(&mut units, &mut statements);
        units.push(unit);
    }

    flush_statements(&mut units, &mut statements);
    units
}

fn flush_statements(units: &mut Vec<SourceUnit>, statements: &mut Vec<String>) {
    if statements.is_empty() {
        return;
    }
    let text = statements.join("\n");
    statements.clear();
    if !text.trim().is_empty() {
        units.push(SourceUnit::statement(text));
    }
}

fn class_unit(content: &str, lines: &[&str], outer: Node, class: Node) -> SourceUnit {
    let name = field_text(content, class, "name").unwrap_or_default().to_string();

    let mut header: Vec<String> = decorators(outer)
        .into_iter()
        .map(|decorator| node_lines(lines, decorator))
        .collect();
    header.push(match field_text(content, class, "superclasses") {
        Some(bases) => {
            let bases = bases.trim_start_matches('(').trim_end_matches(')').trim();
            format!("class {name}({bases}):")
        }
        None => format!("class {name}:"),
    });
    let header_text = header.join("\n");

    let docstring_stmt = docstring_statement(class);
    let docstring = docstring_stmt.and_then(|stmt| docstring_text(content, stmt));

    let mut members = Vec::new();
    let mut initializer = None;
    let mut methods = Vec::new();

    if let Some(body) = class.child_by_field_name("body") {
        let mut cursor = body.walk();
        let statements: Vec<_> = body.named_children(&mut cursor).collect();
        for stmt in statements {
            if stmt.kind() == "comment" || Some(stmt) == docstring_stmt {
                continue;
            }

            let definition = definition_of(stmt);
            if definition.kind() != "function_definition" {
                members.push(node_lines(lines, stmt));
                continue;
            }

            if initializer.is_none() && field_text(content, definition, "name") == Some("__init__") {
                initializer = Some(node_lines(lines, stmt));
            } else {
                methods.push(function_unit(content, lines, stmt, definition));
            }
        }
    }

    members.push(initializer.unwrap_or_else(|| NO_INIT_PLACEHOLDER.to_string()));
    let body_text = members.join("\n");

    let mut parts = vec![header_text.clone()];
    if let Some(doc) = &docstring {
        parts.push(format!("    \"\"\"{doc}\"\"\""));
    }
    parts.push(body_text.clone());

    SourceUnit {
        kind: UnitKind::Class,
        name: Some(name),
        text: parts.join("\n"),
        code_text: format!("{header_text}\n{body_text}"),
        header_text,
        docstring,
        children: methods,
    }
}

fn function_unit(content: &str, lines: &[&str], outer: Node, function: Node) -> SourceUnit {
    let name = field_text(content, function, "name").unwrap_or_default().to_string();
    let text = node_lines(lines, outer);

    let header_text = function
        .child_by_field_name("body")
        .map(|body| content[outer.start_byte()..body.start_byte()].trim_end().to_string())
        .unwrap_or_else(|| text.clone());

    let docstring_stmt = docstring_statement(function);
    let docstring = docstring_stmt.and_then(|stmt| docstring_text(content, stmt));

    let code_text = match docstring_stmt {
        // A docstring sharing the signature line cannot be cut out by lines
        Some(stmt) if stmt.start_position().row > outer.start_position().row => {
            let skip = stmt.start_position().row..=stmt.end_position().row;
            (outer.start_position().row..=outer.end_position().row)
                .filter(|row| !skip.contains(row))
                .filter_map(|row| lines.get(row).copied())
                .collect::<Vec<_>>()
                .join("\n")
        }
        _ => text.clone(),
    };

    SourceUnit {
        kind: UnitKind::Function,
        name: Some(name),
        header_text,
        text,
        code_text,
        docstring,
        children: Vec::new(),
    }
}

/// Unwrap `decorated_definition` to the class or function it decorates
fn definition_of(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        if let Some(definition) = node.child_by_field_name("definition") {
            return definition;
        }
    }
    node
}

fn decorators(node: Node) -> Vec<Node> {
    if node.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut cursor = node.walk();
    let found: Vec<_> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "decorator")
        .collect();
    found
}

/// First body statement when it is a bare string literal
fn docstring_statement(definition: Node) -> Option<Node> {
    let body = definition.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;

    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let expr = first.named_child(0)?;
    matches!(expr.kind(), "string" | "concatenated_string").then_some(first)
}

fn docstring_text(content: &str, stmt: Node) -> Option<String> {
    let literal = stmt.named_child(0)?;
    let doc = clean_docstring(node_text(content, literal));
    (!doc.is_empty()).then_some(doc)
}

/// Strip quotes and common indentation from a docstring literal
pub fn clean_docstring(literal: &str) -> String {
    cleandoc(strip_quotes(literal))
}

fn strip_quotes(literal: &str) -> &str {
    let literal = literal.trim();
    let start = literal.find(['"', '\'']).unwrap_or(0);
    let quoted = &literal[start..];
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if quoted.len() >= 2 * quote.len() && quoted.starts_with(quote) && quoted.ends_with(quote) {
            return &quoted[quote.len()..quoted.len() - quote.len()];
        }
    }
    quoted
}

fn cleandoc(doc: &str) -> String {
    let expanded = doc.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };

    let margin = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first.trim_start()];
    cleaned.extend(
        rest.iter()
            .map(|line| line.get(margin..).unwrap_or_else(|| line.trim_start()).trim_end()),
    );

    while cleaned.last().is_some_and(|line| line.trim().is_empty()) {
        cleaned.pop();
    }
    let leading = cleaned.iter().take_while(|line| line.trim().is_empty()).count();
    cleaned[leading..].join("\n")
}

fn is_import(node: Node) -> bool {
    matches!(
        node.kind(),
        "import_statement" | "import_from_statement" | "future_import_statement"
    )
}

/// Imports at any depth: `import a.b` -> `a.b`, `from m import x` -> `m.x`.
/// Relative-import dots are dropped.
fn collect_imports(content: &str, node: Node, imports: &mut Vec<String>) {
    match node.kind() {
        "import_statement" => {
            for name in field_nodes(node, "name") {
                imports.push(import_target(content, name).to_string());
            }
        }
        "import_from_statement" | "future_import_statement" => {
            let module = if node.kind() == "future_import_statement" {
                "__future__"
            } else {
                node.child_by_field_name("module_name")
                    .map_or("", |module| module_path(content, module))
            };

            let names = field_nodes(node, "name");
            if names.is_empty() {
                let mut cursor = node.walk();
                if node
                    .named_children(&mut cursor)
                    .any(|child| child.kind() == "wildcard_import")
                {
                    imports.push(qualify(module, "*"));
                }
            }
            for name in names {
                imports.push(qualify(module, import_target(content, name)));
            }
        }
        _ => {
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            for child in children {
                collect_imports(content, child, imports);
            }
        }
    }
}

fn module_path<'a>(content: &'a str, module: Node) -> &'a str {
    if module.kind() != "relative_import" {
        return node_text(content, module);
    }
    let mut cursor = module.walk();
    let dotted = module
        .named_children(&mut cursor)
        .find(|child| child.kind() == "dotted_name");
    dotted.map_or("", |name| node_text(content, name))
}

fn import_target<'a>(content: &'a str, name: Node) -> &'a str {
    if name.kind() == "aliased_import" {
        if let Some(original) = name.child_by_field_name("name") {
            return node_text(content, original);
        }
    }
    node_text(content, name)
}

fn qualify(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{module}.{name}")
    }
}

fn field_nodes<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let nodes: Vec<_> = node.children_by_field_name(field, &mut cursor).collect();
    nodes
}

fn field_text<'a>(content: &'a str, node: Node, field: &str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|child| node_text(content, child))
}

fn node_text<'a>(content: &'a str, node: Node) -> &'a str {
    &content[node.start_byte()..node.end_byte()]
}

/// Full source lines spanned by `node`, indentation included
fn node_lines(lines: &[&str], node: Node) -> String {
    let start = node.start_position().row;
    let end = node.end_position().row.min(lines.len().saturating_sub(1));
    lines.get(start..=end).map(|rows| rows.join("\n")).unwrap_or_default()
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

/// Remove a leading comment block that carries license or copyright wording
pub fn strip_license_header<'a>(source: &'a str, comment: &str) -> &'a str {
    let mut offset = 0;
    let mut header_end = 0;

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
            continue;
        }
        if !trimmed.starts_with(comment) || trimmed.starts_with("#!") {
            break;
        }
        offset += line.len();
        header_end = offset;
    }

    if header_end > 0 && LICENSE_KEYWORDS.is_match(&source[..header_end]) {
        &source[header_end..]
    } else {
        source
    }
}
