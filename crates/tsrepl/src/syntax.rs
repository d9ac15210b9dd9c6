//! Parsing and printing through swc, and the constructs the engine refuses to run.
//!
//! Every entry point registers its text as an anonymous file in a private source map, so
//! spans can be turned back into byte offsets of that text with [`Source::offset`].

use std::{borrow::Cow, fmt, rc::Rc};

use serde::Serialize;
use swc_core::{
    common::{BytePos, FileName, SourceFile, SourceMap, Span, Spanned, sync::Lrc},
    ecma::{
        ast::{
            AutoAccessor, BigInt, Callee, Decorator, EsVersion, ForOfStmt, Function, MetaPropExpr, Module,
            ModuleItem, ObjectPatProp, Pat, PrivateName, Script, TsExportAssignment, TsImportEqualsDecl,
            TsModuleDecl, UsingDecl, WithStmt, YieldExpr,
        },
        codegen::{Config, Emitter, text_writer::JsWriter},
        parser::{EsSyntax, PResult, Syntax, TsSyntax, error::Error as SwcError, parse_file_as_module, parse_file_as_script},
        visit::{Visit, VisitWith},
    },
};

/// Maximum bracket nesting accepted by the parser.
///
/// The parser recurses on the native stack; the limit turns pathological inputs such as
/// thousands of nested brackets into a syntax error instead of a stack overflow.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// Debug builds have much larger stack frames, so the limit is lower.
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 64;

/// Source position of a diagnostic, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
    /// Byte offset into the source.
    pub offset: usize,
}

impl CodeLoc {
    /// Computes the line and column of a byte offset.
    #[must_use]
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1u32;
        let mut column = 1u32;
        for (i, c) in source.char_indices() {
            if i >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column, offset }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors produced while parsing source text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The input is not valid in the accepted grammar.
    Syntax { msg: Cow<'static, str>, loc: CodeLoc },
    /// The input uses a construct this engine deliberately does not implement.
    /// The message names the construct.
    NotSupported { msg: Cow<'static, str>, loc: CodeLoc },
}

impl ParseError {
    #[must_use]
    pub fn loc(&self) -> CodeLoc {
        match self {
            Self::Syntax { loc, .. } | Self::NotSupported { loc, .. } => *loc,
        }
    }

    /// The message without location information.
    #[must_use]
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Self::Syntax { msg, .. } => Cow::Borrowed(msg),
            Self::NotSupported { msg, .. } => Cow::Owned(format!("{msg} are not supported")),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} ({})", self.message(), self.loc())
    }
}

impl std::error::Error for ParseError {}

/// A text registered in its own source map.
pub(crate) struct Source {
    pub cm: Lrc<SourceMap>,
    pub file: Lrc<SourceFile>,
}

impl Source {
    pub fn new(text: &str) -> Self {
        let cm: Lrc<SourceMap> = Lrc::default();
        let file = cm.new_source_file(FileName::Anon.into(), text.to_owned());
        Self { cm, file }
    }

    pub fn text(&self) -> &str {
        &self.file.src
    }

    pub fn start_pos(&self) -> BytePos {
        self.file.start_pos
    }

    /// Byte offset of `pos` into the text.
    pub fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.file.start_pos.0) as usize
    }

    pub fn loc(&self, pos: BytePos) -> CodeLoc {
        CodeLoc::from_offset(self.text(), self.offset(pos))
    }

    /// Parses the text as a TypeScript module; top-level `await` is accepted.
    pub fn parse_module(&self) -> Result<Module, ParseError> {
        self.check_nesting()?;
        let syntax = Syntax::Typescript(TsSyntax {
            decorators: true,
            ..TsSyntax::default()
        });
        let mut recovered = Vec::new();
        let result = parse_file_as_module(&self.file, syntax, EsVersion::EsNext, None, &mut recovered);
        self.finish(result, &recovered)
    }

    /// Parses the text as a plain script in which `return` may appear at the top level.
    pub fn parse_script(&self) -> Result<Script, ParseError> {
        self.check_nesting()?;
        let syntax = Syntax::Es(EsSyntax {
            allow_return_outside_function: true,
            ..EsSyntax::default()
        });
        let mut recovered = Vec::new();
        let result = parse_file_as_script(&self.file, syntax, EsVersion::EsNext, None, &mut recovered);
        self.finish(result, &recovered)
    }

    /// Parses a fragment the rewriter generated into module items.
    pub fn parse_items(&self, text: &str) -> Result<Vec<ModuleItem>, ParseError> {
        let fragment = Self {
            cm: self.cm.clone(),
            file: self.cm.new_source_file(FileName::Anon.into(), text.to_owned()),
        };
        fragment.parse_module().map(|module| module.body)
    }

    fn finish<T>(&self, result: PResult<T>, recovered: &[SwcError]) -> Result<T, ParseError> {
        let node = result.map_err(|err| self.syntax_error(&err))?;
        match recovered.first() {
            Some(err) => Err(self.syntax_error(err)),
            None => Ok(node),
        }
    }

    fn syntax_error(&self, err: &SwcError) -> ParseError {
        ParseError::Syntax {
            msg: err.kind().msg(),
            loc: self.loc(err.span().lo),
        }
    }

    fn check_nesting(&self) -> Result<(), ParseError> {
        let mut depth = 0u16;
        for (offset, c) in self.text().char_indices() {
            match c {
                '(' | '[' | '{' => {
                    depth += 1;
                    if depth > MAX_NESTING_DEPTH {
                        return Err(ParseError::Syntax {
                            msg: Cow::Borrowed("Source is nested too deeply"),
                            loc: CodeLoc::from_offset(self.text(), offset),
                        });
                    }
                }
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        Ok(())
    }

    /// Prints `module` as JavaScript.
    pub fn emit(&self, module: &Module) -> String {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter {
                cfg: Config::default().with_target(EsVersion::EsNext),
                cm: self.cm.clone(),
                comments: None,
                wr: JsWriter::new(self.cm.clone(), "\n", &mut buf, None),
            };
            if let Err(err) = emitter.emit_module(module) {
                log::warn!("printing transformed code failed: {err}");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Returns the first construct in `module` that the engine does not implement.
pub(crate) fn check_supported(module: &Module, source: &Source) -> Result<(), ParseError> {
    let mut check = Unsupported { found: None };
    module.visit_with(&mut check);
    match check.found {
        Some((what, span)) => Err(ParseError::NotSupported {
            msg: Cow::Borrowed(what),
            loc: source.loc(span.lo),
        }),
        None => Ok(()),
    }
}

struct Unsupported {
    found: Option<(&'static str, Span)>,
}

impl Unsupported {
    fn report(&mut self, what: &'static str, span: Span) {
        if self.found.is_none() {
            self.found = Some((what, span));
        }
    }
}

impl Visit for Unsupported {
    fn visit_function(&mut self, n: &Function) {
        if n.is_generator {
            self.report("generator functions", n.span);
        }
        n.visit_children_with(self);
    }

    fn visit_yield_expr(&mut self, n: &YieldExpr) {
        self.report("'yield' expressions", n.span);
    }

    fn visit_private_name(&mut self, n: &PrivateName) {
        self.report("private names", n.span);
    }

    fn visit_decorator(&mut self, n: &Decorator) {
        self.report("decorators", n.span);
    }

    fn visit_with_stmt(&mut self, n: &WithStmt) {
        self.report("'with' statements", n.span);
    }

    fn visit_ts_module_decl(&mut self, n: &TsModuleDecl) {
        if !n.declare {
            self.report("namespace declarations", n.span);
        }
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        if n.is_await {
            self.report("'for await' loops", n.span);
        }
        n.visit_children_with(self);
    }

    fn visit_meta_prop_expr(&mut self, n: &MetaPropExpr) {
        self.report("meta properties such as 'new.target'", n.span);
    }

    fn visit_callee(&mut self, n: &Callee) {
        if let Callee::Import(import) = n {
            self.report("dynamic imports", import.span);
        }
        n.visit_children_with(self);
    }

    fn visit_using_decl(&mut self, n: &UsingDecl) {
        self.report("'using' declarations", n.span);
    }

    fn visit_ts_import_equals_decl(&mut self, n: &TsImportEqualsDecl) {
        self.report("'import =' aliases", n.span);
    }

    fn visit_ts_export_assignment(&mut self, n: &TsExportAssignment) {
        self.report("'export =' assignments", n.span);
    }

    fn visit_auto_accessor(&mut self, n: &AutoAccessor) {
        self.report("auto-accessor fields", n.span);
    }

    fn visit_big_int(&mut self, n: &BigInt) {
        self.report("BigInt literals", n.span);
    }
}

/// Pushes every name a binding pattern introduces.
pub(crate) fn bound_names(pat: &Pat, out: &mut Vec<Rc<str>>) {
    match pat {
        Pat::Ident(ident) => out.push(Rc::from(&*ident.id.sym)),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                bound_names(elem, out);
            }
        }
        Pat::Rest(rest) => bound_names(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(prop) => bound_names(&prop.value, out),
                    ObjectPatProp::Assign(prop) => out.push(Rc::from(&*prop.key.id.sym)),
                    ObjectPatProp::Rest(rest) => bound_names(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => bound_names(&assign.left, out),
        _ => {}
    }
}

/// True for names usable after a `.` without quoting.
pub(crate) fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Double-quoted JavaScript string literal for `value`.
pub(crate) fn quote_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(source: &str) -> ParseError {
        let source = Source::new(source);
        match source.parse_module().and_then(|module| check_supported(&module, &source)) {
            Ok(()) => panic!("expected a parse error"),
            Err(err) => err,
        }
    }

    #[test]
    fn unsupported_constructs_are_named() {
        let err = parse_err("function* g() {}");
        assert_eq!(err.message(), "generator functions are not supported");
        let err = parse_err("namespace N { }");
        assert!(matches!(err, ParseError::NotSupported { .. }));
        assert!(parse_err("class A { #x = 1 }").message().contains("private names"));
    }

    #[test]
    fn error_location_is_line_and_column() {
        let err = parse_err("let a = 1;\nlet b = ;");
        assert_eq!(err.loc().line, 2);
        assert!(err.to_string().starts_with("SyntaxError: "), "{err}");
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let source = format!("{}1{}", "[".repeat(5000), "]".repeat(5000));
        let err = parse_err(&source);
        assert_eq!(err.message(), "Source is nested too deeply");
    }

    #[test]
    fn scripts_accept_top_level_return() {
        assert!(Source::new("return 1").parse_script().is_ok());
        assert!(Source::new("return 1").parse_module().is_err());
    }

    #[test]
    fn declared_namespaces_are_left_to_type_erasure() {
        let source = Source::new("declare namespace N { const x: number }");
        let module = source.parse_module();
        assert!(module.is_ok_and(|module| check_supported(&module, &source).is_ok()));
    }
}
