//! Evaluation-safe rewriting of source fragments.
//!
//! Three entry points share the swc parser and printer:
//!
//! - [`transform`] produces code for a REPL namespace: top-level declarations become
//!   redeclarable, imports become `require` bindings followed by an echo of every
//!   imported name, exports become getters on `exports`, and fragments containing a
//!   top-level `await` are wrapped in an async arrow whose promise the evaluator awaits.
//! - [`transform_module`] is used for files loaded through `require`: imports and
//!   exports are rewritten the same way but declarations keep their kinds.
//! - [`transform_regular`] only erases type syntax.

use std::{borrow::Cow, fmt, mem, rc::Rc};

use ahash::AHashSet;
use serde::Serialize;
use swc_core::{
    common::{DUMMY_SP, GLOBALS, Globals, Mark},
    ecma::{
        ast::*,
        transforms::{base::resolver, typescript::strip},
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};

use crate::syntax::{CodeLoc, ParseError, Source, bound_names, check_supported, is_identifier_name, quote_str};

/// Result of transforming a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    /// True if the code was wrapped for top-level `await`; evaluating it yields a promise.
    pub is_async: bool,
    /// Never produced; kept so protocol consumers see a stable shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
}

/// Failure to transform a fragment. Nothing is executed when this is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    Parse(ParseError),
}

impl TransformError {
    #[must_use]
    pub fn loc(&self) -> CodeLoc {
        match self {
            Self::Parse(err) => err.loc(),
        }
    }

    /// The message without location information.
    #[must_use]
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Self::Parse(err) => err.message(),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<ParseError> for TransformError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

/// Rewrites a fragment for evaluation in a REPL namespace.
pub fn transform(source: &str) -> Result<TransformOutput, TransformError> {
    let output = run(source, Some(Mode::Repl))?;
    log::debug!(
        "transformed fragment: {} bytes in, {} bytes out, async: {}",
        source.len(),
        output.code.len(),
        output.is_async
    );
    Ok(output)
}

/// Rewrites a file loaded through `require` into a CommonJS-style module body.
pub fn transform_module(source: &str) -> Result<TransformOutput, TransformError> {
    run(source, Some(Mode::Module))
}

/// Erases type syntax only.
pub fn transform_regular(source: &str) -> Result<TransformOutput, TransformError> {
    run(source, None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Repl,
    Module,
}

fn run(text: &str, mode: Option<Mode>) -> Result<TransformOutput, TransformError> {
    let source = Source::new(text);
    let mut module = source.parse_module()?;
    check_supported(&module, &source)?;
    let wrap_async = mode == Some(Mode::Repl) && has_top_level_await(&module);

    GLOBALS.set(&Globals::new(), || -> Result<TransformOutput, TransformError> {
        if let Some(mode) = mode {
            let mut rewriter = Rewriter::new(&source, mode, &module);
            rewriter.rewrite(&mut module)?;
        }

        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        let mut program = Program::Module(module);
        program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, true));
        program.visit_mut_with(&mut strip(unresolved_mark, top_level_mark));
        program.visit_mut_with(&mut DoubleQuoted);
        let mut module = match program {
            Program::Module(module) => module,
            Program::Script(script) => Module {
                span: script.span,
                body: script.body.into_iter().map(ModuleItem::Stmt).collect(),
                shebang: script.shebang,
            },
        };

        if mode.is_some() {
            module
                .body
                .retain(|item| !matches!(item, ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) if named.specifiers.is_empty() && named.src.is_none()));
        }
        if wrap_async {
            wrap_top_level_await(&source, &mut module)?;
        }
        Ok(TransformOutput {
            code: source.emit(&module),
            is_async: wrap_async,
            source_map: None,
        })
    })
}

/// Prints every string literal with double quotes.
struct DoubleQuoted;

impl VisitMut for DoubleQuoted {
    fn visit_mut_str(&mut self, n: &mut Str) {
        n.raw = None;
    }
}

/// One live export: the exported name and the expression its getter returns.
struct ExportBinding {
    exported: Rc<str>,
    getter_expr: String,
}

struct Rewriter<'a> {
    source: &'a Source,
    mode: Mode,
    /// Every identifier appearing in the fragment, plus names handed out by [`Self::fresh`].
    used: AHashSet<String>,
    exports: Vec<ExportBinding>,
    has_export_syntax: bool,
    export_star_helper: Option<Rc<str>>,
    interop_helper: Option<Rc<str>>,
}

struct UsedNames<'a>(&'a mut AHashSet<String>);

impl Visit for UsedNames<'_> {
    fn visit_ident(&mut self, n: &Ident) {
        self.0.insert(n.sym.to_string());
    }

    fn visit_ident_name(&mut self, n: &IdentName) {
        self.0.insert(n.sym.to_string());
    }
}

impl<'a> Rewriter<'a> {
    fn new(source: &'a Source, mode: Mode, module: &Module) -> Self {
        let mut used = AHashSet::new();
        module.visit_with(&mut UsedNames(&mut used));
        Self {
            source,
            mode,
            used,
            exports: Vec::new(),
            has_export_syntax: false,
            export_star_helper: None,
            interop_helper: None,
        }
    }

    /// Returns `base`, or the first of `base1`, `base2`, ... not used by the fragment.
    fn fresh(&mut self, base: &str) -> Rc<str> {
        let mut candidate = base.to_owned();
        let mut n = 1;
        while self.used.contains(&candidate) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate.into()
    }

    fn rewrite(&mut self, module: &mut Module) -> Result<(), ParseError> {
        let mut body = mem::take(&mut module.body).into_iter().peekable();
        if body.peek().is_some_and(is_use_strict) {
            body.next();
        }
        let mut items = Vec::new();
        for item in body {
            match item {
                ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) => self.import(&decl, &mut items)?,
                ModuleItem::ModuleDecl(decl) => {
                    self.has_export_syntax = true;
                    self.export(decl, &mut items)?;
                }
                ModuleItem::Stmt(stmt) => items.push(ModuleItem::Stmt(self.redeclarable(stmt))),
            }
        }
        module.body = self.export_prelude()?;
        module.body.extend(items);
        Ok(())
    }

    /// Rewrites a top-level declaration so that evaluating it again does not fail.
    fn redeclarable(&self, stmt: Stmt) -> Stmt {
        if self.mode != Mode::Repl {
            return stmt;
        }
        match stmt {
            Stmt::Decl(Decl::Var(mut decl)) if !decl.declare => {
                decl.kind = VarDeclKind::Var;
                Stmt::Decl(Decl::Var(decl))
            }
            Stmt::Decl(Decl::Class(ClassDecl {
                ident,
                declare: false,
                class,
            })) => var_stmt(
                ident.clone(),
                Box::new(Expr::Class(ClassExpr {
                    ident: Some(ident),
                    class,
                })),
            ),
            stmt => stmt,
        }
    }

    fn import(&mut self, decl: &ImportDecl, out: &mut Vec<ModuleItem>) -> Result<(), ParseError> {
        if decl.type_only {
            return Ok(());
        }
        let require = format!("require({})", quote_str(&decl.src.value));
        if decl.specifiers.is_empty() {
            out.extend(self.source.parse_items(&format!("{require};"))?);
            return Ok(());
        }

        let mut declarators = Vec::new();
        let mut named = Vec::new();
        let mut source_expr = require;
        let mut echoes = Vec::new();
        for spec in &decl.specifiers {
            match spec {
                ImportSpecifier::Default(spec) => {
                    let helper = self.interop_helper();
                    declarators.push(format!("{} = {helper}({source_expr})", spec.local.sym));
                    echoes.push(spec.local.clone());
                }
                ImportSpecifier::Namespace(spec) => {
                    let local = spec.local.sym.to_string();
                    declarators.push(format!("{local} = {source_expr}"));
                    source_expr = local;
                    echoes.push(spec.local.clone());
                }
                ImportSpecifier::Named(spec) if !spec.is_type_only => {
                    let local = &spec.local.sym;
                    let imported = spec.imported.as_ref().map_or_else(|| local.to_string(), export_name);
                    if imported == **local {
                        named.push(imported);
                    } else if is_identifier_name(&imported) {
                        named.push(format!("{imported}: {local}"));
                    } else {
                        named.push(format!("{}: {local}", quote_str(&imported)));
                    }
                    echoes.push(spec.local.clone());
                }
                ImportSpecifier::Named(_) => {}
            }
        }
        if !named.is_empty() {
            declarators.push(format!("{{ {} }} = {source_expr}", named.join(", ")));
        }
        if declarators.is_empty() {
            return Ok(());
        }
        out.extend(self.source.parse_items(&format!("var {};", declarators.join(", ")))?);
        if self.mode == Mode::Repl {
            for local in echoes {
                out.push(ModuleItem::Stmt(Stmt::Expr(ExprStmt {
                    span: DUMMY_SP,
                    expr: Box::new(Expr::Ident(local)),
                })));
            }
        }
        Ok(())
    }

    fn export_binding(&mut self, exported: impl Into<Rc<str>>, getter_expr: impl Into<String>) {
        self.exports.push(ExportBinding {
            exported: exported.into(),
            getter_expr: getter_expr.into(),
        });
    }

    fn export(&mut self, decl: ModuleDecl, out: &mut Vec<ModuleItem>) -> Result<(), ParseError> {
        match decl {
            ModuleDecl::ExportDecl(ExportDecl { decl, .. }) => {
                for name in declared_names(&decl) {
                    self.export_binding(name.clone(), &*name);
                }
                out.push(ModuleItem::Stmt(self.redeclarable(Stmt::Decl(decl))));
            }
            ModuleDecl::ExportDefaultExpr(ExportDefaultExpr { expr, .. }) => {
                let name = self.fresh("_default");
                out.push(ModuleItem::Stmt(var_stmt(Ident::new_no_ctxt((&*name).into(), DUMMY_SP), expr)));
                self.export_binding("default", &*name);
            }
            ModuleDecl::ExportDefaultDecl(ExportDefaultDecl { decl, .. }) => match decl {
                DefaultDecl::Fn(FnExpr { ident, function }) => {
                    let ident = match ident {
                        Some(ident) => ident,
                        None => Ident::new_no_ctxt((&*self.fresh("_default")).into(), DUMMY_SP),
                    };
                    self.export_binding("default", &*ident.sym);
                    out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
                        ident,
                        declare: false,
                        function,
                    }))));
                }
                DefaultDecl::Class(ClassExpr { ident, class }) => {
                    let name = match &ident {
                        Some(ident) => ident.clone(),
                        None => Ident::new_no_ctxt((&*self.fresh("_default")).into(), DUMMY_SP),
                    };
                    self.export_binding("default", &*name.sym);
                    out.push(ModuleItem::Stmt(var_stmt(name, Box::new(Expr::Class(ClassExpr { ident, class })))));
                }
                DefaultDecl::TsInterfaceDecl(_) => {}
            },
            ModuleDecl::ExportNamed(named) if named.type_only => {}
            ModuleDecl::ExportNamed(NamedExport {
                specifiers, src: None, ..
            }) => {
                for spec in specifiers {
                    if let ExportSpecifier::Named(spec) = spec {
                        if spec.is_type_only {
                            continue;
                        }
                        let local = export_name(&spec.orig);
                        let exported = spec.exported.as_ref().map_or_else(|| local.clone(), export_name);
                        self.export_binding(exported, local);
                    }
                }
            }
            ModuleDecl::ExportNamed(NamedExport {
                specifiers,
                src: Some(src),
                ..
            }) => {
                let temp = self.fresh("_reexport");
                out.extend(
                    self.source
                        .parse_items(&format!("var {temp} = require({});", quote_str(&src.value)))?,
                );
                for spec in specifiers {
                    match spec {
                        ExportSpecifier::Named(spec) if !spec.is_type_only => {
                            let local = export_name(&spec.orig);
                            let exported = spec.exported.as_ref().map_or_else(|| local.clone(), export_name);
                            self.export_binding(exported, format!("{temp}{}", member_access(&local)));
                        }
                        ExportSpecifier::Namespace(spec) => self.export_binding(export_name(&spec.name), &*temp),
                        ExportSpecifier::Default(spec) => {
                            self.export_binding(&*spec.exported.sym, format!("{temp}.default"));
                        }
                        ExportSpecifier::Named(_) => {}
                    }
                }
            }
            ModuleDecl::ExportAll(all) if all.type_only => {}
            ModuleDecl::ExportAll(all) => {
                let helper = match &self.export_star_helper {
                    Some(helper) => helper.clone(),
                    None => {
                        let helper = self.fresh("_exportStar");
                        self.export_star_helper = Some(helper.clone());
                        helper
                    }
                };
                out.extend(
                    self.source
                        .parse_items(&format!("{helper}(require({}), exports);", quote_str(&all.src.value)))?,
                );
            }
            // rejected before rewriting, or type-only
            ModuleDecl::Import(_)
            | ModuleDecl::TsImportEquals(_)
            | ModuleDecl::TsExportAssignment(_)
            | ModuleDecl::TsNamespaceExport(_) => {}
        }
        Ok(())
    }

    /// Name of the helper picking `default` out of ES modules and passing CommonJS
    /// exports through unchanged.
    fn interop_helper(&mut self) -> Rc<str> {
        if let Some(helper) = &self.interop_helper {
            return helper.clone();
        }
        let helper = self.fresh("_interopDefault");
        self.interop_helper = Some(helper.clone());
        helper
    }

    /// Items installing helpers, `__esModule` and export getters.
    ///
    /// Each installation is a `void` expression so a fragment consisting only of
    /// declarations still completes with `undefined`.
    fn export_prelude(&mut self) -> Result<Vec<ModuleItem>, ParseError> {
        let mut src = String::new();
        if let Some(helper) = &self.interop_helper {
            src.push_str(&format!(
                "function {helper}(m) {{\n    return m && m.__esModule ? m.default : m;\n}}\n"
            ));
        }
        if !self.has_export_syntax {
            return if src.is_empty() {
                Ok(Vec::new())
            } else {
                self.source.parse_items(&src)
            };
        }
        src.push_str("void Object.defineProperty(exports, \"__esModule\", { value: true, configurable: true });\n");
        if let Some(helper) = &self.export_star_helper {
            src.push_str(&format!(
                concat!(
                    "function {h}(from, to) {{\n",
                    "    Object.keys(from).forEach(function (key) {{\n",
                    "        if (key === \"default\" || key === \"__esModule\" || Object.prototype.hasOwnProperty.call(to, key)) return;\n",
                    "        Object.defineProperty(to, key, {{ enumerable: true, configurable: true, get: function () {{ return from[key]; }} }});\n",
                    "    }});\n",
                    "    return from;\n",
                    "}}\n",
                ),
                h = helper
            ));
        }
        match self.exports.as_slice() {
            [] => {}
            [single] => src.push_str(&format!(
                "void Object.defineProperty(exports, {}, {{ enumerable: true, configurable: true, get: function () {{ return {}; }} }});\n",
                quote_str(&single.exported),
                single.getter_expr
            )),
            many => {
                let entries = many
                    .iter()
                    .map(|binding| {
                        format!(
                            "{}: function () {{ return {}; }}",
                            quote_str(&binding.exported),
                            binding.getter_expr
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let helper = self.fresh("_export");
                src.push_str(&format!(
                    concat!(
                        "function {h}(target, all) {{\n",
                        "    for (var name in all) Object.defineProperty(target, name, {{ enumerable: true, configurable: true, get: all[name] }});\n",
                        "}}\n",
                        "void {h}(exports, {{ {entries} }});\n",
                    ),
                    h = helper,
                    entries = entries
                ));
            }
        }
        self.source.parse_items(&src)
    }
}

fn is_use_strict(item: &ModuleItem) -> bool {
    matches!(
        item,
        ModuleItem::Stmt(Stmt::Expr(ExprStmt { expr, .. }))
            if matches!(&**expr, Expr::Lit(Lit::Str(s)) if &*s.value == "use strict")
    )
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

fn member_access(name: &str) -> String {
    if is_identifier_name(name) {
        format!(".{name}")
    } else {
        format!("[{}]", quote_str(name))
    }
}

fn var_stmt(name: Ident, init: Box<Expr>) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        kind: VarDeclKind::Var,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent::from(name)),
            init: Some(init),
            definite: false,
        }],
        ..VarDecl::default()
    })))
}

/// Names bound at the top level by an exported declaration. Ambient and type-only
/// declarations bind nothing at runtime.
fn declared_names(decl: &Decl) -> Vec<Rc<str>> {
    let mut names = Vec::new();
    match decl {
        Decl::Var(var) if !var.declare => {
            for declarator in &var.decls {
                bound_names(&declarator.name, &mut names);
            }
        }
        Decl::Fn(func) if !func.declare => names.push(Rc::from(&*func.ident.sym)),
        Decl::Class(class) if !class.declare => names.push(Rc::from(&*class.ident.sym)),
        Decl::TsEnum(decl) if !decl.declare => names.push(Rc::from(&*decl.id.sym)),
        _ => {}
    }
    names
}

/// Finds an `await` outside any function body.
struct TopLevelAwait(bool);

impl Visit for TopLevelAwait {
    fn visit_await_expr(&mut self, _: &AwaitExpr) {
        self.0 = true;
    }

    fn visit_function(&mut self, _: &Function) {}
    fn visit_arrow_expr(&mut self, _: &ArrowExpr) {}
    fn visit_getter_prop(&mut self, _: &GetterProp) {}
    fn visit_setter_prop(&mut self, _: &SetterProp) {}
    fn visit_class(&mut self, _: &Class) {}
}

fn has_top_level_await(module: &Module) -> bool {
    let mut finder = TopLevelAwait(false);
    module.visit_with(&mut finder);
    finder.0
}

fn push_unique(list: &mut Vec<Rc<str>>, name: Rc<str>) {
    if !list.contains(&name) {
        list.push(name);
    }
}

fn assign_target(pat: Pat) -> Result<AssignTarget, Pat> {
    match pat {
        Pat::Ident(ident) => Ok(AssignTarget::Simple(SimpleAssignTarget::Ident(ident))),
        Pat::Object(object) => Ok(AssignTarget::Pat(AssignTargetPat::Object(object))),
        Pat::Array(array) => Ok(AssignTarget::Pat(AssignTargetPat::Array(array))),
        other => Err(other),
    }
}

fn assign(left: AssignTarget, right: Box<Expr>) -> Box<Expr> {
    Box::new(Expr::Paren(ParenExpr {
        span: DUMMY_SP,
        expr: Box::new(Expr::Assign(AssignExpr {
            span: DUMMY_SP,
            op: AssignOp::Assign,
            left,
            right,
        })),
    }))
}

/// Moves the fragment into an immediately-invoked async arrow.
///
/// Top-level names are pre-declared with one `var` outside the wrapper so they stay
/// visible to later evaluations; declarations inside become assignments.
fn wrap_top_level_await(source: &Source, module: &mut Module) -> Result<(), ParseError> {
    let mut predeclared: Vec<Rc<str>> = Vec::new();
    let mut function_assignments = Vec::new();
    let mut inner = Vec::new();
    let items = mem::take(&mut module.body);
    let last_index = items.len().saturating_sub(1);

    for (index, item) in items.into_iter().enumerate() {
        let stmt = match item {
            ModuleItem::Stmt(stmt) => stmt,
            // module declarations were rewritten earlier
            ModuleItem::ModuleDecl(_) => continue,
        };
        match stmt {
            Stmt::Decl(Decl::Var(decl)) => {
                let span = decl.span;
                let mut assignments = Vec::new();
                for declarator in decl.decls {
                    let mut names = Vec::new();
                    bound_names(&declarator.name, &mut names);
                    for name in names {
                        push_unique(&mut predeclared, name);
                    }
                    if let Some(init) = declarator.init {
                        match assign_target(declarator.name) {
                            Ok(target) => assignments.push(assign(target, init)),
                            Err(name) => log::debug!("cannot hoist declarator {name:?}"),
                        }
                    }
                }
                let expr = match assignments.len() {
                    0 => continue,
                    1 => assignments.remove(0),
                    _ => Box::new(Expr::Seq(SeqExpr {
                        span,
                        exprs: assignments,
                    })),
                };
                inner.push(Stmt::Expr(ExprStmt { span, expr }));
            }
            Stmt::Decl(Decl::Fn(FnDecl { ident, function, .. })) => {
                push_unique(&mut predeclared, Rc::from(&*ident.sym));
                let target = AssignTarget::Simple(SimpleAssignTarget::Ident(BindingIdent::from(ident.clone())));
                let value = Box::new(Expr::Fn(FnExpr {
                    ident: Some(ident),
                    function,
                }));
                function_assignments.push(Stmt::Expr(ExprStmt {
                    span: DUMMY_SP,
                    expr: assign(target, value),
                }));
            }
            Stmt::Expr(ExprStmt { span, expr }) if index == last_index && matches!(expr.unwrap_parens(), Expr::Await(_)) => {
                inner.push(Stmt::Return(ReturnStmt { span, arg: Some(expr) }));
            }
            stmt => inner.push(stmt),
        }
    }

    let mut body = function_assignments;
    body.extend(inner);
    let mut wrapper = source.parse_items("(async () => {})();")?;
    if let Some(stmts) = wrapper.first_mut().and_then(arrow_body) {
        *stmts = body;
    }

    if !predeclared.is_empty() {
        module
            .body
            .extend(source.parse_items(&format!("var {};", predeclared.join(", ")))?);
    }
    module.body.extend(wrapper);
    Ok(())
}

/// The statements of the arrow in `(async () => { ... })();`.
fn arrow_body(item: &mut ModuleItem) -> Option<&mut Vec<Stmt>> {
    let ModuleItem::Stmt(Stmt::Expr(ExprStmt { expr, .. })) = item else {
        return None;
    };
    let Expr::Call(CallExpr {
        callee: Callee::Expr(callee),
        ..
    }) = &mut **expr
    else {
        return None;
    };
    let Expr::Paren(ParenExpr { expr: arrow, .. }) = &mut **callee else {
        return None;
    };
    let Expr::Arrow(ArrowExpr { body, .. }) = &mut **arrow else {
        return None;
    };
    match &mut **body {
        BlockStmtOrExpr::BlockStmt(block) => Some(&mut block.stmts),
        BlockStmtOrExpr::Expr(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(source: &str) -> String {
        match transform(source) {
            Ok(output) => output.code,
            Err(err) => panic!("transform of {source:?} failed: {err}"),
        }
    }

    #[test]
    fn enums_survive_redeclaration() {
        let out = code("enum Color { Red, Green }\nColor.Green");
        assert!(!out.contains("enum"), "{out}");
        assert!(out.contains("Color"), "{out}");
    }

    #[test]
    fn quoted_import_names_stay_quoted() {
        let out = code("import { 'a-b' as ab } from 'm';");
        assert!(out.contains("\"a-b\": ab"), "{out}");
    }

    #[test]
    fn awaited_function_declarations_are_assigned_first() {
        let out = code("await 1;\nfunction f() { return 2; }");
        let assigned = out.find("f = function f").unwrap_or(usize::MAX);
        let awaited = out.find("await 1").unwrap_or(0);
        assert!(assigned < awaited, "{out}");
    }

    #[test]
    fn destructuring_under_await_becomes_assignment() {
        let out = code("const { a, b } = await Promise.resolve({ a: 1, b: 2 });");
        assert!(out.contains("var a, b"), "{out}");
        assert!(!out.contains("const"), "{out}");
    }

    #[test]
    fn reexports_read_through_a_temporary() {
        let out = code("export { x as y } from './m';");
        assert!(out.contains("var _reexport = require(\"./m\")"), "{out}");
        assert!(out.contains("_reexport.x"), "{out}");
    }
}
