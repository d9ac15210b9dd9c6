//! Statement execution and expression evaluation over the syntax tree.
//!
//! Control flow travels as [`Flow`]; exceptions travel as `Err(Throw)`. Hot match arms
//! delegate to small helpers so deep JavaScript recursion keeps Rust frames small.

use std::{cell::RefCell, rc::Rc};

use swc_core::{
    common::Spanned,
    ecma::ast::{
        ArrayLit, ArrayPat, AssignExpr, AssignOp, AssignTarget, AssignTargetPat, BinaryOp, Callee,
        Class, ClassMember, Decl, Expr, ExprOrSpread, ForHead, ForStmt, Lit, MemberExpr, MemberProp, MethodKind, ObjectLit,
        ObjectPat, ObjectPatProp, OptChainBase, OptChainExpr, Pat, Prop, PropName, PropOrSpread, SimpleAssignTarget,
        Stmt, SuperProp, SwitchStmt, Tpl, TryStmt, UnaryOp, UpdateOp, VarDecl, VarDeclKind, VarDeclOrExpr,
    },
};

use super::{
    Interp, JsResult, Throw,
    code::{CodeBody, FunctionCode, FunctionNode},
    convert::{Hint, number_to_string, to_int32, to_uint32},
    function::{ClassCtor, FieldDef},
    object::{Class as ObjClass, JsObject, ObjRef, Property, Slot},
    regexp,
    scope::{BindingValue, BindingWrite, FunctionFrame, Scope, ScopeKind, ScopeRef},
    value::Value,
};
use crate::syntax::bound_names;

/// Completion of a statement that did not throw.
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break(Option<Rc<str>>),
    Continue(Option<Rc<str>>),
}

/// How a pattern introduces or updates its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    Var,
    Let,
    Const,
    Assign,
}

impl From<VarDeclKind> for BindMode {
    fn from(kind: VarDeclKind) -> Self {
        match kind {
            VarDeclKind::Var => Self::Var,
            VarDeclKind::Let => Self::Let,
            VarDeclKind::Const => Self::Const,
        }
    }
}

/// What a loop does after running its body once.
enum LoopStep {
    Next,
    Exit,
    Propagate(Flow),
}

fn loop_step(flow: Flow, labels: &[Rc<str>]) -> LoopStep {
    match flow {
        Flow::Normal | Flow::Continue(None) => LoopStep::Next,
        Flow::Break(None) => LoopStep::Exit,
        Flow::Continue(Some(label)) if labels.contains(&label) => LoopStep::Next,
        Flow::Break(Some(label)) if labels.contains(&label) => LoopStep::Exit,
        other => LoopStep::Propagate(other),
    }
}

/// A storage location an assignment writes to.
enum Place<'a> {
    Name(&'a str),
    Property { target: Value, key: Rc<str> },
}

fn declared_names(decl: &VarDecl) -> Vec<Rc<str>> {
    let mut names = Vec::new();
    for declarator in &decl.decls {
        bound_names(&declarator.name, &mut names);
    }
    names
}

fn push_var_names(decl: &VarDecl, out: &mut Vec<Rc<str>>) {
    if decl.kind == VarDeclKind::Var {
        out.extend(declared_names(decl));
    }
}

/// Names declared with `var` anywhere in `stmts`, not descending into functions.
fn collect_var_names(stmts: &[Stmt], out: &mut Vec<Rc<str>>) {
    for stmt in stmts {
        match stmt {
            Stmt::Decl(Decl::Var(decl)) => push_var_names(decl, out),
            Stmt::If(stmt) => {
                collect_var_names(std::slice::from_ref(&*stmt.cons), out);
                if let Some(alt) = &stmt.alt {
                    collect_var_names(std::slice::from_ref(&**alt), out);
                }
            }
            Stmt::Block(block) => collect_var_names(&block.stmts, out),
            Stmt::For(stmt) => {
                if let Some(VarDeclOrExpr::VarDecl(decl)) = &stmt.init {
                    push_var_names(decl, out);
                }
                collect_var_names(std::slice::from_ref(&*stmt.body), out);
            }
            Stmt::ForIn(stmt) => {
                if let ForHead::VarDecl(decl) = &stmt.left {
                    push_var_names(decl, out);
                }
                collect_var_names(std::slice::from_ref(&*stmt.body), out);
            }
            Stmt::ForOf(stmt) => {
                if let ForHead::VarDecl(decl) = &stmt.left {
                    push_var_names(decl, out);
                }
                collect_var_names(std::slice::from_ref(&*stmt.body), out);
            }
            Stmt::While(stmt) => collect_var_names(std::slice::from_ref(&*stmt.body), out),
            Stmt::DoWhile(stmt) => collect_var_names(std::slice::from_ref(&*stmt.body), out),
            Stmt::Labeled(stmt) => collect_var_names(std::slice::from_ref(&*stmt.body), out),
            Stmt::Try(stmt) => {
                collect_var_names(&stmt.block.stmts, out);
                if let Some(handler) = &stmt.handler {
                    collect_var_names(&handler.body.stmts, out);
                }
                if let Some(finalizer) = &stmt.finalizer {
                    collect_var_names(&finalizer.stmts, out);
                }
            }
            Stmt::Switch(stmt) => {
                for case in &stmt.cases {
                    collect_var_names(&case.cons, out);
                }
            }
            _ => {}
        }
    }
}

impl Interp {
    /// Runs a function or script body: hoists `var` names, then runs it as a block.
    pub(crate) fn run_statements(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> JsResult<Flow> {
        let mut names = Vec::new();
        collect_var_names(stmts, &mut names);
        let var_scope = scope.var_scope();
        for name in &names {
            match var_scope.global_object() {
                Some(global) => {
                    if !global.borrow().has_own(name) {
                        global.define(name, Property::data(Value::Undefined));
                    }
                }
                None => var_scope.declare_var(name),
            }
        }
        self.run_block(stmts, scope)
    }

    /// Hoists lexical declarations and function declarations of one statement list,
    /// then executes it.
    fn run_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> JsResult<Flow> {
        self.hoist_lexical(stmts, scope);
        for stmt in stmts {
            match self.exec_stmt(stmt, scope, &[])? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    fn hoist_lexical(&mut self, stmts: &[Stmt], scope: &ScopeRef) {
        let global = scope.global_object().cloned();
        for stmt in stmts {
            match stmt {
                Stmt::Decl(Decl::Fn(decl)) => {
                    let name: Rc<str> = Rc::from(&*decl.ident.sym);
                    let closure = self.make_closure(FunctionNode::Function(&decl.function), &name, scope, None);
                    match &global {
                        Some(global) => {
                            global.define(&name, Property::data(Value::Object(closure)));
                        }
                        None => scope.declare(name, Value::Object(closure), true),
                    }
                }
                Stmt::Decl(Decl::Var(decl)) if decl.kind != VarDeclKind::Var && global.is_none() => {
                    for name in declared_names(decl) {
                        scope.declare_uninitialized(name, decl.kind == VarDeclKind::Let);
                    }
                }
                Stmt::Decl(Decl::Class(decl)) if global.is_none() => {
                    scope.declare_uninitialized(Rc::from(&*decl.ident.sym), true);
                }
                _ => {}
            }
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef, labels: &[Rc<str>]) -> JsResult<Flow> {
        match stmt {
            Stmt::Expr(stmt) => {
                self.completion = self.eval_expr(&stmt.expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl(Decl::Var(decl)) => {
                self.exec_var_decl(decl, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl(Decl::Class(decl)) => {
                let value = self.eval_class(&decl.class, &decl.ident.sym, scope)?;
                self.bind_name(&decl.ident.sym, value, scope, BindMode::Let)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl(Decl::Fn(_)) | Stmt::Empty(_) | Stmt::Debugger(_) => Ok(Flow::Normal),
            Stmt::Decl(_) => Err(self.syntax_error("Unexpected declaration")),
            Stmt::Return(stmt) => {
                let value = match &stmt.arg {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If(stmt) => {
                let test = self.eval_expr(&stmt.test, scope)?;
                if Self::to_boolean(&test) {
                    self.exec_stmt(&stmt.cons, scope, &[])
                } else if let Some(alt) = &stmt.alt {
                    self.exec_stmt(alt, scope, &[])
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(block) => {
                let inner = Scope::block(scope);
                self.run_block(&block.stmts, &inner)
            }
            Stmt::For(stmt) => self.exec_for(stmt, scope, labels),
            Stmt::ForIn(stmt) => self.exec_for_in(&stmt.left, &stmt.right, &stmt.body, scope, labels),
            Stmt::ForOf(stmt) => self.exec_for_of(&stmt.left, &stmt.right, &stmt.body, scope, labels),
            Stmt::While(stmt) => loop {
                let test = self.eval_expr(&stmt.test, scope)?;
                if !Self::to_boolean(&test) {
                    return Ok(Flow::Normal);
                }
                match loop_step(self.exec_stmt(&stmt.body, scope, &[])?, labels) {
                    LoopStep::Next => {}
                    LoopStep::Exit => return Ok(Flow::Normal),
                    LoopStep::Propagate(flow) => return Ok(flow),
                }
            },
            Stmt::DoWhile(stmt) => loop {
                match loop_step(self.exec_stmt(&stmt.body, scope, &[])?, labels) {
                    LoopStep::Next => {}
                    LoopStep::Exit => return Ok(Flow::Normal),
                    LoopStep::Propagate(flow) => return Ok(flow),
                }
                let test = self.eval_expr(&stmt.test, scope)?;
                if !Self::to_boolean(&test) {
                    return Ok(Flow::Normal);
                }
            },
            Stmt::Break(stmt) => Ok(Flow::Break(stmt.label.as_ref().map(|l| Rc::from(&*l.sym)))),
            Stmt::Continue(stmt) => Ok(Flow::Continue(stmt.label.as_ref().map(|l| Rc::from(&*l.sym)))),
            Stmt::Throw(stmt) => {
                let value = self.eval_expr(&stmt.arg, scope)?;
                Err(Throw(value))
            }
            Stmt::Try(stmt) => self.exec_try(stmt, scope),
            Stmt::Switch(stmt) => self.exec_switch(stmt, scope, labels),
            Stmt::Labeled(stmt) => {
                let label: Rc<str> = Rc::from(&*stmt.label.sym);
                let mut all_labels = labels.to_vec();
                all_labels.push(label.clone());
                match self.exec_stmt(&stmt.body, scope, &all_labels)? {
                    Flow::Break(Some(l)) if l == label => Ok(Flow::Normal),
                    flow => Ok(flow),
                }
            }
            Stmt::With(_) => Err(self.syntax_error("'with' statements are not supported")),
        }
    }

    fn exec_var_decl(&mut self, decl: &VarDecl, scope: &ScopeRef) -> JsResult<()> {
        let mode = BindMode::from(decl.kind);
        for declarator in &decl.decls {
            let value = match &declarator.init {
                Some(init) => {
                    let value = self.eval_expr(init, scope)?;
                    if let Pat::Ident(ident) = &declarator.name {
                        self.name_anonymous(&value, &ident.id.sym);
                    }
                    value
                }
                // `var x;` leaves an existing value alone
                None if mode == BindMode::Var => continue,
                None => Value::Undefined,
            };
            self.bind_pattern(&declarator.name, value, scope, mode)?;
        }
        Ok(())
    }

    fn exec_for(&mut self, stmt: &ForStmt, scope: &ScopeRef, labels: &[Rc<str>]) -> JsResult<Flow> {
        let loop_scope = Scope::block(scope);
        let mut per_iteration = Vec::new();
        match &stmt.init {
            Some(VarDeclOrExpr::VarDecl(decl)) => {
                if decl.kind != VarDeclKind::Var {
                    per_iteration = declared_names(decl);
                    for name in &per_iteration {
                        loop_scope.declare_uninitialized(name.clone(), decl.kind == VarDeclKind::Let);
                    }
                }
                self.exec_var_decl(decl, &loop_scope)?;
            }
            Some(VarDeclOrExpr::Expr(expr)) => {
                self.eval_expr(expr, &loop_scope)?;
            }
            None => {}
        }
        // each iteration sees a fresh copy of the loop's `let` bindings
        let copy_bindings = |from: &ScopeRef| -> ScopeRef {
            if per_iteration.is_empty() {
                return from.clone();
            }
            let next = Scope::block(scope);
            for name in &per_iteration {
                if let Some(BindingValue::Value(value)) = from.read(name) {
                    next.declare(name.clone(), value, true);
                }
            }
            next
        };
        let mut iteration = copy_bindings(&loop_scope);
        loop {
            if let Some(test) = &stmt.test {
                let test = self.eval_expr(test, &iteration)?;
                if !Self::to_boolean(&test) {
                    return Ok(Flow::Normal);
                }
            }
            match loop_step(self.exec_stmt(&stmt.body, &iteration, &[])?, labels) {
                LoopStep::Next => {}
                LoopStep::Exit => return Ok(Flow::Normal),
                LoopStep::Propagate(flow) => return Ok(flow),
            }
            iteration = copy_bindings(&iteration);
            if let Some(update) = &stmt.update {
                self.eval_expr(update, &iteration)?;
            }
        }
    }

    /// Binds the loop variable of a `for-in`/`for-of` head for one iteration.
    fn bind_for_head(&mut self, left: &ForHead, value: Value, scope: &ScopeRef) -> JsResult<ScopeRef> {
        let iteration = Scope::block(scope);
        match left {
            ForHead::VarDecl(decl) => {
                if let Some(declarator) = decl.decls.first() {
                    self.bind_pattern(&declarator.name, value, &iteration, decl.kind.into())?;
                }
            }
            ForHead::Pat(pat) => self.bind_pattern(pat, value, &iteration, BindMode::Assign)?,
            ForHead::UsingDecl(_) => return Err(self.syntax_error("'using' declarations are not supported")),
        }
        Ok(iteration)
    }

    fn exec_for_in(
        &mut self,
        left: &ForHead,
        right: &Expr,
        body: &Stmt,
        scope: &ScopeRef,
        labels: &[Rc<str>],
    ) -> JsResult<Flow> {
        let target = self.eval_expr(right, scope)?;
        if target.is_nullish() {
            return Ok(Flow::Normal);
        }
        let obj = self.to_object(&target)?;
        for key in for_in_keys(&obj) {
            // keys deleted during iteration are skipped
            if !obj.has_property(&key) {
                continue;
            }
            let iteration = self.bind_for_head(left, Value::String(key), scope)?;
            match loop_step(self.exec_stmt(body, &iteration, &[])?, labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_of(
        &mut self,
        left: &ForHead,
        right: &Expr,
        body: &Stmt,
        scope: &ScopeRef,
        labels: &[Rc<str>],
    ) -> JsResult<Flow> {
        let iterable = self.eval_expr(right, scope)?;
        let mut cursor = self.get_iterator(&iterable)?;
        while let Some(value) = self.iter_next(&mut cursor)? {
            let iteration = self.bind_for_head(left, value, scope)?;
            match loop_step(self.exec_stmt(body, &iteration, &[])?, labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(&mut self, stmt: &TryStmt, scope: &ScopeRef) -> JsResult<Flow> {
        let mut result = self.run_block(&stmt.block.stmts, &Scope::block(scope));
        if let (Err(thrown), Some(handler)) = (&result, &stmt.handler) {
            let catch_scope = Scope::block(scope);
            let thrown = thrown.0.clone();
            result = match &handler.param {
                Some(param) => self.bind_pattern(param, thrown, &catch_scope, BindMode::Let).map(|()| Flow::Normal),
                None => Ok(Flow::Normal),
            };
            if result.is_ok() {
                result = self.run_block(&handler.body.stmts, &catch_scope);
            }
        }
        if let Some(finalizer) = &stmt.finalizer {
            match self.run_block(&finalizer.stmts, &Scope::block(scope))? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    fn exec_switch(&mut self, stmt: &SwitchStmt, scope: &ScopeRef, labels: &[Rc<str>]) -> JsResult<Flow> {
        let value = self.eval_expr(&stmt.discriminant, scope)?;
        let inner = Scope::block(scope);
        for case in &stmt.cases {
            self.hoist_lexical(&case.cons, &inner);
        }
        let mut start = None;
        for (index, case) in stmt.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let candidate = self.eval_expr(test, &inner)?;
                if candidate.strict_equals(&value) {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| stmt.cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Flow::Normal);
        };
        for case in &stmt.cases[start..] {
            for stmt in &case.cons {
                match self.exec_stmt(stmt, &inner, &[])? {
                    Flow::Normal => {}
                    Flow::Break(None) => return Ok(Flow::Normal),
                    Flow::Break(Some(label)) if labels.contains(&label) => return Ok(Flow::Normal),
                    abrupt => return Ok(abrupt),
                }
            }
        }
        Ok(Flow::Normal)
    }

    // ---------------------------------------------------------------------------------
    // bindings

    /// Binds every name in `pat` from `value`.
    fn bind_pattern(&mut self, pat: &Pat, value: Value, scope: &ScopeRef, mode: BindMode) -> JsResult<()> {
        match pat {
            Pat::Ident(ident) => self.bind_name(&ident.id.sym, value, scope, mode),
            Pat::Object(object) => self.bind_object_pat(object, value, scope, mode),
            Pat::Array(array) => self.bind_array_pat(array, value, scope, mode),
            Pat::Assign(assign) => {
                let value = if value.is_undefined() {
                    let value = self.eval_expr(&assign.right, scope)?;
                    if let Pat::Ident(ident) = &*assign.left {
                        self.name_anonymous(&value, &ident.id.sym);
                    }
                    value
                } else {
                    value
                };
                self.bind_pattern(&assign.left, value, scope, mode)
            }
            Pat::Rest(rest) => self.bind_pattern(&rest.arg, value, scope, mode),
            Pat::Expr(expr) => {
                let place = self.place_of_expr(expr, scope)?;
                self.write_place(place, value, scope)
            }
            Pat::Invalid(_) => Err(self.syntax_error("Invalid destructuring target")),
        }
    }

    fn bind_object_pat(&mut self, object: &ObjectPat, value: Value, scope: &ScopeRef, mode: BindMode) -> JsResult<()> {
        if value.is_nullish() {
            return Err(self.type_error(format!("Cannot destructure '{value:?}' as it is {value:?}.")));
        }
        let mut used = Vec::new();
        for prop in &object.props {
            match prop {
                ObjectPatProp::KeyValue(prop) => {
                    let key = self.eval_prop_name(&prop.key, scope)?;
                    let item = self.get(&value, &key)?;
                    used.push(key);
                    self.bind_pattern(&prop.value, item, scope, mode)?;
                }
                ObjectPatProp::Assign(prop) => {
                    let key: Rc<str> = Rc::from(&*prop.key.id.sym);
                    let mut item = self.get(&value, &key)?;
                    if let Some(default) = prop.value.as_ref().filter(|_| item.is_undefined()) {
                        item = self.eval_expr(default, scope)?;
                        self.name_anonymous(&item, &key);
                    }
                    self.bind_name(&key, item, scope, mode)?;
                    used.push(key);
                }
                ObjectPatProp::Rest(rest) => {
                    let remaining = self.new_object();
                    if let Value::Object(source) = &value {
                        for key in source.borrow().own_enumerable_keys() {
                            if !used.contains(&key) {
                                if let Some(item) = source.own_value(&key) {
                                    remaining.define_data(&key, item);
                                }
                            }
                        }
                    }
                    self.bind_pattern(&rest.arg, Value::Object(remaining), scope, mode)?;
                }
            }
        }
        Ok(())
    }

    fn bind_array_pat(&mut self, array: &ArrayPat, value: Value, scope: &ScopeRef, mode: BindMode) -> JsResult<()> {
        let mut cursor = self.get_iterator(&value)?;
        for elem in &array.elems {
            match elem {
                Some(Pat::Rest(rest)) => {
                    let mut remaining = Vec::new();
                    while let Some(item) = self.iter_next(&mut cursor)? {
                        remaining.push(item);
                    }
                    let remaining = self.new_array(remaining);
                    self.bind_pattern(&rest.arg, Value::Object(remaining), scope, mode)?;
                }
                Some(elem) => {
                    let item = self.iter_next(&mut cursor)?.unwrap_or_default();
                    self.bind_pattern(elem, item, scope, mode)?;
                }
                None => {
                    self.iter_next(&mut cursor)?;
                }
            }
        }
        Ok(())
    }

    fn bind_name(&mut self, name: &str, value: Value, scope: &ScopeRef, mode: BindMode) -> JsResult<()> {
        match mode {
            BindMode::Assign => self.assign_identifier(name, value, scope),
            BindMode::Var => {
                let var_scope = scope.var_scope();
                match var_scope.global_object() {
                    Some(global) => {
                        let receiver = Value::Object(global.clone());
                        self.put_on(&global.clone(), name, value, &receiver)
                    }
                    None => {
                        if var_scope.write(name, value.clone()).is_none() {
                            var_scope.declare(Rc::from(name), value, true);
                        }
                        Ok(())
                    }
                }
            }
            BindMode::Let | BindMode::Const => match scope.global_object() {
                Some(global) => {
                    global.define(name, Property::data(value));
                    Ok(())
                }
                None => {
                    scope.declare(Rc::from(name), value, mode == BindMode::Let);
                    Ok(())
                }
            },
        }
    }

    fn assign_identifier(&mut self, name: &str, value: Value, scope: &ScopeRef) -> JsResult<()> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            match s.write(name, value.clone()) {
                Some(BindingWrite::Done) => return Ok(()),
                Some(BindingWrite::Uninitialized) => {
                    return Err(self.reference_error(format!("Cannot access '{name}' before initialization")));
                }
                Some(BindingWrite::Immutable) => return Err(self.type_error("Assignment to constant variable.")),
                None => {}
            }
            if let Some(global) = s.global_object() {
                // sloppy mode: unknown names become globals
                let receiver = Value::Object(global.clone());
                return self.put_on(&global.clone(), name, value, &receiver);
            }
            current = s.parent.clone();
        }
        Ok(())
    }

    /// Resolves an identifier, returning `None` when no binding exists anywhere.
    fn try_lookup(&mut self, name: &str, scope: &ScopeRef) -> JsResult<Option<Value>> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            match s.read(name) {
                Some(BindingValue::Value(value)) => return Ok(Some(value)),
                Some(BindingValue::Uninitialized) => {
                    return Err(self.reference_error(format!("Cannot access '{name}' before initialization")));
                }
                None => {}
            }
            match &s.kind {
                ScopeKind::Global(global) => {
                    if !global.has_property(name) {
                        return Ok(None);
                    }
                    let receiver = Value::Object(global.clone());
                    return self.get_from(&global.clone(), name, &receiver).map(Some);
                }
                ScopeKind::Function(frame) if name == "arguments" => {
                    let arguments = Value::Object(self.new_array(frame.args.to_vec()));
                    s.declare(Rc::from(name), arguments.clone(), true);
                    return Ok(Some(arguments));
                }
                _ => {}
            }
            current = s.parent.clone();
        }
        Ok(None)
    }

    fn lookup_identifier(&mut self, name: &str, scope: &ScopeRef) -> JsResult<Value> {
        match self.try_lookup(name, scope)? {
            Some(value) => Ok(value),
            None => Err(self.reference_error(format!("{name} is not defined"))),
        }
    }

    fn resolve_this(&self, scope: &ScopeRef) -> JsResult<Value> {
        let mut current: Option<&Scope> = Some(&**scope);
        while let Some(s) = current {
            match &s.kind {
                ScopeKind::Function(frame) => {
                    return frame.this.borrow().clone().ok_or_else(|| {
                        self.reference_error(
                            "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
                        )
                    });
                }
                ScopeKind::Global(global) => return Ok(Value::Object(global.clone())),
                ScopeKind::Arrow | ScopeKind::Block => current = s.parent.as_deref(),
            }
        }
        Ok(Value::Undefined)
    }

    // ---------------------------------------------------------------------------------
    // places

    fn place_of_expr<'a>(&mut self, expr: &'a Expr, scope: &ScopeRef) -> JsResult<Place<'a>> {
        match expr {
            Expr::Ident(ident) => Ok(Place::Name(&ident.sym)),
            Expr::Member(member) => {
                let target = self.eval_expr(&member.obj, scope)?;
                let key = self.eval_member_key(&member.prop, scope)?;
                Ok(Place::Property { target, key })
            }
            Expr::SuperProp(member) => {
                let target = self.resolve_this(scope)?;
                let key = self.eval_super_key(&member.prop, scope)?;
                Ok(Place::Property { target, key })
            }
            Expr::Paren(paren) => self.place_of_expr(&paren.expr, scope),
            _ => Err(self.syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn place_of_target<'a>(&mut self, target: &'a SimpleAssignTarget, scope: &ScopeRef) -> JsResult<Place<'a>> {
        match target {
            SimpleAssignTarget::Ident(ident) => Ok(Place::Name(&ident.id.sym)),
            SimpleAssignTarget::Member(member) => {
                let target = self.eval_expr(&member.obj, scope)?;
                let key = self.eval_member_key(&member.prop, scope)?;
                Ok(Place::Property { target, key })
            }
            SimpleAssignTarget::SuperProp(member) => {
                let target = self.resolve_this(scope)?;
                let key = self.eval_super_key(&member.prop, scope)?;
                Ok(Place::Property { target, key })
            }
            SimpleAssignTarget::Paren(paren) => self.place_of_expr(&paren.expr, scope),
            _ => Err(self.syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&mut self, place: &Place<'_>, scope: &ScopeRef) -> JsResult<Value> {
        match place {
            Place::Name(name) => self.lookup_identifier(name, scope),
            Place::Property { target, key } => self.get(target, key),
        }
    }

    fn write_place(&mut self, place: Place<'_>, value: Value, scope: &ScopeRef) -> JsResult<()> {
        match place {
            Place::Name(name) => self.assign_identifier(name, value, scope),
            Place::Property { target, key } => self.put(&target, &key, value),
        }
    }

    // ---------------------------------------------------------------------------------
    // expressions

    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match expr {
            Expr::Ident(ident) => self.lookup_identifier(&ident.sym, scope),
            Expr::Lit(lit) => self.eval_lit(lit),
            Expr::This(_) => self.resolve_this(scope),
            Expr::Tpl(tpl) => self.eval_template(tpl, scope),
            Expr::TaggedTpl(tagged) => self.eval_tagged_template(&tagged.tag, &tagged.tpl, scope),
            Expr::Array(array) => self.eval_array(array, scope),
            Expr::Object(object) => self.eval_object(object, scope),
            Expr::Fn(func) => {
                let Some(ident) = &func.ident else {
                    return Ok(Value::Object(self.make_closure(FunctionNode::Function(&func.function), "", scope, None)));
                };
                // a named function expression sees its own name
                let own = Scope::block(scope);
                let closure = self.make_closure(FunctionNode::Function(&func.function), &ident.sym, &own, None);
                own.declare(Rc::from(&*ident.sym), Value::Object(closure.clone()), true);
                Ok(Value::Object(closure))
            }
            Expr::Arrow(arrow) => Ok(Value::Object(self.make_closure(FunctionNode::Arrow(arrow), "", scope, None))),
            Expr::Class(class) => {
                let name = class.ident.as_ref().map_or("", |ident| &*ident.sym);
                self.eval_class(&class.class, name, scope)
            }
            Expr::Unary(unary) => self.eval_unary(unary.op, &unary.arg, scope),
            Expr::Update(update) => self.eval_update(update.op, update.prefix, &update.arg, scope),
            Expr::Bin(bin) => {
                let left = self.eval_expr(&bin.left, scope)?;
                if matches!(bin.op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing) {
                    return if short_circuits(bin.op, &left) {
                        Ok(left)
                    } else {
                        self.eval_expr(&bin.right, scope)
                    };
                }
                let right = self.eval_expr(&bin.right, scope)?;
                self.binary_op(bin.op, &left, &right)
            }
            Expr::Assign(assign) => self.eval_assign(assign, scope),
            Expr::Cond(cond) => {
                let test = self.eval_expr(&cond.test, scope)?;
                if Self::to_boolean(&test) {
                    self.eval_expr(&cond.cons, scope)
                } else {
                    self.eval_expr(&cond.alt, scope)
                }
            }
            Expr::Call(_) | Expr::Member(_) | Expr::SuperProp(_) | Expr::OptChain(_) => {
                Ok(self.eval_reference(expr, scope)?.map_or(Value::Undefined, |(value, _)| value))
            }
            Expr::New(new) => {
                let ctor = self.eval_expr(&new.callee, scope)?;
                let args = match &new.args {
                    Some(args) => self.eval_args(args, scope)?,
                    None => Vec::new(),
                };
                if !ctor.as_object().is_some_and(ObjRef::is_constructor) {
                    let callee = self.code.snippet(new.callee.span()).to_owned();
                    return Err(self.type_error(format!("{callee} is not a constructor")));
                }
                self.construct(&ctor, &args)
            }
            Expr::Seq(seq) => {
                let mut last = Value::Undefined;
                for item in &seq.exprs {
                    last = self.eval_expr(item, scope)?;
                }
                Ok(last)
            }
            Expr::Await(await_expr) => {
                let value = self.eval_expr(&await_expr.arg, scope)?;
                self.await_value(value)
            }
            Expr::Paren(paren) => self.eval_expr(&paren.expr, scope),
            _ => Err(self.syntax_error("Unsupported expression")),
        }
    }

    fn eval_lit(&mut self, lit: &Lit) -> JsResult<Value> {
        match lit {
            Lit::Str(s) => Ok(Value::String(Rc::from(&*s.value))),
            Lit::Num(n) => Ok(Value::Number(n.value)),
            Lit::Bool(b) => Ok(Value::Bool(b.value)),
            Lit::Null(_) => Ok(Value::Null),
            Lit::Regex(re) => regexp::new_regexp(self, &re.exp, &re.flags).map(Value::Object),
            Lit::BigInt(_) => Err(self.syntax_error("BigInt literals are not supported")),
            Lit::JSXText(_) => Err(self.syntax_error("Unexpected JSX")),
        }
    }

    /// Evaluates member access and calls, returning the value and the receiver a call
    /// through it would use. `None` means an optional chain short-circuited.
    fn eval_reference(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Option<(Value, Value)>> {
        match expr {
            Expr::Member(member) => self.eval_member(member, false, scope),
            Expr::SuperProp(member) => {
                let this = self.resolve_this(scope)?;
                let key = self.eval_super_key(&member.prop, scope)?;
                let home_proto = scope.function_frame().and_then(|f| f.home.as_ref()).and_then(ObjRef::proto);
                let value = match home_proto {
                    Some(proto) => self.get_from(&proto, &key, &this)?,
                    None => Value::Undefined,
                };
                Ok(Some((value, this)))
            }
            Expr::Call(call) => match &call.callee {
                Callee::Expr(callee) => self.eval_call(callee, &call.args, false, scope),
                Callee::Super(_) => {
                    let args = self.eval_args(&call.args, scope)?;
                    Ok(Some((self.super_call(scope, &args)?, Value::Undefined)))
                }
                Callee::Import(_) => Err(self.syntax_error("dynamic imports are not supported")),
            },
            Expr::OptChain(chain) => self.eval_opt_chain(chain, scope),
            // parentheses end an optional chain but keep the receiver
            Expr::Paren(paren) => Ok(Some(
                self.eval_reference(&paren.expr, scope)?
                    .unwrap_or((Value::Undefined, Value::Undefined)),
            )),
            _ => Ok(Some((self.eval_expr(expr, scope)?, Value::Undefined))),
        }
    }

    fn eval_opt_chain(&mut self, chain: &OptChainExpr, scope: &ScopeRef) -> JsResult<Option<(Value, Value)>> {
        match &*chain.base {
            OptChainBase::Member(member) => self.eval_member(member, chain.optional, scope),
            OptChainBase::Call(call) => self.eval_call(&call.callee, &call.args, chain.optional, scope),
        }
    }

    fn eval_member(&mut self, member: &MemberExpr, optional: bool, scope: &ScopeRef) -> JsResult<Option<(Value, Value)>> {
        let Some((target, _)) = self.eval_reference(&member.obj, scope)? else {
            return Ok(None);
        };
        if optional && target.is_nullish() {
            return Ok(None);
        }
        let key = self.eval_member_key(&member.prop, scope)?;
        if target.is_nullish() {
            return Err(self.type_error(format!("Cannot read properties of {target:?} (reading '{key}')")));
        }
        let value = self.get(&target, &key)?;
        Ok(Some((value, target)))
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[ExprOrSpread],
        optional: bool,
        scope: &ScopeRef,
    ) -> JsResult<Option<(Value, Value)>> {
        let Some((function, this)) = self.eval_reference(callee, scope)? else {
            return Ok(None);
        };
        if optional && function.is_nullish() {
            return Ok(None);
        }
        let args = self.eval_args(args, scope)?;
        if !function.is_callable() {
            let callee = self.code.snippet(callee.span()).to_owned();
            return Err(self.type_error(format!("{callee} is not a function")));
        }
        let result = self.call(&function, this, &args)?;
        Ok(Some((result, Value::Undefined)))
    }

    fn eval_member_key(&mut self, prop: &MemberProp, scope: &ScopeRef) -> JsResult<Rc<str>> {
        match prop {
            MemberProp::Ident(ident) => Ok(Rc::from(&*ident.sym)),
            MemberProp::Computed(computed) => {
                let key = self.eval_expr(&computed.expr, scope)?;
                self.to_property_key(&key)
            }
            MemberProp::PrivateName(_) => Err(self.syntax_error("private names are not supported")),
        }
    }

    fn eval_super_key(&mut self, prop: &SuperProp, scope: &ScopeRef) -> JsResult<Rc<str>> {
        match prop {
            SuperProp::Ident(ident) => Ok(Rc::from(&*ident.sym)),
            SuperProp::Computed(computed) => {
                let key = self.eval_expr(&computed.expr, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn eval_prop_name(&mut self, key: &PropName, scope: &ScopeRef) -> JsResult<Rc<str>> {
        match key {
            PropName::Ident(ident) => Ok(Rc::from(&*ident.sym)),
            PropName::Str(s) => Ok(Rc::from(&*s.value)),
            PropName::Num(n) => Ok(Rc::from(number_to_string(n.value))),
            PropName::BigInt(n) => Ok(Rc::from(n.value.to_string())),
            PropName::Computed(computed) => {
                let key = self.eval_expr(&computed.expr, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn eval_args(&mut self, args: &[ExprOrSpread], scope: &ScopeRef) -> JsResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval_expr(&arg.expr, scope)?;
            if arg.spread.is_some() {
                values.extend(self.collect_iterable(&value)?);
            } else {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn eval_template(&mut self, tpl: &Tpl, scope: &ScopeRef) -> JsResult<Value> {
        let mut out = String::new();
        for (index, quasi) in tpl.quasis.iter().enumerate() {
            out.push_str(quasi.cooked.as_deref().unwrap_or_default());
            if let Some(expr) = tpl.exprs.get(index) {
                let value = self.eval_expr(expr, scope)?;
                out.push_str(&self.to_string(&value)?);
            }
        }
        Ok(Value::from(out))
    }

    fn eval_tagged_template(&mut self, tag: &Expr, tpl: &Tpl, scope: &ScopeRef) -> JsResult<Value> {
        let (function, this) = self
            .eval_reference(tag, scope)?
            .unwrap_or((Value::Undefined, Value::Undefined));
        let cooked = tpl
            .quasis
            .iter()
            .map(|q| q.cooked.as_ref().map_or(Value::Undefined, |s| Value::String(Rc::from(&**s))))
            .collect();
        let strings = self.new_array(cooked);
        let raw = self.new_array(tpl.quasis.iter().map(|q| Value::String(Rc::from(&*q.raw))).collect());
        strings.define_hidden("raw", raw);
        let mut args = vec![Value::Object(strings)];
        for expr in &tpl.exprs {
            args.push(self.eval_expr(expr, scope)?);
        }
        if !function.is_callable() {
            let tag = self.code.snippet(tag.span()).to_owned();
            return Err(self.type_error(format!("{tag} is not a function")));
        }
        self.call(&function, this, &args)
    }

    fn eval_array(&mut self, array: &ArrayLit, scope: &ScopeRef) -> JsResult<Value> {
        let mut items = Vec::with_capacity(array.elems.len());
        let mut holes = Vec::new();
        for elem in &array.elems {
            match elem {
                None => {
                    holes.push(items.len());
                    items.push(Value::Undefined);
                }
                Some(item) => {
                    let value = self.eval_expr(&item.expr, scope)?;
                    if item.spread.is_some() {
                        items.extend(self.collect_iterable(&value)?);
                    } else {
                        items.push(value);
                    }
                }
            }
        }
        let array = self.new_array(items);
        array.borrow_mut().holes.extend(holes);
        Ok(Value::Object(array))
    }

    fn eval_object(&mut self, object: &ObjectLit, scope: &ScopeRef) -> JsResult<Value> {
        let obj = self.new_object();
        for prop in &object.props {
            let prop = match prop {
                PropOrSpread::Spread(spread) => {
                    let source = self.eval_expr(&spread.expr, scope)?;
                    self.copy_data_properties(&obj, &source, &[])?;
                    continue;
                }
                PropOrSpread::Prop(prop) => prop,
            };
            match &**prop {
                Prop::KeyValue(prop) => {
                    let name = self.eval_prop_name(&prop.key, scope)?;
                    let value = self.eval_expr(&prop.value, scope)?;
                    if &*name == "__proto__" && !matches!(prop.key, PropName::Computed(_)) {
                        match value {
                            Value::Object(proto) => obj.borrow_mut().proto = Some(proto),
                            Value::Null => obj.borrow_mut().proto = None,
                            _ => {}
                        }
                        continue;
                    }
                    self.name_anonymous(&value, &name);
                    obj.define(&name, Property::data(value));
                }
                Prop::Shorthand(ident) => {
                    let value = self.lookup_identifier(&ident.sym, scope)?;
                    obj.define(&ident.sym, Property::data(value));
                }
                Prop::Method(method) => {
                    let name = self.eval_prop_name(&method.key, scope)?;
                    let closure = self.make_closure(FunctionNode::Function(&method.function), &name, scope, Some(obj.clone()));
                    define_method(&obj, &name, Value::Object(closure), MethodKind::Method, true);
                }
                Prop::Getter(getter) => {
                    let name = self.eval_prop_name(&getter.key, scope)?;
                    let closure = self.make_closure(FunctionNode::Getter(getter), &name, scope, Some(obj.clone()));
                    define_method(&obj, &name, Value::Object(closure), MethodKind::Getter, true);
                }
                Prop::Setter(setter) => {
                    let name = self.eval_prop_name(&setter.key, scope)?;
                    let closure = self.make_closure(FunctionNode::Setter(setter), &name, scope, Some(obj.clone()));
                    define_method(&obj, &name, Value::Object(closure), MethodKind::Setter, true);
                }
                Prop::Assign(_) => return Err(self.syntax_error("Invalid shorthand property initializer")),
            }
        }
        Ok(Value::Object(obj))
    }

    /// Copies own enumerable properties of `source` onto `target`, reading through getters.
    pub(crate) fn copy_data_properties(&mut self, target: &ObjRef, source: &Value, excluded: &[Rc<str>]) -> JsResult<()> {
        let source = match source {
            Value::Undefined | Value::Null => return Ok(()),
            Value::Object(obj) => obj.clone(),
            primitive => self.to_object(primitive)?,
        };
        let keys = source.borrow().own_enumerable_keys();
        let receiver = Value::Object(source.clone());
        for key in keys {
            if excluded.contains(&key) {
                continue;
            }
            let value = self.get_from(&source, &key, &receiver)?;
            target.define(&key, Property::data(value));
        }
        Ok(())
    }

    pub(crate) fn eval_class(&mut self, class: &Class, name: &str, scope: &ScopeRef) -> JsResult<Value> {
        let name: Rc<str> = Rc::from(name);
        let (parent, proto_parent, ctor_proto) = match &class.super_class {
            None => (
                None,
                Some(self.realm.intrinsics.object_proto.clone()),
                self.realm.intrinsics.function_proto.clone(),
            ),
            Some(super_class) => {
                let parent = self.eval_expr(super_class, scope)?;
                match &parent {
                    Value::Null => (None, None, self.realm.intrinsics.function_proto.clone()),
                    Value::Object(obj) if obj.is_constructor() => {
                        let proto_parent = match self.get(&parent, "prototype")? {
                            Value::Object(proto) => Some(proto),
                            Value::Null => None,
                            _ => {
                                return Err(self.type_error(
                                    "Class extends value does not have valid prototype property",
                                ));
                            }
                        };
                        (Some(parent.clone()), proto_parent, obj.clone())
                    }
                    other => {
                        return Err(self.type_error(format!(
                            "Class extends value {other:?} is not a constructor or null"
                        )));
                    }
                }
            }
        };
        let class_scope = Scope::block(scope);
        if !name.is_empty() {
            class_scope.declare_uninitialized(name.clone(), false);
        }
        let prototype = ObjRef::new(JsObject::new(ObjClass::Ordinary, proto_parent));

        let mut ctor_code = None;
        let mut fields = Vec::new();
        for member in &class.body {
            match member {
                ClassMember::Constructor(ctor) => ctor_code = Some(self.code.nested(FunctionNode::Constructor(ctor))),
                ClassMember::ClassProp(prop) if !prop.is_static && !prop.declare => {
                    let key = self.eval_prop_name(&prop.key, &class_scope)?;
                    let value = prop.value.as_deref().map(|expr| self.code.nested(FunctionNode::Field(expr)));
                    fields.push(FieldDef { key, value });
                }
                _ => {}
            }
        }
        let ctor = self.make_class_ctor(
            ClassCtor {
                name: name.clone(),
                ctor: ctor_code,
                env: class_scope.clone(),
                realm: self.realm.clone(),
                parent,
                prototype: prototype.clone(),
                fields,
                filename: self.filename.clone(),
                text: Rc::from(self.code.snippet(class.span)),
            },
            ctor_proto,
        );

        let static_frame = || FunctionFrame {
            this: RefCell::new(Some(Value::Object(ctor.clone()))),
            home: Some(ctor.clone()),
            args: Rc::from([]),
            derived: None,
        };
        for member in &class.body {
            match member {
                ClassMember::Method(method) => {
                    let target = if method.is_static { &ctor } else { &prototype };
                    let key = self.eval_prop_name(&method.key, &class_scope)?;
                    let closure = self.make_closure(
                        FunctionNode::Function(&method.function),
                        &key,
                        &class_scope,
                        Some(target.clone()),
                    );
                    define_method(target, &key, Value::Object(closure), method.kind, false);
                }
                ClassMember::ClassProp(prop) if prop.is_static && !prop.declare => {
                    let key = self.eval_prop_name(&prop.key, &class_scope)?;
                    let value = match &prop.value {
                        Some(expr) => {
                            let field_scope = Scope::child(&class_scope, ScopeKind::Function(Box::new(static_frame())));
                            let value = self.eval_expr(expr, &field_scope)?;
                            self.name_anonymous(&value, &key);
                            value
                        }
                        None => Value::Undefined,
                    };
                    ctor.define(&key, Property::data(value));
                }
                ClassMember::StaticBlock(block) => {
                    let block_scope = Scope::child(&class_scope, ScopeKind::Function(Box::new(static_frame())));
                    self.run_statements(&block.body.stmts, &block_scope)?;
                }
                ClassMember::PrivateMethod(_) | ClassMember::PrivateProp(_) | ClassMember::AutoAccessor(_) => {
                    return Err(self.syntax_error("private names are not supported"));
                }
                _ => {}
            }
        }
        if !name.is_empty() {
            class_scope.initialize(&name, Value::Object(ctor.clone()));
        }
        Ok(Value::Object(ctor))
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match op {
            UnaryOp::TypeOf => {
                let value = match arg.unwrap_parens() {
                    Expr::Ident(ident) => self.try_lookup(&ident.sym, scope)?.unwrap_or_default(),
                    _ => self.eval_expr(arg, scope)?,
                };
                Ok(Value::from(value.type_of()))
            }
            UnaryOp::Delete => match arg.unwrap_parens() {
                Expr::Member(member) => {
                    let target = self.eval_expr(&member.obj, scope)?;
                    let key = self.eval_member_key(&member.prop, scope)?;
                    match target {
                        Value::Object(obj) => Ok(Value::Bool(obj.borrow_mut().delete(&key))),
                        Value::Undefined | Value::Null => {
                            Err(self.type_error("Cannot convert undefined or null to object"))
                        }
                        _ => Ok(Value::Bool(true)),
                    }
                }
                Expr::Ident(ident) => {
                    // only implicit globals can be deleted by name
                    match scope.root_global() {
                        Some(global) if self.try_lookup(&ident.sym, scope)?.is_some() => {
                            let deletable = global.get_own(&ident.sym).is_some_and(|p| p.configurable);
                            Ok(Value::Bool(deletable && global.borrow_mut().delete(&ident.sym)))
                        }
                        _ => Ok(Value::Bool(true)),
                    }
                }
                _ => {
                    self.eval_expr(arg, scope)?;
                    Ok(Value::Bool(true))
                }
            },
            _ => {
                let value = self.eval_expr(arg, scope)?;
                Ok(match op {
                    UnaryOp::Bang => Value::Bool(!Self::to_boolean(&value)),
                    UnaryOp::Minus => Value::Number(-self.to_number(&value)?),
                    UnaryOp::Plus => Value::Number(self.to_number(&value)?),
                    UnaryOp::Tilde => Value::Number(f64::from(!to_int32(self.to_number(&value)?))),
                    UnaryOp::Void | UnaryOp::TypeOf | UnaryOp::Delete => Value::Undefined,
                })
            }
        }
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, arg: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        let delta = match op {
            UpdateOp::PlusPlus => 1.0,
            UpdateOp::MinusMinus => -1.0,
        };
        let place = self.place_of_expr(arg, scope)?;
        let current = self.read_place(&place, scope)?;
        let old = self.to_number(&current)?;
        self.write_place(place, Value::Number(old + delta), scope)?;
        Ok(Value::Number(if prefix { old + delta } else { old }))
    }

    fn eval_assign(&mut self, assign: &AssignExpr, scope: &ScopeRef) -> JsResult<Value> {
        let target = match &assign.left {
            AssignTarget::Pat(pat) => {
                let value = self.eval_expr(&assign.right, scope)?;
                match pat {
                    AssignTargetPat::Array(array) => self.bind_array_pat(array, value.clone(), scope, BindMode::Assign)?,
                    AssignTargetPat::Object(object) => {
                        self.bind_object_pat(object, value.clone(), scope, BindMode::Assign)?;
                    }
                    AssignTargetPat::Invalid(_) => return Err(self.syntax_error("Invalid destructuring assignment target")),
                }
                return Ok(value);
            }
            AssignTarget::Simple(target) => target,
        };
        // member targets evaluate the object and key once
        let place = self.place_of_target(target, scope)?;
        let result = match compound_op(assign.op) {
            None => {
                let value = self.eval_expr(&assign.right, scope)?;
                if let Place::Name(name) = &place {
                    self.name_anonymous(&value, name);
                }
                value
            }
            Some(op @ (BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing)) => {
                let current = self.read_place(&place, scope)?;
                if short_circuits(op, &current) {
                    return Ok(current);
                }
                self.eval_expr(&assign.right, scope)?
            }
            Some(op) => {
                let current = self.read_place(&place, scope)?;
                let rhs = self.eval_expr(&assign.right, scope)?;
                self.binary_op(op, &current, &rhs)?
            }
        };
        self.write_place(place, result.clone(), scope)?;
        Ok(result)
    }

    pub(crate) fn binary_op(&mut self, op: BinaryOp, left: &Value, right: &Value) -> JsResult<Value> {
        let numeric = |this: &mut Self| -> JsResult<(f64, f64)> { Ok((this.to_number(left)?, this.to_number(right)?)) };
        Ok(match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut out = self.to_string(&left)?.to_string();
                    out.push_str(&self.to_string(&right)?);
                    Value::from(out)
                } else {
                    Value::Number(self.to_number(&left)? + self.to_number(&right)?)
                }
            }
            BinaryOp::Sub => {
                let (a, b) = numeric(self)?;
                Value::Number(a - b)
            }
            BinaryOp::Mul => {
                let (a, b) = numeric(self)?;
                Value::Number(a * b)
            }
            BinaryOp::Div => {
                let (a, b) = numeric(self)?;
                Value::Number(a / b)
            }
            BinaryOp::Mod => {
                let (a, b) = numeric(self)?;
                Value::Number(a % b)
            }
            BinaryOp::Exp => {
                let (a, b) = numeric(self)?;
                Value::Number(js_pow(a, b))
            }
            BinaryOp::EqEq => Value::Bool(self.loose_equals(left, right)?),
            BinaryOp::NotEq => Value::Bool(!self.loose_equals(left, right)?),
            BinaryOp::EqEqEq => Value::Bool(left.strict_equals(right)),
            BinaryOp::NotEqEq => Value::Bool(!left.strict_equals(right)),
            BinaryOp::Lt => Value::Bool(self.compare(left, right, false)? == Some(true)),
            BinaryOp::Gt => Value::Bool(self.compare(right, left, true)? == Some(true)),
            BinaryOp::LtEq => Value::Bool(self.compare(right, left, true)? == Some(false)),
            BinaryOp::GtEq => Value::Bool(self.compare(left, right, false)? == Some(false)),
            BinaryOp::LShift => {
                let (a, b) = numeric(self)?;
                Value::Number(f64::from(to_int32(a).wrapping_shl(to_uint32(b) & 31)))
            }
            BinaryOp::RShift => {
                let (a, b) = numeric(self)?;
                Value::Number(f64::from(to_int32(a) >> (to_uint32(b) & 31)))
            }
            BinaryOp::ZeroFillRShift => {
                let (a, b) = numeric(self)?;
                Value::Number(f64::from(to_uint32(a) >> (to_uint32(b) & 31)))
            }
            BinaryOp::BitAnd => {
                let (a, b) = numeric(self)?;
                Value::Number(f64::from(to_int32(a) & to_int32(b)))
            }
            BinaryOp::BitOr => {
                let (a, b) = numeric(self)?;
                Value::Number(f64::from(to_int32(a) | to_int32(b)))
            }
            BinaryOp::BitXor => {
                let (a, b) = numeric(self)?;
                Value::Number(f64::from(to_int32(a) ^ to_int32(b)))
            }
            BinaryOp::In => Value::Bool(self.has_property(right, left)?),
            BinaryOp::InstanceOf => Value::Bool(self.instance_of(left, right)?),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => {
                if short_circuits(op, left) {
                    left.clone()
                } else {
                    right.clone()
                }
            }
        })
    }

    /// Abstract relational comparison `a < b`; `None` when either side is NaN.
    /// `right_first` evaluates the primitive conversion of `b` first, as `>` and `<=` do.
    fn compare(&mut self, a: &Value, b: &Value, right_first: bool) -> JsResult<Option<bool>> {
        let (pa, pb) = if right_first {
            let pb = self.to_primitive(b, Hint::Number)?;
            (self.to_primitive(a, Hint::Number)?, pb)
        } else {
            let pa = self.to_primitive(a, Hint::Number)?;
            (pa, self.to_primitive(b, Hint::Number)?)
        };
        if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
            return Ok(Some(x.encode_utf16().lt(y.encode_utf16())));
        }
        let x = self.to_number(&pa)?;
        let y = self.to_number(&pb)?;
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    /// Binds parameters, hoists declarations and runs the body of `code` in `scope`.
    pub(crate) fn run_function_body(&mut self, code: &FunctionCode, scope: &ScopeRef, args: &[Value]) -> JsResult<Value> {
        for (index, param) in code.params.iter().enumerate() {
            match param {
                Pat::Rest(rest) => {
                    let rest_args = self.new_array(args.get(index..).unwrap_or_default().to_vec());
                    self.bind_pattern(&rest.arg, Value::Object(rest_args), scope, BindMode::Let)?;
                }
                param => {
                    let value = args.get(index).cloned().unwrap_or_default();
                    self.bind_pattern(param, value, scope, BindMode::Let)?;
                }
            }
        }
        match &code.body {
            CodeBody::Expr(expr) => self.eval_expr(expr, scope),
            CodeBody::Block(stmts) => match self.run_statements(stmts, scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }
}

/// The operator a compound assignment applies, `None` for plain `=`.
fn compound_op(op: AssignOp) -> Option<BinaryOp> {
    Some(match op {
        AssignOp::Assign => return None,
        AssignOp::AddAssign => BinaryOp::Add,
        AssignOp::SubAssign => BinaryOp::Sub,
        AssignOp::MulAssign => BinaryOp::Mul,
        AssignOp::DivAssign => BinaryOp::Div,
        AssignOp::ModAssign => BinaryOp::Mod,
        AssignOp::LShiftAssign => BinaryOp::LShift,
        AssignOp::RShiftAssign => BinaryOp::RShift,
        AssignOp::ZeroFillRShiftAssign => BinaryOp::ZeroFillRShift,
        AssignOp::BitOrAssign => BinaryOp::BitOr,
        AssignOp::BitXorAssign => BinaryOp::BitXor,
        AssignOp::BitAndAssign => BinaryOp::BitAnd,
        AssignOp::ExpAssign => BinaryOp::Exp,
        AssignOp::AndAssign => BinaryOp::LogicalAnd,
        AssignOp::OrAssign => BinaryOp::LogicalOr,
        AssignOp::NullishAssign => BinaryOp::NullishCoalescing,
    })
}

fn short_circuits(op: BinaryOp, left: &Value) -> bool {
    match op {
        BinaryOp::LogicalAnd => !Interp::to_boolean(left),
        BinaryOp::LogicalOr => Interp::to_boolean(left),
        BinaryOp::NullishCoalescing => !left.is_nullish(),
        _ => false,
    }
}

/// `**`, which differs from `powf` for a NaN exponent and for `(+-1) ** +-Infinity`.
pub(crate) fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs().to_bits() == 1.0f64.to_bits() && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Installs a method or merges an accessor half onto `target`.
fn define_method(target: &ObjRef, key: &str, method: Value, kind: MethodKind, enumerable: bool) {
    let (get, set) = match kind {
        MethodKind::Method => {
            let prop = Property {
                enumerable,
                ..Property::data(method)
            };
            target.define(key, prop);
            return;
        }
        MethodKind::Getter => {
            let set = match target.get_own(key).map(|p| p.slot) {
                Some(Slot::Accessor { set, .. }) => set,
                _ => None,
            };
            (Some(method), set)
        }
        MethodKind::Setter => {
            let get = match target.get_own(key).map(|p| p.slot) {
                Some(Slot::Accessor { get, .. }) => get,
                _ => None,
            };
            (get, Some(method))
        }
    };
    target.define(key, Property::accessor(get, set, enumerable));
}

/// Enumerable string keys of `obj` and its prototype chain, shadowed keys once.
fn for_in_keys(obj: &ObjRef) -> Vec<Rc<str>> {
    let mut keys: Vec<Rc<str>> = Vec::new();
    let mut seen: Vec<Rc<str>> = Vec::new();
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        let borrowed = o.borrow();
        for key in borrowed.own_keys() {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key.clone());
            if borrowed.get_own(&key).is_some_and(|p| p.enumerable) {
                keys.push(key);
            }
        }
        current = borrowed.proto.clone();
    }
    keys
}
