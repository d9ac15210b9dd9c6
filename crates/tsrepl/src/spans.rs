//! Cursor-driven evaluable span discovery.
//!
//! [`find_spans`] parses the whole source and records every node on the path from the
//! top-level statement containing the cursor down to the narrowest node that still
//! contains it. Editors consume the path from the end to grow a selection outward.

use std::borrow::Cow;

use serde::Serialize;
use swc_core::{
    common::{BytePos, Span, Spanned},
    ecma::{
        ast::*,
        visit::{Visit, VisitWith},
    },
};

use crate::syntax::Source;

/// One node on a span path. Offsets are UTF-8 byte offsets into the queried source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluableSpan {
    pub start: usize,
    pub end: usize,
    /// ESTree/Babel node type, e.g. `CallExpression`.
    pub kind: Cow<'static, str>,
}

/// Returns the path of nodes containing `offset`, outermost first.
///
/// Both ends of a node's range count as inside it. Unparseable source yields an empty
/// path; no input makes this panic.
#[must_use]
pub fn find_spans(source: &str, offset: usize) -> Vec<EvaluableSpan> {
    let parsed = Source::new(source);
    let module = match parsed.parse_module() {
        Ok(module) => module,
        Err(err) => {
            log::debug!("span query on unparseable source: {err}");
            return Vec::new();
        }
    };
    let mut finder = SpanFinder {
        offset,
        start_pos: parsed.start_pos(),
        path: Vec::new(),
        sealed: false,
    };
    module.visit_with(&mut finder);
    finder.path
}

struct SpanFinder {
    offset: usize,
    start_pos: BytePos,
    path: Vec<EvaluableSpan>,
    /// Set once the narrowest node is found; later siblings are not recorded.
    sealed: bool,
}

impl SpanFinder {
    /// Records `span` if it contains the offset.
    fn enter(&mut self, span: Span, kind: &'static str) -> bool {
        if self.sealed || span.is_dummy() {
            return false;
        }
        let start = span.lo.0.saturating_sub(self.start_pos.0) as usize;
        let end = span.hi.0.saturating_sub(self.start_pos.0) as usize;
        if start <= self.offset && self.offset <= end {
            self.path.push(EvaluableSpan {
                start,
                end,
                kind: Cow::Borrowed(kind),
            });
            true
        } else {
            false
        }
    }

    fn node<N: VisitWith<Self>>(&mut self, node: &N, span: Span, kind: &'static str) {
        if self.enter(span, kind) {
            node.visit_children_with(self);
            self.sealed = true;
        }
    }

    fn leaf(&mut self, span: Span, kind: &'static str) {
        if self.enter(span, kind) {
            self.sealed = true;
        }
    }
}

impl Visit for SpanFinder {
    // types carry no evaluable nodes
    fn visit_ts_type_ann(&mut self, _: &TsTypeAnn) {}
    fn visit_ts_type_param_decl(&mut self, _: &TsTypeParamDecl) {}
    fn visit_ts_type_param_instantiation(&mut self, _: &TsTypeParamInstantiation) {}

    fn visit_ident(&mut self, n: &Ident) {
        self.leaf(n.span, "Identifier");
    }

    fn visit_ident_name(&mut self, n: &IdentName) {
        self.leaf(n.span, "Identifier");
    }

    fn visit_member_prop(&mut self, n: &MemberProp) {
        if let MemberProp::Computed(prop) = n {
            prop.expr.visit_with(self);
        }
    }

    fn visit_super_prop(&mut self, n: &SuperProp) {
        if let SuperProp::Computed(prop) = n {
            prop.expr.visit_with(self);
        }
    }

    fn visit_str(&mut self, n: &Str) {
        self.leaf(n.span, "StringLiteral");
    }

    fn visit_number(&mut self, n: &Number) {
        self.leaf(n.span, "NumericLiteral");
    }

    fn visit_bool(&mut self, n: &Bool) {
        self.leaf(n.span, "BooleanLiteral");
    }

    fn visit_null(&mut self, n: &Null) {
        self.leaf(n.span, "NullLiteral");
    }

    fn visit_regex(&mut self, n: &Regex) {
        self.leaf(n.span, "RegExpLiteral");
    }

    fn visit_this_expr(&mut self, n: &ThisExpr) {
        self.leaf(n.span, "ThisExpression");
    }

    fn visit_tpl(&mut self, n: &Tpl) {
        self.node(n, n.span, "TemplateLiteral");
    }

    fn visit_tagged_tpl(&mut self, n: &TaggedTpl) {
        self.node(n, n.span, "TaggedTemplateExpression");
    }

    fn visit_array_lit(&mut self, n: &ArrayLit) {
        self.node(n, n.span, "ArrayExpression");
    }

    fn visit_object_lit(&mut self, n: &ObjectLit) {
        self.node(n, n.span, "ObjectExpression");
    }

    fn visit_expr_or_spread(&mut self, n: &ExprOrSpread) {
        match n.spread {
            Some(spread) => self.node(n, spread.with_hi(n.expr.span_hi()), "SpreadElement"),
            None => n.visit_children_with(self),
        }
    }

    fn visit_spread_element(&mut self, n: &SpreadElement) {
        self.node(n, n.span(), "SpreadElement");
    }

    fn visit_prop(&mut self, n: &Prop) {
        let kind = match n {
            Prop::Method(_) | Prop::Getter(_) | Prop::Setter(_) => "ObjectMethod",
            _ => "ObjectProperty",
        };
        self.node(n, n.span(), kind);
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        self.node(n, n.function.span, "FunctionExpression");
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.node(n, n.span, "ArrowFunctionExpression");
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        self.node(n, n.class.span, "ClassExpression");
    }

    fn visit_unary_expr(&mut self, n: &UnaryExpr) {
        self.node(n, n.span, "UnaryExpression");
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        self.node(n, n.span, "UpdateExpression");
    }

    fn visit_bin_expr(&mut self, n: &BinExpr) {
        let kind = match n.op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => "LogicalExpression",
            _ => "BinaryExpression",
        };
        self.node(n, n.span, kind);
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        self.node(n, n.span, "AssignmentExpression");
    }

    fn visit_cond_expr(&mut self, n: &CondExpr) {
        self.node(n, n.span, "ConditionalExpression");
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        self.node(n, n.span, "CallExpression");
    }

    fn visit_new_expr(&mut self, n: &NewExpr) {
        self.node(n, n.span, "NewExpression");
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        self.node(n, n.span, "MemberExpression");
    }

    fn visit_super_prop_expr(&mut self, n: &SuperPropExpr) {
        self.node(n, n.span, "MemberExpression");
    }

    fn visit_opt_chain_expr(&mut self, n: &OptChainExpr) {
        match &*n.base {
            OptChainBase::Member(member) => {
                if self.enter(n.span, "OptionalMemberExpression") {
                    member.visit_children_with(self);
                    self.sealed = true;
                }
            }
            OptChainBase::Call(call) => self.node(call, n.span, "OptionalCallExpression"),
        }
    }

    fn visit_seq_expr(&mut self, n: &SeqExpr) {
        self.node(n, n.span, "SequenceExpression");
    }

    fn visit_await_expr(&mut self, n: &AwaitExpr) {
        self.node(n, n.span, "AwaitExpression");
    }

    fn visit_paren_expr(&mut self, n: &ParenExpr) {
        self.node(n, n.span, "ParenthesizedExpression");
    }

    fn visit_ts_as_expr(&mut self, n: &TsAsExpr) {
        self.node(n, n.span, "TSAsExpression");
    }

    fn visit_ts_const_assertion(&mut self, n: &TsConstAssertion) {
        self.node(n, n.span, "TSAsExpression");
    }

    fn visit_ts_satisfies_expr(&mut self, n: &TsSatisfiesExpr) {
        self.node(n, n.span, "TSSatisfiesExpression");
    }

    fn visit_ts_non_null_expr(&mut self, n: &TsNonNullExpr) {
        self.node(n, n.span, "TSNonNullExpression");
    }

    fn visit_ts_type_assertion(&mut self, n: &TsTypeAssertion) {
        self.node(n, n.span, "TSTypeAssertion");
    }

    fn visit_object_pat(&mut self, n: &ObjectPat) {
        self.node(n, n.span, "ObjectPattern");
    }

    fn visit_object_pat_prop(&mut self, n: &ObjectPatProp) {
        match n {
            ObjectPatProp::Rest(_) => n.visit_children_with(self),
            _ => self.node(n, n.span(), "ObjectProperty"),
        }
    }

    fn visit_array_pat(&mut self, n: &ArrayPat) {
        self.node(n, n.span, "ArrayPattern");
    }

    fn visit_assign_pat(&mut self, n: &AssignPat) {
        self.node(n, n.span, "AssignmentPattern");
    }

    fn visit_rest_pat(&mut self, n: &RestPat) {
        self.node(n, n.span, "RestElement");
    }

    fn visit_expr_stmt(&mut self, n: &ExprStmt) {
        self.node(n, n.span, "ExpressionStatement");
    }

    fn visit_var_decl(&mut self, n: &VarDecl) {
        self.node(n, n.span, "VariableDeclaration");
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        self.node(n, n.span, "VariableDeclarator");
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        self.node(n, n.function.span, "FunctionDeclaration");
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        self.node(n, n.class.span, "ClassDeclaration");
    }

    fn visit_constructor(&mut self, n: &Constructor) {
        self.node(n, n.span, "ClassMethod");
    }

    fn visit_class_method(&mut self, n: &ClassMethod) {
        self.node(n, n.span, "ClassMethod");
    }

    fn visit_class_prop(&mut self, n: &ClassProp) {
        self.node(n, n.span, "ClassProperty");
    }

    fn visit_static_block(&mut self, n: &StaticBlock) {
        self.node(n, n.span, "StaticBlock");
    }

    fn visit_ts_enum_decl(&mut self, n: &TsEnumDecl) {
        self.node(n, n.span, "TSEnumDeclaration");
    }

    fn visit_ts_interface_decl(&mut self, n: &TsInterfaceDecl) {
        self.leaf(n.span, "TSInterfaceDeclaration");
    }

    fn visit_ts_type_alias_decl(&mut self, n: &TsTypeAliasDecl) {
        self.leaf(n.span, "TSTypeAliasDeclaration");
    }

    fn visit_return_stmt(&mut self, n: &ReturnStmt) {
        self.node(n, n.span, "ReturnStatement");
    }

    fn visit_if_stmt(&mut self, n: &IfStmt) {
        self.node(n, n.span, "IfStatement");
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.node(n, n.span, "BlockStatement");
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.node(n, n.span, "ForStatement");
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        self.node(n, n.span, "ForInStatement");
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        self.node(n, n.span, "ForOfStatement");
    }

    fn visit_while_stmt(&mut self, n: &WhileStmt) {
        self.node(n, n.span, "WhileStatement");
    }

    fn visit_do_while_stmt(&mut self, n: &DoWhileStmt) {
        self.node(n, n.span, "DoWhileStatement");
    }

    fn visit_break_stmt(&mut self, n: &BreakStmt) {
        self.node(n, n.span, "BreakStatement");
    }

    fn visit_continue_stmt(&mut self, n: &ContinueStmt) {
        self.node(n, n.span, "ContinueStatement");
    }

    fn visit_throw_stmt(&mut self, n: &ThrowStmt) {
        self.node(n, n.span, "ThrowStatement");
    }

    fn visit_try_stmt(&mut self, n: &TryStmt) {
        self.node(n, n.span, "TryStatement");
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        self.node(n, n.span, "CatchClause");
    }

    fn visit_switch_stmt(&mut self, n: &SwitchStmt) {
        self.node(n, n.span, "SwitchStatement");
    }

    fn visit_switch_case(&mut self, n: &SwitchCase) {
        self.node(n, n.span, "SwitchCase");
    }

    fn visit_labeled_stmt(&mut self, n: &LabeledStmt) {
        self.node(n, n.span, "LabeledStatement");
    }

    fn visit_debugger_stmt(&mut self, n: &DebuggerStmt) {
        self.leaf(n.span, "DebuggerStatement");
    }

    fn visit_empty_stmt(&mut self, n: &EmptyStmt) {
        self.leaf(n.span, "EmptyStatement");
    }

    fn visit_import_decl(&mut self, n: &ImportDecl) {
        self.leaf(n.span, "ImportDeclaration");
    }

    fn visit_export_decl(&mut self, n: &ExportDecl) {
        self.node(n, n.span, "ExportNamedDeclaration");
    }

    fn visit_named_export(&mut self, n: &NamedExport) {
        self.leaf(n.span, "ExportNamedDeclaration");
    }

    fn visit_export_default_decl(&mut self, n: &ExportDefaultDecl) {
        self.node(n, n.span, "ExportDefaultDeclaration");
    }

    fn visit_export_default_expr(&mut self, n: &ExportDefaultExpr) {
        self.node(n, n.span, "ExportDefaultDeclaration");
    }

    fn visit_export_all(&mut self, n: &ExportAll) {
        self.leaf(n.span, "ExportAllDeclaration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str, offset: usize) -> Vec<Cow<'static, str>> {
        find_spans(source, offset).into_iter().map(|span| span.kind).collect()
    }

    #[test]
    fn member_property_names_are_not_separate_nodes() {
        let path = kinds("a.bcd", 3);
        assert_eq!(path.last().map(|kind| &**kind), Some("MemberExpression"));
    }

    #[test]
    fn optional_chains_report_the_optional_node() {
        let path = kinds("a?.b(1)", 5);
        assert!(path.iter().any(|kind| kind == "OptionalCallExpression"), "{path:?}");
        assert_eq!(path.last().map(|kind| &**kind), Some("NumericLiteral"));
    }

    #[test]
    fn type_annotations_are_skipped() {
        let path = kinds("let n: number = 1;", 8);
        assert_eq!(path.last().map(|kind| &**kind), Some("VariableDeclarator"));
    }

    #[test]
    fn casts_use_typescript_node_names() {
        let path = kinds("(x as any).y", 2);
        assert!(path.iter().any(|kind| kind == "TSAsExpression"), "{path:?}");
    }
}
