//! Units of executable syntax.
//!
//! A [`FunctionCode`] owns the syntax of one function, arrow, accessor, constructor or field
//! initializer, plus the text it was parsed from. Nested functions are cut out of their
//! parent the first time they are instantiated and cached by node address, so creating a
//! closure in a loop clones its syntax once.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;
use swc_core::{
    common::{BytePos, DUMMY_SP, Span},
    ecma::ast::{
        ArrowExpr, BlockStmt, BlockStmtOrExpr, Constructor, Expr, Function, GetterProp, ParamOrTsParamProp, Pat,
        SetterProp, Stmt,
    },
};

/// Text a unit was parsed from; spans index it relative to `start_pos`.
pub(crate) struct SourceText {
    pub text: Rc<str>,
    pub start_pos: BytePos,
}

pub(crate) enum CodeBody {
    Block(Vec<Stmt>),
    Expr(Box<Expr>),
}

pub(crate) struct FunctionCode {
    pub params: Vec<Pat>,
    pub body: CodeBody,
    pub is_async: bool,
    pub is_arrow: bool,
    pub span: Span,
    pub source: Rc<SourceText>,
    nested: RefCell<AHashMap<(u8, usize), Rc<FunctionCode>>>,
}

/// A function-like node inside a [`FunctionCode`].
#[derive(Clone, Copy)]
pub(crate) enum FunctionNode<'a> {
    Function(&'a Function),
    Arrow(&'a ArrowExpr),
    Getter(&'a GetterProp),
    Setter(&'a SetterProp),
    Constructor(&'a Constructor),
    /// A class field initializer, run with the instance as `this`.
    Field(&'a Expr),
}

impl FunctionNode<'_> {
    fn key(self) -> (u8, usize) {
        match self {
            Self::Function(node) => (0, std::ptr::from_ref(node).addr()),
            Self::Arrow(node) => (1, std::ptr::from_ref(node).addr()),
            Self::Getter(node) => (2, std::ptr::from_ref(node).addr()),
            Self::Setter(node) => (3, std::ptr::from_ref(node).addr()),
            Self::Constructor(node) => (4, std::ptr::from_ref(node).addr()),
            Self::Field(node) => (5, std::ptr::from_ref(node).addr()),
        }
    }
}

fn block(body: Option<&BlockStmt>) -> CodeBody {
    CodeBody::Block(body.map(|block| block.stmts.clone()).unwrap_or_default())
}

impl FunctionCode {
    /// A script body.
    pub fn script(body: Vec<Stmt>, source: Rc<SourceText>) -> Self {
        Self::new(Vec::new(), CodeBody::Block(body), DUMMY_SP, source)
    }

    fn new(params: Vec<Pat>, body: CodeBody, span: Span, source: Rc<SourceText>) -> Self {
        Self {
            params,
            body,
            is_async: false,
            is_arrow: false,
            span,
            source,
            nested: RefCell::default(),
        }
    }

    fn from_node(node: FunctionNode<'_>, source: Rc<SourceText>) -> Self {
        match node {
            FunctionNode::Function(func) => Self {
                is_async: func.is_async,
                ..Self::new(
                    func.params.iter().map(|param| param.pat.clone()).collect(),
                    block(func.body.as_ref()),
                    func.span,
                    source,
                )
            },
            FunctionNode::Arrow(arrow) => {
                let body = match &*arrow.body {
                    BlockStmtOrExpr::BlockStmt(body) => CodeBody::Block(body.stmts.clone()),
                    BlockStmtOrExpr::Expr(expr) => CodeBody::Expr(expr.clone()),
                };
                Self {
                    is_async: arrow.is_async,
                    is_arrow: true,
                    ..Self::new(arrow.params.clone(), body, arrow.span, source)
                }
            }
            FunctionNode::Getter(getter) => Self::new(Vec::new(), block(getter.body.as_ref()), getter.span, source),
            FunctionNode::Setter(setter) => Self::new(
                vec![(*setter.param).clone()],
                block(setter.body.as_ref()),
                setter.span,
                source,
            ),
            FunctionNode::Constructor(ctor) => {
                let params = ctor
                    .params
                    .iter()
                    .filter_map(|param| match param {
                        ParamOrTsParamProp::Param(param) => Some(param.pat.clone()),
                        ParamOrTsParamProp::TsParamProp(_) => None,
                    })
                    .collect();
                Self::new(params, block(ctor.body.as_ref()), ctor.span, source)
            }
            FunctionNode::Field(expr) => Self::new(
                Vec::new(),
                CodeBody::Expr(Box::new(expr.clone())),
                DUMMY_SP,
                source,
            ),
        }
    }

    /// The unit for a function-like node of this unit's syntax.
    pub fn nested(&self, node: FunctionNode<'_>) -> Rc<Self> {
        self.nested
            .borrow_mut()
            .entry(node.key())
            .or_insert_with(|| Rc::new(Self::from_node(node, self.source.clone())))
            .clone()
    }

    /// Source text covered by `span`, or `""` for synthetic spans.
    pub fn snippet(&self, span: Span) -> &str {
        let start = span.lo.0.saturating_sub(self.source.start_pos.0) as usize;
        let end = span.hi.0.saturating_sub(self.source.start_pos.0) as usize;
        if span.is_dummy() {
            return "";
        }
        self.source.text.get(start..end).unwrap_or("")
    }

    /// Number of parameters before the first default or rest parameter.
    pub fn expected_args(&self) -> usize {
        self.params
            .iter()
            .take_while(|param| !matches!(param, Pat::Assign(_) | Pat::Rest(_)))
            .count()
    }
}

impl Default for FunctionCode {
    fn default() -> Self {
        Self::script(
            Vec::new(),
            Rc::new(SourceText {
                text: Rc::from(""),
                start_pos: BytePos(0),
            }),
        )
    }
}
