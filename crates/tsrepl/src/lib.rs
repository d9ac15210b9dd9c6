#![doc = include_str!("../../../README.md")]

mod config;
mod diff;
mod evaluate;
mod events;
mod fs;
mod interp;
mod modules;
mod namespace;
mod repl_error;
mod resolver;
mod session;
mod spans;
mod syntax;
mod transform;

pub use crate::{
    config::{DEFAULT_RECURSION_LIMIT, EngineConfig, InspectOptions, IntrinsicsBaseline},
    evaluate::EvaluateRequest,
    events::{
        CollectEvents, DefinitionsChange, ErrorKind, FaultKind, NoopObserver, ReplEvent, ReplObserver, ReplOutput,
    },
    fs::{FileSystem, MemoryFileSystem, OsFileSystem},
    repl_error::ReplError,
    resolver::{Resolution, ResolveError, Resolver},
    session::{SessionInfo, SessionRegistry},
    spans::{EvaluableSpan, find_spans},
    syntax::{CodeLoc, MAX_NESTING_DEPTH, ParseError},
    transform::{TransformError, TransformOutput, transform, transform_module, transform_regular},
};
