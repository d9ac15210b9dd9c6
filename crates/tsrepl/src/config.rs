//! Engine configuration.
//!
//! Everything a namespace needs to know about its surroundings is injected here instead of
//! being read from the host at runtime: which globals count as language intrinsics, which
//! names a sandbox reserves for itself, and how results are laid out.

use serde::{Deserialize, Serialize};

/// Recursion limit used unless configured otherwise.
///
/// Interpreted calls run on the calling thread's stack. This default fits a 2 MiB thread
/// (the size of `std::thread::spawn` and test threads) in a debug build; raise it only on a
/// thread spawned with a larger stack.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Names every fresh realm defines on its global object.
///
/// Host globals outside this set are copied into each namespace sandbox. The list is
/// versioned so a stored configuration can tell which baseline it was written against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrinsicsBaseline {
    pub version: u32,
    pub names: Vec<String>,
}

const BASELINE_V1: &[&str] = &[
    "Object",
    "Function",
    "Array",
    "String",
    "Number",
    "Boolean",
    "Math",
    "JSON",
    "Promise",
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
    "RegExp",
    "Map",
    "Set",
    "Date",
    "globalThis",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "NaN",
    "Infinity",
    "undefined",
];

impl IntrinsicsBaseline {
    /// The baseline matching the intrinsics this engine installs.
    #[must_use]
    pub fn v1() -> Self {
        Self {
            version: 1,
            names: BASELINE_V1.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }
}

impl Default for IntrinsicsBaseline {
    fn default() -> Self {
        Self::v1()
    }
}

/// Layout of formatted results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectOptions {
    /// Levels of nesting rendered before collapsing to `[Object]`.
    pub depth: usize,
    /// Width above which output is split over several lines.
    pub break_length: usize,
    /// Array items shown before `... N more items`.
    pub max_array_length: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            break_length: 72,
            max_array_length: 100,
        }
    }
}

/// Bindings a sandbox installs for itself. They never appear in a namespace's definitions.
const BUILTIN_BINDINGS: &[&str] = &[
    "console",
    "require",
    "global",
    "globalThis",
    "setTimeout",
    "clearTimeout",
    "setInterval",
    "clearInterval",
    "setImmediate",
    "clearImmediate",
    "queueMicrotask",
    "performance",
    "structuredClone",
    "process",
    "$1",
    "$2",
    "exports",
    "module",
    "__filename",
    "__dirname",
];

/// Settings shared by every session of a registry.
///
/// Use `EngineConfig::default()` and adjust with the builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub intrinsics: IntrinsicsBaseline,
    pub builtin_bindings: Vec<String>,
    /// Prefix of `require` ids that name a sibling namespace.
    pub virtual_prefix: String,
    /// Extensions tried, in order, when resolving a file module.
    pub source_extensions: Vec<String>,
    /// Namespace targeted when a request names none and the session has no current one.
    pub default_namespace: String,
    /// Maximum depth of nested calls.
    pub recursion_limit: usize,
    pub inspect: InspectOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intrinsics: IntrinsicsBaseline::v1(),
            builtin_bindings: BUILTIN_BINDINGS.iter().map(|name| (*name).to_owned()).collect(),
            virtual_prefix: "ns:".to_owned(),
            source_extensions: [".ts", ".js", ".json"].map(str::to_owned).to_vec(),
            default_namespace: "index.ts".to_owned(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            inspect: InspectOptions::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn intrinsics(mut self, baseline: IntrinsicsBaseline) -> Self {
        self.intrinsics = baseline;
        self
    }

    /// Adds a name to the reserved bindings.
    #[must_use]
    pub fn builtin_binding(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.builtin_bindings.contains(&name) {
            self.builtin_bindings.push(name);
        }
        self
    }

    #[must_use]
    pub fn virtual_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.virtual_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn source_extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.source_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn inspect(mut self, options: InspectOptions) -> Self {
        self.inspect = options;
        self
    }

    /// Whether `name` is reserved by the sandbox or belongs to the intrinsics baseline.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.builtin_bindings.iter().any(|binding| binding == name) || self.intrinsics.contains(name)
    }
}
