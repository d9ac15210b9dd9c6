//! Fuzz target: evaluate arbitrary source in a fresh session.
//!
//! Evaluation failures are results, so anything other than a returned `ReplOutput` is a
//! bug. There is no timeout, so inputs that can loop or wait on timers are skipped.

#![no_main]

use std::rc::Rc;

use libfuzzer_sys::fuzz_target;
use tsrepl::{EngineConfig, EvaluateRequest, FileSystem, MemoryFileSystem, NoopObserver, SessionRegistry};

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };
    if code.len() > 4096 || ["while", "for", "setTimeout", "setInterval", "=>", "function"].iter().any(|word| code.contains(word)) {
        return;
    }

    let fs: Rc<dyn FileSystem> = Rc::new(MemoryFileSystem::new().with_file("/fuzz/index.ts", ""));
    let mut registry = SessionRegistry::with_file_system(EngineConfig::default().recursion_limit(64), fs);
    let session = registry.create_session(None, None);
    let request = EvaluateRequest::new(&session, "/fuzz", code);
    let _ = registry.evaluate(&request, &mut NoopObserver);
    let _ = registry.evaluate_sync(&request);
});
