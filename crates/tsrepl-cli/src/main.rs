use std::{
    env, fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
    time::Instant,
};

use tsrepl::{EngineConfig, EvaluateRequest, ReplEvent, ReplObserver, ReplOutput, SessionRegistry, find_spans, transform};

const STACK_SIZE: usize = 256 * 1024 * 1024;
/// Call depth that fits in `STACK_SIZE`.
const RECURSION_LIMIT: usize = 4000;

const HELP: &str = "\
commands:
  :ns [id]                 show or switch the current namespace
  :defs                    list definitions of the current namespace
  :unmap <name>            remove a definition
  :reset                   drop every namespace of the session
  :js <code>               show the transformed code
  :spans <offset> <code>   show evaluable spans around a byte offset
  :help                    this text
  :quit                    exit";

#[derive(Debug, Default)]
struct Options {
    session: Option<String>,
    namespace: Option<String>,
    cwd: Option<PathBuf>,
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!("usage: tsrepl [--session <id>] [--namespace <id>] [--cwd <dir>] [file]");
            return ExitCode::FAILURE;
        }
    };
    let cli = thread::Builder::new()
        .name("tsrepl".to_owned())
        .stack_size(STACK_SIZE)
        .spawn(move || run(options));
    match cli.map(thread::JoinHandle::join) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: cannot start interpreter thread: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--session" => options.session = Some(value("--session")?),
            "--namespace" => options.namespace = Some(value("--namespace")?),
            "--cwd" => options.cwd = Some(PathBuf::from(value("--cwd")?)),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            file => {
                if options.file.is_some() {
                    return Err(format!("unexpected argument {file}"));
                }
                options.file = Some(PathBuf::from(file));
            }
        }
    }
    Ok(options)
}

fn run(options: Options) -> ExitCode {
    let mut registry = SessionRegistry::new(EngineConfig::default().recursion_limit(RECURSION_LIMIT));
    registry.subscribe(Box::new(|event: &ReplEvent| {
        if let ReplEvent::UncaughtFault { namespace_id, fault, text, .. } = event {
            eprintln!("[{namespace_id}] {fault}: {text}");
        }
    }));
    let session = registry.create_session(Some("cli"), options.session.as_deref());

    match options.file {
        Some(file) => run_file(&mut registry, &session, &file, options.namespace, options.cwd),
        None => {
            let cwd = options.cwd.or_else(|| env::current_dir().ok()).unwrap_or_else(|| PathBuf::from("."));
            if let Some(namespace) = &options.namespace {
                let _ = registry.set_current_namespace(&session, namespace, &mut Terminal);
            }
            match interactive(&mut registry, &session, &cwd) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("error: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Evaluates a whole file, then keeps running timers until none are left.
fn run_file(
    registry: &mut SessionRegistry,
    session: &str,
    file: &Path,
    namespace: Option<String>,
    cwd: Option<PathBuf>,
) -> ExitCode {
    let code = match fs::read_to_string(file) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error reading {}: {err}", file.display());
            return ExitCode::FAILURE;
        }
    };
    let absolute = fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
    let cwd = cwd
        .or_else(|| absolute.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let namespace = namespace.unwrap_or_else(|| absolute.to_string_lossy().into_owned());

    let request = EvaluateRequest::new(session, cwd, code)
        .namespace(namespace)
        .source_path(absolute);
    let output = registry.evaluate(&request, &mut Terminal);
    drain_timers(registry);
    if output.is_error() { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn drain_timers(registry: &mut SessionRegistry) {
    while let Some(due) = registry.next_timer_due() {
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        registry.poll(&mut Terminal);
    }
}

fn interactive(registry: &mut SessionRegistry, session: &str, cwd: &Path) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut buffer = String::new();
    loop {
        registry.poll(&mut Terminal);
        let prompt = if buffer.is_empty() {
            format!("{}> ", registry.current_namespace(session).unwrap_or_default())
        } else {
            "... ".to_owned()
        };
        print!("{prompt}");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            println!();
            return Ok(());
        };
        if buffer.is_empty() && line.trim_start().starts_with(':') {
            if !command(registry, session, line.trim()) {
                return Ok(());
            }
            continue;
        }
        buffer.push_str(&line);
        buffer.push('\n');
        if is_incomplete(&buffer) {
            continue;
        }
        let code = std::mem::take(&mut buffer);
        if code.trim().is_empty() {
            continue;
        }
        registry.evaluate(&EvaluateRequest::new(session, cwd, code.trim_end()), &mut Terminal);
    }
}

/// Runs a `:` command. Returns `false` to leave the prompt.
fn command(registry: &mut SessionRegistry, session: &str, line: &str) -> bool {
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match name {
        ":quit" | ":q" | ":exit" => return false,
        ":help" => println!("{HELP}"),
        ":ns" if rest.is_empty() => {
            let current = registry.current_namespace(session).unwrap_or_default();
            let all = registry.list_namespaces(session).unwrap_or_default();
            println!("current: {current}");
            for namespace in all {
                println!("  {namespace}");
            }
        }
        ":ns" => report(registry.set_current_namespace(session, rest, &mut Terminal)),
        ":defs" => {
            let namespace = registry.current_namespace(session).unwrap_or_default();
            match registry.definitions(session, &namespace) {
                Ok(definitions) => {
                    for (name, value) in definitions {
                        println!("{name} = {value}");
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
        }
        ":unmap" => {
            let namespace = registry.current_namespace(session).unwrap_or_default();
            report(registry.unmap_symbol(session, &namespace, rest, &mut Terminal));
        }
        ":reset" => report(registry.reset_session(session, &mut Terminal)),
        ":js" => match transform(rest) {
            Ok(output) => println!("{}", output.code.trim_end()),
            Err(err) => eprintln!("{err}"),
        },
        ":spans" => {
            let (offset, code) = rest.split_once(' ').unwrap_or((rest, ""));
            match offset.parse::<usize>() {
                Ok(offset) => {
                    for span in find_spans(code, offset) {
                        let text = code.get(span.start..span.end).unwrap_or_default();
                        println!("{:>4}..{:<4} {:<24} {text}", span.start, span.end, span.kind);
                    }
                }
                Err(_) => eprintln!("usage: :spans <offset> <code>"),
            }
        }
        other => eprintln!("unknown command {other}; try :help"),
    }
    true
}

fn report(result: Result<(), tsrepl::ReplError>) {
    if let Err(err) = result {
        eprintln!("{err}");
    }
}

/// True while brackets opened in `code` are still unclosed, ignoring strings and comments.
fn is_incomplete(code: &str) -> bool {
    let mut depth = 0i32;
    let mut chars = code.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '\'' | '"' | '`' => {
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == c {
                        closed = true;
                        break;
                    } else if inner == '\n' && c != '`' {
                        break;
                    }
                }
                if !closed && c == '`' {
                    return true;
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                let mut closed = false;
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        closed = true;
                        break;
                    }
                    previous = inner;
                }
                if !closed {
                    return true;
                }
            }
            _ => {}
        }
    }
    depth > 0
}

/// Prints results and console output to stdout, errors and definition changes to stderr.
struct Terminal;

impl ReplObserver for Terminal {
    fn on_event(&mut self, event: &ReplEvent) {
        match event {
            ReplEvent::Output(ReplOutput::Print { text, .. }) => println!("{text}"),
            ReplEvent::Output(ReplOutput::Error { text, .. }) => eprintln!("{text}"),
            ReplEvent::DefinitionsChanged(change) => {
                for (name, value) in &change.added {
                    eprintln!("+{name} = {value}");
                }
                for name in &change.removed {
                    eprintln!("-{name}");
                }
                for (name, value) in &change.changed {
                    eprintln!("~{name} = {value}");
                }
            }
            ReplEvent::NamespaceChanged { namespace_id, .. } => eprintln!("namespace: {namespace_id}"),
            ReplEvent::Reset { .. } => eprintln!("session reset"),
            ReplEvent::UncaughtFault { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_brackets_continue_the_input() {
        assert!(is_incomplete("function f() {\n"));
        assert!(is_incomplete("const a = [1,\n"));
        assert!(is_incomplete("const s = `line\n"));
        assert!(is_incomplete("/* still a comment\n"));
        assert!(!is_incomplete("f({ a: [1] })\n"));
        assert!(!is_incomplete("const s = '{';\n"));
        assert!(!is_incomplete("x // {\n"));
        assert!(!is_incomplete("const a = 1;\n"));
    }

    #[test]
    fn flags_and_file() {
        let args = ["--session", "s", "--cwd", "/tmp", "main.ts"].map(str::to_owned);
        let options = parse_args(args.into_iter());
        let Ok(options) = options else { panic!("{options:?}") };
        assert_eq!(options.session.as_deref(), Some("s"));
        assert_eq!(options.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(options.file, Some(PathBuf::from("main.ts")));
        assert!(parse_args(["--namespace".to_owned()].into_iter()).is_err());
        assert!(parse_args(["--verbose".to_owned()].into_iter()).is_err());
    }
}
