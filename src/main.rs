use anyhow::Context;
use balus::runtime::bindings;
use balus::{HostError, RuntimeConfig, ScriptHost};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

struct Options {
    path: PathBuf,
    dump_result: bool,
}

fn parse_args() -> Option<Options> {
    let mut path = None;
    let mut dump_result = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dump-result" => dump_result = true,
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            other => {
                eprintln!("unexpected argument: {other}");
                return None;
            }
        }
    }
    Some(Options {
        path: path?,
        dump_result,
    })
}

fn run(options: &Options) -> anyhow::Result<()> {
    let source = balus::fs::read_script(&options.path)
        .with_context(|| format!("failed to read {}", options.path.display()))?;

    let mut host = ScriptHost::new(RuntimeConfig::default())?;
    host.install(&bindings::host_defaults())?;

    match host.eval(&source) {
        Ok(value) if options.dump_result => {
            let rendered = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|err| format!("<unserializable: {err}>"));
            println!("{rendered}");
        }
        Ok(_) => {}
        // An uncaught script exception is reported, not fatal; pending
        // async work still gets drained below.
        Err(HostError::Runtime(err)) => {
            eprintln!("uncaught exception: {}", err.message);
            if let Some(stack) = &err.stack {
                eprintln!("{stack}");
            }
        }
        Err(err) => return Err(err.into()),
    }

    host.run_event_loop();
    host.shutdown();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(options) = parse_args() else {
        let program = std::env::args()
            .next()
            .unwrap_or_else(|| "balus".to_string());
        eprintln!("usage: {program} path [--dump-result]");
        process::exit(-1);
    };

    if let Err(err) = run(&options) {
        eprintln!("{err:#}");
        process::exit(-1);
    }
}
