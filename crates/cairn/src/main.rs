use std::io;
use std::process::ExitCode;

use cairn::{emit, Cairn, Settings};
use cairn_dispatch::{LogSink, Threshold};
use cairn_input::RealEnv;

fn main() -> ExitCode {
    let settings = Settings::from_env(&RealEnv);

    // Messages raised while the command table is built, before any -v/-q.
    let startup = cairn_dispatch::subscriber(
        Threshold::Warning,
        settings.log_directive.as_deref(),
        LogSink::Stderr,
    );
    if let Err(err) = tracing::subscriber::set_global_default(startup) {
        eprintln!("cairn: failed to install logging: {}", err);
    }

    let working_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("cairn: cannot determine the working directory: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut dispatcher = Cairn::new(settings, working_dir).build();
    let args = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());
    let result = dispatcher.dispatch(args);

    match emit(&result, &mut io::stdout().lock(), &mut io::stderr().lock()) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("cairn: {}", err);
            ExitCode::FAILURE
        }
    }
}
