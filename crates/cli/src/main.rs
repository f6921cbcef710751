use std::process::ExitCode;

fn main() -> ExitCode {
    crediflow_cli::run()
}
