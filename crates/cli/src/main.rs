use std::process::ExitCode;

fn main() -> ExitCode {
    cutwise_cli::run()
}
