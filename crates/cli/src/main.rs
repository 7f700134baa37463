use std::process::ExitCode;

fn main() -> ExitCode {
    statusquo_cli::run()
}
