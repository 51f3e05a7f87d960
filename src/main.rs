use std::process::ExitCode;

fn main() -> ExitCode {
    pagesmith::cli::run()
}
