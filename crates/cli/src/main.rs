use std::process::ExitCode;

fn main() -> ExitCode {
    aquashop_cli::run()
}
