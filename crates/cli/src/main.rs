use std::process::ExitCode;

fn main() -> ExitCode {
    raidbook_cli::run()
}
