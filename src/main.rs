use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    bstack_xcuitest::cli::run_cli().await
}
