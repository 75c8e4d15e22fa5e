use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    jmod_cli::main().await
}
