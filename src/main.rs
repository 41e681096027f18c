use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    runner_web::cli_main::main().await
}
