#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bookkeeping_api::cli::run_with_sys_args().await
}
