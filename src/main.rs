#[tokio::main]
async fn main() -> anyhow::Result<()> {
    orgproxy_lib::run().await
}
